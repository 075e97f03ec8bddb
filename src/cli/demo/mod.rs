//! Demo command - cached reads, an update and its invalidation, then stats

use clap::Args;
use tracing::{info, warn};

use crate::domain::{RangeDimension, User, UserChanges, UserId};
use crate::infrastructure::observability::init_metrics;

/// Arguments for the demo command
#[derive(Args, Clone, Debug)]
pub struct DemoArgs {
    /// User looked up and updated during the demo
    #[arg(long, default_value_t = 1)]
    pub user_id: i64,

    /// Lower bound of the age range query
    #[arg(long, default_value_t = 20)]
    pub min_age: i64,

    /// Upper bound of the age range query
    #[arg(long, default_value_t = 30)]
    pub max_age: i64,

    /// Age the user is updated to
    #[arg(long, default_value_t = 29)]
    pub new_age: i32,
}

/// Run the walkthrough
pub async fn run(args: DemoArgs) -> anyhow::Result<()> {
    let config = super::bootstrap();
    let metrics = init_metrics(&config.observability.metrics);

    let services = crate::create_app_services_with_config(&config).await?;
    let users = &services.users;
    let id = UserId::new(args.user_id)?;

    info!(user_id = %id, "Starting cache-aside demo");

    println!("== Single user lookup ==");
    print_user(users.get_user(id).await?.as_ref());
    println!("Same query again:");
    print_user(users.get_user(id).await?.as_ref());

    println!();
    println!("== Age range query ==");
    let found = users
        .get_users_by_range(RangeDimension::Age, args.min_age, args.max_age)
        .await?;
    println!(
        "Found {} users aged {}-{}",
        found.len(),
        args.min_age,
        args.max_age
    );
    println!("Same query again:");
    let found = users
        .get_users_by_range(RangeDimension::Age, args.min_age, args.max_age)
        .await?;
    println!(
        "Found {} users aged {}-{}",
        found.len(),
        args.min_age,
        args.max_age
    );

    println!();
    println!("== Cache invalidation ==");
    match users
        .update_user(id, UserChanges::new().with_age(args.new_age))
        .await?
    {
        Some(result) => {
            if let Some(warning) = &result.warning {
                warn!("{}", warning);
            }
            println!(
                "Updated: {} is now {} years old",
                result.value.name(),
                result.value.age()
            );
        }
        None => println!("No user with id {}", id),
    }
    println!("Querying the user again (entry was invalidated):");
    print_user(users.get_user(id).await?.as_ref());

    println!();
    println!("== Cache statistics ==");
    let report = services.stats.get_stats().await?;
    crate::cli::stats::print_report(&report);

    if let Some(metrics) = metrics {
        println!();
        println!("{}", metrics.render());
    }

    super::shutdown(&config);
    Ok(())
}

fn print_user(user: Option<&User>) {
    match user {
        Some(user) => println!(
            "User: {} <{}>, age {}",
            user.name(),
            user.email(),
            user.age()
        ),
        None => println!("User not found"),
    }
}
