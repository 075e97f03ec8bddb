//! Flush command - administrative wipe of the cache store

use crate::config::AppConfig;

/// Drop every cache entry
pub async fn run() -> anyhow::Result<()> {
    let config = super::bootstrap();

    flush(&config).await?;
    println!("Cache flushed");

    super::shutdown(&config);
    Ok(())
}

async fn flush(config: &AppConfig) -> anyhow::Result<()> {
    let service = crate::create_user_cache_service_with_config(config).await?;
    service.clear_cache().await?;
    Ok(())
}
