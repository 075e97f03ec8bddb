//! User domain
//!
//! The cached entity, its typed change set, and the record store contract.

mod entity;
mod repository;
mod validation;

pub use entity::{NewUser, RangeDimension, User, UserChanges, UserField, UserId};
pub use repository::UserRepository;
pub use validation::{
    UserValidationError, validate_age, validate_email, validate_name, validate_user_id,
};

#[cfg(test)]
pub use repository::mock::MockUserRepository;
