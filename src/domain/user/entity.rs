//! User entity and related types

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::validation::{
    UserValidationError, validate_age, validate_email, validate_name, validate_user_id,
};

/// User identifier - positive integer assigned by the record store
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct UserId(i64);

impl UserId {
    /// Create a new UserId after validation
    pub fn new(id: i64) -> Result<Self, UserValidationError> {
        validate_user_id(id)?;
        Ok(Self(id))
    }

    /// Get the inner integer value
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for UserId {
    type Error = UserValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserId> for i64 {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// User entity as held by the record store and cached as JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    id: UserId,
    name: String,
    email: String,
    age: i32,
    /// Set by the record store on insert, never changed afterwards
    created_at: DateTime<Utc>,
}

impl User {
    /// Rebuild a user from a stored row
    pub fn from_parts(
        id: UserId,
        name: impl Into<String>,
        email: impl Into<String>,
        age: i32,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            email: email.into(),
            age,
            created_at,
        }
    }

    pub fn id(&self) -> UserId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn age(&self) -> i32 {
        self.age
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Apply a change set, leaving id and created_at untouched
    pub fn apply(&mut self, changes: &UserChanges) {
        if let Some(name) = &changes.name {
            self.name = name.clone();
        }

        if let Some(email) = &changes.email {
            self.email = email.clone();
        }

        if let Some(age) = changes.age {
            self.age = age;
        }
    }
}

/// Fields supplied when creating a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub age: i32,
}

impl NewUser {
    pub fn new(name: impl Into<String>, email: impl Into<String>, age: i32) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            age,
        }
    }

    pub fn validate(&self) -> Result<(), UserValidationError> {
        validate_name(&self.name)?;
        validate_email(&self.email)?;
        validate_age(self.age)
    }
}

/// Mutable user fields. Anything not listed here cannot be updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UserField {
    Name,
    Email,
    Age,
}

impl UserField {
    /// Allow-list of fields an update may touch
    pub const MUTABLE: [UserField; 3] = [UserField::Name, UserField::Email, UserField::Age];

    /// Column name in the users table
    pub fn column(&self) -> &'static str {
        match self {
            UserField::Name => "name",
            UserField::Email => "email",
            UserField::Age => "age",
        }
    }
}

impl fmt::Display for UserField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// Typed change set for an update; absent fields are left as they are
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<i32>,
}

impl UserChanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_age(mut self, age: i32) -> Self {
        self.age = Some(age);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.changed_fields().is_empty()
    }

    /// Fields set in this change set, in allow-list order
    pub fn changed_fields(&self) -> Vec<UserField> {
        UserField::MUTABLE
            .into_iter()
            .filter(|field| self.touches(*field))
            .collect()
    }

    pub fn touches(&self, field: UserField) -> bool {
        match field {
            UserField::Name => self.name.is_some(),
            UserField::Email => self.email.is_some(),
            UserField::Age => self.age.is_some(),
        }
    }

    pub fn validate(&self) -> Result<(), UserValidationError> {
        if self.is_empty() {
            return Err(UserValidationError::NoChanges);
        }

        if let Some(name) = &self.name {
            validate_name(name)?;
        }

        if let Some(email) = &self.email {
            validate_email(email)?;
        }

        if let Some(age) = self.age {
            validate_age(age)?;
        }

        Ok(())
    }
}

/// Columns a range query can be expressed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeDimension {
    Age,
}

impl RangeDimension {
    pub const ALL: [RangeDimension; 1] = [RangeDimension::Age];

    pub fn as_str(&self) -> &'static str {
        match self {
            RangeDimension::Age => "age",
        }
    }

    /// The mutable field whose value this dimension ranges over
    pub fn field(&self) -> UserField {
        match self {
            RangeDimension::Age => UserField::Age,
        }
    }

    pub fn value_of(&self, user: &User) -> i64 {
        match self {
            RangeDimension::Age => i64::from(user.age()),
        }
    }
}

impl fmt::Display for RangeDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RangeDimension {
    type Err = UserValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "age" => Ok(RangeDimension::Age),
            other => Err(UserValidationError::UnknownDimension(other.to_string())),
        }
    }
}
