//! Store models for users.

use crate::api::models::users::Role;
use crate::db::models::company::Company;
use crate::types::UserId;
use chrono::{DateTime, Utc};

/// Store request for creating a new user
#[derive(Debug, Clone)]
pub struct UserCreateDBRequest {
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub verification_code: String,
    pub company: Option<Company>,
}

/// Personal identity fields, set together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonalData {
    pub first_name: String,
    pub last_name: String,
    pub nif: String,
}

/// Store request for updating a user. `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserUpdateDBRequest {
    pub password_hash: Option<String>,
    pub verified: Option<bool>,
    /// `Some(None)` clears the pending reset code
    pub reset_code: Option<Option<String>>,
    pub reset_attempts: Option<i32>,
    pub personal: Option<PersonalData>,
    pub company: Option<Company>,
    pub logo_path: Option<String>,
    pub deleted: Option<bool>,
}

/// Store response for a user
#[derive(Debug, Clone)]
pub struct UserDBResponse {
    pub id: UserId,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub verified: bool,
    pub verification_code: String,
    pub verification_attempts: i32,
    pub reset_code: Option<String>,
    pub reset_attempts: i32,
    pub deleted: bool,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub nif: Option<String>,
    pub company: Option<Company>,
    pub logo_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserDBResponse {
    /// Personal data is complete only when all three fields are present and non-blank.
    pub fn personal_data(&self) -> Option<PersonalData> {
        let non_blank = |v: &Option<String>| v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
        Some(PersonalData {
            first_name: non_blank(&self.first_name)?,
            last_name: non_blank(&self.last_name)?,
            nif: non_blank(&self.nif)?,
        })
    }
}
