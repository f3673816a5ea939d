//! Store models for clients.

use crate::db::models::company::Company;
use crate::types::{ClientId, UserId};
use chrono::{DateTime, Utc};

/// Store request for creating a new client
#[derive(Debug, Clone)]
pub struct ClientCreateDBRequest {
    pub owner_id: UserId,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub company: Option<Company>,
}

/// Store request for updating a client. `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct ClientUpdateDBRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Store response for a client
#[derive(Debug, Clone)]
pub struct ClientDBResponse {
    pub id: ClientId,
    pub owner_id: UserId,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub company: Option<Company>,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
