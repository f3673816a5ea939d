//! Store models for projects.

use crate::db::models::company::Company;
use crate::types::{ClientId, ProjectId, UserId};
use chrono::{DateTime, Utc};

/// Store request for creating a new project
#[derive(Debug, Clone)]
pub struct ProjectCreateDBRequest {
    pub owner_id: UserId,
    pub client_id: ClientId,
    pub name: String,
    pub description: Option<String>,
    pub company: Option<Company>,
}

/// Store request for updating a project. `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct ProjectUpdateDBRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Store response for a project
#[derive(Debug, Clone)]
pub struct ProjectDBResponse {
    pub id: ProjectId,
    pub owner_id: UserId,
    pub client_id: ClientId,
    pub name: String,
    pub description: Option<String>,
    pub company: Option<Company>,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
