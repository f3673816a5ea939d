//! API request and response models.
//!
//! Wire names are camelCase; fields keep the Spanish names clients already send (`nombre`,
//! `descripcion`, `tipo`, `firma` and so on).

pub mod clients;
pub mod delivery_notes;
pub mod projects;
pub mod users;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Lifecycle tag derived from the soft-delete flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Active,
    Archived,
}

impl From<bool> for Status {
    fn from(deleted: bool) -> Self {
        if deleted { Status::Archived } else { Status::Active }
    }
}

/// Plain acknowledgement body
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
