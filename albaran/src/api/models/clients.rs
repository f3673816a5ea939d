//! API request/response models for clients.

use super::{Status, users::CompanyResponse};
use crate::db::models::clients::{ClientDBResponse, ClientUpdateDBRequest};
use crate::errors::Error;
use crate::types::{ClientId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ClientCreate {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ClientUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl ClientCreate {
    pub fn validate(&self) -> Result<(), Error> {
        validate_name(Some(&self.name))
    }
}

impl ClientUpdate {
    pub fn validate(&self) -> Result<(), Error> {
        match &self.name {
            Some(name) => validate_name(Some(name)),
            None => Ok(()),
        }
    }
}

fn validate_name(name: Option<&str>) -> Result<(), Error> {
    if name.is_none_or(|n| n.trim().is_empty()) {
        return Err(Error::BadRequest {
            message: "Client name is required".to_string(),
        });
    }
    Ok(())
}

impl From<ClientUpdate> for ClientUpdateDBRequest {
    fn from(update: ClientUpdate) -> Self {
        Self {
            name: update.name.map(|n| n.trim().to_string()),
            email: update.email,
            phone: update.phone,
            address: update.address,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClientResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: ClientId,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    #[schema(value_type = String, format = "uuid")]
    pub owner_id: UserId,
    pub company: Option<CompanyResponse>,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ClientDBResponse> for ClientResponse {
    fn from(db: ClientDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            email: db.email,
            phone: db.phone,
            address: db.address,
            owner_id: db.owner_id,
            company: db.company.map(Into::into),
            status: db.deleted.into(),
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}
