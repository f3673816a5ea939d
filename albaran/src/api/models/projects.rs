//! API request/response models for projects.

use super::{Status, users::CompanyResponse};
use crate::db::models::projects::{ProjectDBResponse, ProjectUpdateDBRequest};
use crate::errors::Error;
use crate::types::{ClientId, ProjectId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProjectCreate {
    pub nombre: String,
    pub descripcion: Option<String>,
    #[schema(value_type = String, format = "uuid")]
    pub client_id: ClientId,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ProjectUpdate {
    pub nombre: Option<String>,
    pub descripcion: Option<String>,
}

fn name_required() -> Error {
    Error::BadRequest {
        message: "Project name is required".to_string(),
    }
}

impl ProjectCreate {
    pub fn validate(&self) -> Result<(), Error> {
        if self.nombre.trim().is_empty() {
            return Err(name_required());
        }
        Ok(())
    }
}

impl ProjectUpdate {
    pub fn validate(&self) -> Result<(), Error> {
        if self.nombre.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(name_required());
        }
        Ok(())
    }
}

impl From<ProjectUpdate> for ProjectUpdateDBRequest {
    fn from(update: ProjectUpdate) -> Self {
        Self {
            name: update.nombre.map(|n| n.trim().to_string()),
            description: update.descripcion,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProjectResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: ProjectId,
    pub nombre: String,
    pub descripcion: Option<String>,
    #[schema(value_type = String, format = "uuid")]
    pub client_id: ClientId,
    #[schema(value_type = String, format = "uuid")]
    pub owner_id: UserId,
    pub company: Option<CompanyResponse>,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProjectDBResponse> for ProjectResponse {
    fn from(db: ProjectDBResponse) -> Self {
        Self {
            id: db.id,
            nombre: db.name,
            descripcion: db.description,
            client_id: db.client_id,
            owner_id: db.owner_id,
            company: db.company.map(Into::into),
            status: db.deleted.into(),
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}
