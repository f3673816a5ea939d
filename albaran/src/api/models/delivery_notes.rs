//! API request/response models for delivery notes.

use super::users::CompanyResponse;
use crate::db::models::delivery_notes::{DeliveryNoteDBResponse, DeliveryNoteItem, DeliveryNoteKind, ItemKind};
use crate::errors::Error;
use crate::types::{ClientId, DeliveryNoteId, ProjectId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Incoming line item. Every field is optional on the wire so that a missing value is reported
/// as a validation error rather than a body rejection.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct DeliveryNoteItemInput {
    /// `hora` or `material`
    pub tipo: Option<String>,
    pub descripcion: Option<String>,
    pub cantidad: Option<f64>,
    pub horas: Option<f64>,
    pub precio: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryNoteCreate {
    /// `horas` or `materiales`
    pub tipo: String,
    #[schema(value_type = String, format = "uuid")]
    pub client_id: ClientId,
    #[schema(value_type = String, format = "uuid")]
    pub project_id: ProjectId,
    #[serde(default)]
    pub items: Vec<DeliveryNoteItemInput>,
}

fn bad_request(message: String) -> Error {
    Error::BadRequest { message }
}

impl DeliveryNoteItemInput {
    fn validate(self, index: usize) -> Result<DeliveryNoteItem, Error> {
        let position = index + 1;
        let kind = match self.tipo.as_deref() {
            Some("hora") => ItemKind::Hora,
            Some("material") => ItemKind::Material,
            _ => return Err(bad_request(format!("Item {position}: tipo must be 'hora' or 'material'"))),
        };

        let description = self
            .descripcion
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .ok_or_else(|| bad_request(format!("Item {position}: descripcion is required")))?;

        let quantity = self
            .cantidad
            .filter(|q| q.is_finite() && *q >= 0.0)
            .ok_or_else(|| bad_request(format!("Item {position}: cantidad must be a non-negative number")))?;

        for (field, value) in [("horas", self.horas), ("precio", self.precio)] {
            if value.is_some_and(|v| !v.is_finite() || v < 0.0) {
                return Err(bad_request(format!("Item {position}: {field} cannot be negative")));
            }
        }

        Ok(DeliveryNoteItem {
            kind,
            description,
            quantity,
            hours: self.horas,
            price: self.precio,
        })
    }
}

impl DeliveryNoteCreate {
    /// Check the note kind and every item, returning them in store form.
    pub fn validate(self) -> Result<(DeliveryNoteKind, Vec<DeliveryNoteItem>), Error> {
        let kind = match self.tipo.as_str() {
            "horas" => DeliveryNoteKind::Horas,
            "materiales" => DeliveryNoteKind::Materiales,
            _ => return Err(bad_request("tipo must be 'horas' or 'materiales'".to_string())),
        };

        let items = self
            .items
            .into_iter()
            .enumerate()
            .map(|(i, item)| item.validate(i))
            .collect::<Result<Vec<_>, _>>()?;

        Ok((kind, items))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryNoteResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: DeliveryNoteId,
    pub tipo: DeliveryNoteKind,
    pub items: Vec<DeliveryNoteItem>,
    #[schema(value_type = String, format = "uuid")]
    pub owner_id: UserId,
    #[schema(value_type = String, format = "uuid")]
    pub client_id: ClientId,
    #[schema(value_type = String, format = "uuid")]
    pub project_id: ProjectId,
    pub company: Option<CompanyResponse>,
    /// Issue date
    pub fecha: DateTime<Utc>,
    pub signed: bool,
    /// Public path of the signature image, once signed
    pub firma: Option<String>,
    /// Public path of the last generated PDF
    pub pdf_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DeliveryNoteDBResponse> for DeliveryNoteResponse {
    fn from(db: DeliveryNoteDBResponse) -> Self {
        Self {
            id: db.id,
            tipo: db.kind,
            items: db.items,
            owner_id: db.owner_id,
            client_id: db.client_id,
            project_id: db.project_id,
            company: db.company.map(Into::into),
            fecha: db.issued_at,
            signed: db.state.is_signed(),
            firma: db.state.signature_path().map(str::to_string),
            pdf_url: db.pdf_path,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SignResponse {
    pub message: String,
    pub firma: String,
}
