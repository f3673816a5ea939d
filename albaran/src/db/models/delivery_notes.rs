//! Store models for delivery notes, including the signing state machine.

use crate::db::models::company::Company;
use crate::types::{ClientId, DeliveryNoteId, ProjectId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use utoipa::ToSchema;

/// Whether a note records worked hours or delivered materials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "delivery_note_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeliveryNoteKind {
    Horas,
    Materiales,
}

impl fmt::Display for DeliveryNoteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryNoteKind::Horas => f.write_str("horas"),
            DeliveryNoteKind::Materiales => f.write_str("materiales"),
        }
    }
}

/// Kind of a single line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Hora,
    Material,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKind::Hora => f.write_str("hora"),
            ItemKind::Material => f.write_str("material"),
        }
    }
}

/// One line of a delivery note. Stored as an element of a JSONB array, so the serialized form is
/// also the on-disk form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DeliveryNoteItem {
    #[serde(rename = "tipo")]
    pub kind: ItemKind,
    #[serde(rename = "descripcion")]
    pub description: String,
    #[serde(rename = "cantidad")]
    pub quantity: f64,
    #[serde(rename = "horas", default, skip_serializing_if = "Option::is_none")]
    pub hours: Option<f64>,
    #[serde(rename = "precio", default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

/// Signing state of a note. There is no transition back to `Draft`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteState {
    Draft,
    Signed {
        signature_path: String,
        signed_at: DateTime<Utc>,
    },
}

/// A transition the state machine refuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Delivery note is already signed")]
    AlreadySigned,
    #[error("Cannot delete a signed delivery note")]
    SignedNotDeletable,
}

impl NoteState {
    pub fn is_signed(&self) -> bool {
        matches!(self, NoteState::Signed { .. })
    }

    pub fn signature_path(&self) -> Option<&str> {
        match self {
            NoteState::Draft => None,
            NoteState::Signed { signature_path, .. } => Some(signature_path),
        }
    }

    /// `Draft -> Signed`. Any other starting state is rejected.
    pub fn sign(&self, signature_path: String, signed_at: DateTime<Utc>) -> Result<NoteState, TransitionError> {
        match self {
            NoteState::Draft => Ok(NoteState::Signed {
                signature_path,
                signed_at,
            }),
            NoteState::Signed { .. } => Err(TransitionError::AlreadySigned),
        }
    }

    /// Only drafts may be removed.
    pub fn ensure_deletable(&self) -> Result<(), TransitionError> {
        match self {
            NoteState::Draft => Ok(()),
            NoteState::Signed { .. } => Err(TransitionError::SignedNotDeletable),
        }
    }
}

/// Store request for creating a new delivery note. Notes always start as drafts.
#[derive(Debug, Clone)]
pub struct DeliveryNoteCreateDBRequest {
    pub kind: DeliveryNoteKind,
    pub items: Vec<DeliveryNoteItem>,
    pub owner_id: UserId,
    pub client_id: ClientId,
    pub project_id: ProjectId,
    pub company: Option<Company>,
}

/// Store request for updating a delivery note.
///
/// Items and signature are not updatable; signing goes through
/// [`DeliveryNoteRepository::sign`](crate::db::handlers::repository::DeliveryNoteRepository::sign).
#[derive(Debug, Clone, Default)]
pub struct DeliveryNoteUpdateDBRequest {
    pub pdf_path: Option<String>,
}

/// Store response for a delivery note
#[derive(Debug, Clone)]
pub struct DeliveryNoteDBResponse {
    pub id: DeliveryNoteId,
    pub kind: DeliveryNoteKind,
    pub items: Vec<DeliveryNoteItem>,
    pub owner_id: UserId,
    pub client_id: ClientId,
    pub project_id: ProjectId,
    pub company: Option<Company>,
    pub state: NoteState,
    pub pdf_path: Option<String>,
    pub deleted: bool,
    pub issued_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
