//! HTTP handlers for delivery notes: creation, listing, signing, deletion and PDF export.

use crate::{
    AppState,
    api::models::{
        MessageResponse,
        delivery_notes::{DeliveryNoteCreate, DeliveryNoteResponse, SignResponse},
        users::CurrentUser,
    },
    db::{
        handlers::{
            Repository, Store,
            repository::{DeliveryNoteRepository, ListFilter},
        },
        models::delivery_notes::{
            DeliveryNoteCreateDBRequest, DeliveryNoteDBResponse, DeliveryNoteUpdateDBRequest, TransitionError,
        },
    },
    errors::{Error, Result},
    pdf::{self, NoteDocument, Signature},
    types::{DeliveryNoteId, Operation, abbrev_uuid},
    uploads,
};
use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use chrono::Utc;
use tracing::{info, warn};

use super::{clients, projects};

/// Public mount of stored signature images.
pub const SIGNATURES_PREFIX: &str = "/firmas";
/// Public mount of generated PDFs.
pub const PDF_PREFIX: &str = "/pdfs";

fn not_found(id: DeliveryNoteId) -> Error {
    Error::NotFound {
        resource: "Delivery note".to_string(),
        id: id.to_string(),
    }
}

async fn get_visible(state: &AppState, user: &CurrentUser, id: DeliveryNoteId) -> Result<DeliveryNoteDBResponse> {
    let visibility = user.visibility();
    state
        .store
        .delivery_notes()
        .get_by_id(id)
        .await?
        .filter(|n| !n.deleted && visibility.permits(n.owner_id, n.company.as_ref()))
        .ok_or_else(|| not_found(id))
}

#[utoipa::path(
    post,
    path = "/deliverynote",
    tag = "delivery_notes",
    summary = "Create delivery note",
    description = "Notes start unsigned. The caller's company is copied onto the note.",
    request_body = DeliveryNoteCreate,
    responses(
        (status = 201, description = "Delivery note created", body = DeliveryNoteResponse),
        (status = 400, description = "Invalid kind or items"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Email not verified"),
        (status = 404, description = "Client or project not found or not visible"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id)))]
pub async fn create_delivery_note(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<DeliveryNoteCreate>,
) -> Result<(StatusCode, Json<DeliveryNoteResponse>)> {
    current_user.require_verified()?;
    let (client_id, project_id) = (request.client_id, request.project_id);
    let (kind, items) = request.validate()?;

    let client = clients::get_visible(&state, &current_user, client_id).await?;
    let project = projects::get_visible(&state, &current_user, project_id).await?;

    let note = state
        .store
        .delivery_notes()
        .create(&DeliveryNoteCreateDBRequest {
            kind,
            items,
            owner_id: current_user.id,
            client_id: client.id,
            project_id: project.id,
            company: current_user.company.clone(),
        })
        .await?;

    info!(note_id = %abbrev_uuid(&note.id), kind = %note.kind, items = note.items.len(), "delivery note created");
    Ok((StatusCode::CREATED, Json(note.into())))
}

#[utoipa::path(
    get,
    path = "/deliverynote",
    tag = "delivery_notes",
    summary = "List delivery notes",
    responses(
        (status = 200, description = "Delivery notes visible to the caller, newest first", body = Vec<DeliveryNoteResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id)))]
pub async fn list_delivery_notes(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> Result<Json<Vec<DeliveryNoteResponse>>> {
    let notes = state
        .store
        .delivery_notes()
        .list(&ListFilter::active(current_user.visibility()))
        .await?;

    Ok(Json(notes.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/deliverynote/{id}",
    tag = "delivery_notes",
    summary = "Get delivery note",
    params(("id" = uuid::Uuid, Path, description = "Delivery note ID")),
    responses(
        (status = 200, description = "Delivery note", body = DeliveryNoteResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Delivery note not found or not visible"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id), note_id = %abbrev_uuid(&id)))]
pub async fn get_delivery_note(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<DeliveryNoteId>,
) -> Result<Json<DeliveryNoteResponse>> {
    Ok(Json(get_visible(&state, &current_user, id).await?.into()))
}

#[utoipa::path(
    patch,
    path = "/deliverynote/sign/{id}",
    tag = "delivery_notes",
    summary = "Sign delivery note",
    description = "Upload the client's signature as multipart field `firma` (png, jpg or jpeg). A note can be signed once.",
    params(("id" = uuid::Uuid, Path, description = "Delivery note ID")),
    request_body(content_type = "multipart/form-data", description = "Signature image in field `firma`"),
    responses(
        (status = 200, description = "Delivery note signed", body = SignResponse),
        (status = 400, description = "Missing or invalid image, or note already signed"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Email not verified"),
        (status = 404, description = "Delivery note not found or not visible"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id), note_id = %abbrev_uuid(&id)))]
pub async fn sign_delivery_note(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<DeliveryNoteId>,
    mut multipart: Multipart,
) -> Result<Json<SignResponse>> {
    current_user.require_verified()?;
    let note = get_visible(&state, &current_user, id).await?;
    if note.state.is_signed() {
        return Err(TransitionError::AlreadySigned.into());
    }

    let image = uploads::read_image_field(&mut multipart, "firma").await?;
    let stored = uploads::store_image(&state.config.storage.signatures_dir, SIGNATURES_PREFIX, &image).await?;

    let signed = state
        .store
        .delivery_notes()
        .sign(id, &stored.public_path, Utc::now())
        .await;

    match signed {
        Ok(Some(note)) => {
            info!(signature = %stored.public_path, "delivery note signed");
            Ok(Json(SignResponse {
                message: "Delivery note signed".to_string(),
                firma: note.state.signature_path().unwrap_or(&stored.public_path).to_string(),
            }))
        }
        Ok(None) => {
            uploads::remove_stored(&stored).await;
            Err(TransitionError::AlreadySigned.into())
        }
        Err(e) => {
            uploads::remove_stored(&stored).await;
            Err(e.into())
        }
    }
}

#[utoipa::path(
    delete,
    path = "/deliverynote/{id}",
    tag = "delivery_notes",
    summary = "Delete delivery note",
    description = "Only unsigned notes can be deleted, and only by their creator.",
    params(("id" = uuid::Uuid, Path, description = "Delivery note ID")),
    responses(
        (status = 200, description = "Delivery note deleted", body = MessageResponse),
        (status = 400, description = "Delivery note is signed"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Delivery note not found or not visible"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id), note_id = %abbrev_uuid(&id)))]
pub async fn delete_delivery_note(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<DeliveryNoteId>,
) -> Result<Json<MessageResponse>> {
    let note = get_visible(&state, &current_user, id).await?;
    note.state.ensure_deletable()?;

    if note.owner_id != current_user.id {
        return Err(Error::InsufficientPermissions {
            action: Operation::Delete,
            resource: "delivery note".to_string(),
        });
    }

    // The store refuses signed notes too, so a signature landing in between is not lost
    if !state.store.delivery_notes().delete(id).await? {
        return Err(Error::BadRequest {
            message: "Delivery note could not be deleted".to_string(),
        });
    }

    info!("delivery note deleted");
    Ok(Json(MessageResponse::new("Delivery note deleted")))
}

/// Load the stored signature image of a note, if it is signed.
async fn load_signature(state: &AppState, note: &DeliveryNoteDBResponse) -> Signature {
    let Some(public_path) = note.state.signature_path() else {
        return Signature::Unsigned;
    };

    let Some(path) = uploads::resolve_public_path(&state.config.storage.signatures_dir, SIGNATURES_PREFIX, public_path)
    else {
        warn!(signature = %public_path, "signature path outside the signatures directory");
        return Signature::Missing;
    };

    match tokio::fs::read(&path).await {
        Ok(bytes) => Signature::Image(bytes),
        Err(e) => {
            warn!(path = %path.display(), "signature file unreadable: {e}");
            Signature::Missing
        }
    }
}

#[utoipa::path(
    get,
    path = "/deliverynote/pdf/{id}",
    tag = "delivery_notes",
    summary = "Download delivery note PDF",
    description = "Renders the note, stores the file under the PDF mount and returns it as an attachment.",
    params(("id" = uuid::Uuid, Path, description = "Delivery note ID")),
    responses(
        (status = 200, description = "PDF document", content_type = "application/pdf", body = Vec<u8>),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Delivery note not found or not visible"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id), note_id = %abbrev_uuid(&id)))]
pub async fn download_delivery_note_pdf(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<DeliveryNoteId>,
) -> Result<impl IntoResponse> {
    let note = get_visible(&state, &current_user, id).await?;

    // Related records may have been hard-deleted; the document renders them as missing
    let client = state.store.clients().get_by_id(note.client_id).await?;
    let project = state.store.projects().get_by_id(note.project_id).await?;
    let creator = state.store.users().get_by_id(note.owner_id).await?;
    let signature = load_signature(&state, &note).await;

    // Image decoding and layout are CPU bound
    let bytes = tokio::task::spawn_blocking(move || {
        pdf::render(&NoteDocument {
            note: &note,
            project_name: project.as_ref().map(|p| p.name.as_str()),
            client_name: client.as_ref().map(|c| c.name.as_str()),
            client_email: client.as_ref().and_then(|c| c.email.as_deref()),
            client_address: client.as_ref().and_then(|c| c.address.as_deref()),
            creator_email: creator.as_ref().map(|u| u.email.as_str()),
            signature,
        })
    })
    .await
    .map_err(|e| Error::Internal {
        operation: format!("join PDF rendering task: {e}"),
    })??;

    pdf::write_pdf(&state.config.storage.pdf_dir, &id, &bytes).await?;

    let file_name = pdf::pdf_file_name(&id);
    state
        .store
        .delivery_notes()
        .update(
            id,
            &DeliveryNoteUpdateDBRequest {
                pdf_path: Some(format!("{PDF_PREFIX}/{file_name}")),
            },
        )
        .await?;

    info!(size = bytes.len(), "delivery note PDF generated");
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{file_name}\"")),
        ],
        bytes,
    ))
}
