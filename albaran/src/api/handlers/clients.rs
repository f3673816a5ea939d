//! HTTP handlers for clients.
//!
//! Reads go through the caller's [`Visibility`](crate::db::visibility::Visibility); records outside
//! it are reported as not found. Changes additionally require the caller to own the record.

use crate::{
    AppState,
    api::models::{
        MessageResponse,
        clients::{ClientCreate, ClientResponse, ClientUpdate},
        users::CurrentUser,
    },
    db::{
        handlers::{
            Repository, Store,
            repository::{ClientRepository, ListFilter},
        },
        models::clients::{ClientCreateDBRequest, ClientDBResponse},
    },
    errors::{Error, Result},
    types::{ClientId, Operation, abbrev_uuid},
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::info;

fn not_found(id: ClientId) -> Error {
    Error::NotFound {
        resource: "Client".to_string(),
        id: id.to_string(),
    }
}

/// Fetch a client the caller can see.
pub(crate) async fn get_visible(state: &AppState, user: &CurrentUser, id: ClientId) -> Result<ClientDBResponse> {
    let visibility = user.visibility();
    state
        .store
        .clients()
        .get_by_id(id)
        .await?
        .filter(|c| visibility.permits(c.owner_id, c.company.as_ref()))
        .ok_or_else(|| not_found(id))
}

/// Fetch a client the caller can see and owns.
async fn get_owned(state: &AppState, user: &CurrentUser, id: ClientId, action: Operation) -> Result<ClientDBResponse> {
    let client = get_visible(state, user, id).await?;
    if client.owner_id != user.id {
        return Err(Error::InsufficientPermissions {
            action,
            resource: "client".to_string(),
        });
    }
    Ok(client)
}

#[utoipa::path(
    post,
    path = "/client",
    tag = "clients",
    summary = "Create client",
    request_body = ClientCreate,
    responses(
        (status = 201, description = "Client created", body = ClientResponse),
        (status = 400, description = "Missing name"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Email not verified"),
        (status = 409, description = "You already have a client with this name"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id)))]
pub async fn create_client(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<ClientCreate>,
) -> Result<(StatusCode, Json<ClientResponse>)> {
    current_user.require_verified()?;
    request.validate()?;

    let client = state
        .store
        .clients()
        .create(&ClientCreateDBRequest {
            owner_id: current_user.id,
            name: request.name.trim().to_string(),
            email: request.email,
            phone: request.phone,
            address: request.address,
            company: current_user.company.clone(),
        })
        .await?;

    info!(client_id = %abbrev_uuid(&client.id), "client created");
    Ok((StatusCode::CREATED, Json(client.into())))
}

#[utoipa::path(
    get,
    path = "/client",
    tag = "clients",
    summary = "List active clients",
    responses(
        (status = 200, description = "Clients visible to the caller", body = Vec<ClientResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id)))]
pub async fn list_clients(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<Vec<ClientResponse>>> {
    let clients = state
        .store
        .clients()
        .list(&ListFilter::active(current_user.visibility()))
        .await?;

    Ok(Json(clients.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/client/archived/list",
    tag = "clients",
    summary = "List archived clients",
    responses(
        (status = 200, description = "Archived clients visible to the caller", body = Vec<ClientResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id)))]
pub async fn list_archived_clients(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> Result<Json<Vec<ClientResponse>>> {
    let clients = state
        .store
        .clients()
        .list(&ListFilter::archived(current_user.visibility()))
        .await?;

    Ok(Json(clients.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/client/{id}",
    tag = "clients",
    summary = "Get client",
    params(("id" = uuid::Uuid, Path, description = "Client ID")),
    responses(
        (status = 200, description = "Client", body = ClientResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Client not found or not visible"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id), client_id = %abbrev_uuid(&id)))]
pub async fn get_client(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<ClientId>,
) -> Result<Json<ClientResponse>> {
    Ok(Json(get_visible(&state, &current_user, id).await?.into()))
}

#[utoipa::path(
    patch,
    path = "/client/{id}",
    tag = "clients",
    summary = "Update client",
    params(("id" = uuid::Uuid, Path, description = "Client ID")),
    request_body = ClientUpdate,
    responses(
        (status = 200, description = "Client updated", body = ClientResponse),
        (status = 400, description = "Empty name"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the owner, or email not verified"),
        (status = 404, description = "Client not found or not visible"),
        (status = 409, description = "Name already used by another of your clients"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id), client_id = %abbrev_uuid(&id)))]
pub async fn update_client(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<ClientId>,
    Json(request): Json<ClientUpdate>,
) -> Result<Json<ClientResponse>> {
    current_user.require_verified()?;
    request.validate()?;
    get_owned(&state, &current_user, id, Operation::Update).await?;

    let client = state.store.clients().update(id, &request.into()).await?;
    Ok(Json(client.into()))
}

#[utoipa::path(
    patch,
    path = "/client/{id}/archive",
    tag = "clients",
    summary = "Archive client",
    description = "Soft delete. Projects and delivery notes of the client are left untouched.",
    params(("id" = uuid::Uuid, Path, description = "Client ID")),
    responses(
        (status = 200, description = "Client archived", body = ClientResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Client not found or not visible"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id), client_id = %abbrev_uuid(&id)))]
pub async fn archive_client(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<ClientId>,
) -> Result<Json<ClientResponse>> {
    get_owned(&state, &current_user, id, Operation::Archive).await?;

    let client = state
        .store
        .clients()
        .set_archived(id, true)
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(Json(client.into()))
}

#[utoipa::path(
    patch,
    path = "/client/{id}/recover",
    tag = "clients",
    summary = "Recover archived client",
    params(("id" = uuid::Uuid, Path, description = "Client ID")),
    responses(
        (status = 200, description = "Client restored", body = ClientResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Client not found or not visible"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id), client_id = %abbrev_uuid(&id)))]
pub async fn recover_client(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<ClientId>,
) -> Result<Json<ClientResponse>> {
    get_owned(&state, &current_user, id, Operation::Recover).await?;

    let client = state
        .store
        .clients()
        .set_archived(id, false)
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(Json(client.into()))
}

#[utoipa::path(
    delete,
    path = "/client/{id}",
    tag = "clients",
    summary = "Delete client permanently",
    description = "Irreversible. Projects and delivery notes referencing the client are kept.",
    params(("id" = uuid::Uuid, Path, description = "Client ID")),
    responses(
        (status = 200, description = "Client deleted", body = MessageResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Client not found or not visible"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id), client_id = %abbrev_uuid(&id)))]
pub async fn delete_client(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<ClientId>,
) -> Result<Json<MessageResponse>> {
    get_owned(&state, &current_user, id, Operation::Delete).await?;

    if !state.store.clients().delete(id).await? {
        return Err(not_found(id));
    }
    info!("client deleted permanently");
    Ok(Json(MessageResponse::new("Client deleted")))
}
