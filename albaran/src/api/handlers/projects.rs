//! HTTP handlers for projects. Same access rules as clients; updates use `PUT`.
//!
//! Reads go through the caller's [`Visibility`](crate::db::visibility::Visibility); records outside
//! it are reported as not found. Changes additionally require the caller to own the record.

use crate::{
    AppState,
    api::models::{
        MessageResponse,
        projects::{ProjectCreate, ProjectResponse, ProjectUpdate},
        users::CurrentUser,
    },
    db::{
        handlers::{
            Repository, Store,
            repository::{ListFilter, ProjectRepository},
        },
        models::projects::{ProjectCreateDBRequest, ProjectDBResponse},
    },
    errors::{Error, Result},
    types::{Operation, ProjectId, abbrev_uuid},
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use super::clients;
use tracing::info;

fn not_found(id: ProjectId) -> Error {
    Error::NotFound {
        resource: "Project".to_string(),
        id: id.to_string(),
    }
}

/// Fetch a project the caller can see.
pub(crate) async fn get_visible(state: &AppState, user: &CurrentUser, id: ProjectId) -> Result<ProjectDBResponse> {
    let visibility = user.visibility();
    state
        .store
        .projects()
        .get_by_id(id)
        .await?
        .filter(|p| visibility.permits(p.owner_id, p.company.as_ref()))
        .ok_or_else(|| not_found(id))
}

/// Fetch a project the caller can see and owns.
async fn get_owned(state: &AppState, user: &CurrentUser, id: ProjectId, action: Operation) -> Result<ProjectDBResponse> {
    let project = get_visible(state, user, id).await?;
    if project.owner_id != user.id {
        return Err(Error::InsufficientPermissions {
            action,
            resource: "project".to_string(),
        });
    }
    Ok(project)
}

#[utoipa::path(
    post,
    path = "/project",
    tag = "projects",
    summary = "Create project",
    request_body = ProjectCreate,
    responses(
        (status = 201, description = "Project created", body = ProjectResponse),
        (status = 400, description = "Missing name"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Email not verified"),
        (status = 404, description = "Client not found or not visible"),
        (status = 409, description = "The client already has a project with this name"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id)))]
pub async fn create_project(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<ProjectCreate>,
) -> Result<(StatusCode, Json<ProjectResponse>)> {
    current_user.require_verified()?;
    request.validate()?;
    let client = clients::get_visible(&state, &current_user, request.client_id).await?;

    let project = state
        .store
        .projects()
        .create(&ProjectCreateDBRequest {
            owner_id: current_user.id,
            client_id: client.id,
            name: request.nombre.trim().to_string(),
            description: request.descripcion,
            company: current_user.company.clone(),
        })
        .await?;

    info!(project_id = %abbrev_uuid(&project.id), client_id = %abbrev_uuid(&client.id), "project created");
    Ok((StatusCode::CREATED, Json(project.into())))
}

#[utoipa::path(
    get,
    path = "/project",
    tag = "projects",
    summary = "List active projects",
    responses(
        (status = 200, description = "Projects visible to the caller", body = Vec<ProjectResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id)))]
pub async fn list_projects(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<Vec<ProjectResponse>>> {
    let projects = state
        .store
        .projects()
        .list(&ListFilter::active(current_user.visibility()))
        .await?;

    Ok(Json(projects.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/project/archived/list",
    tag = "projects",
    summary = "List archived projects",
    responses(
        (status = 200, description = "Archived projects visible to the caller", body = Vec<ProjectResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id)))]
pub async fn list_archived_projects(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> Result<Json<Vec<ProjectResponse>>> {
    let projects = state
        .store
        .projects()
        .list(&ListFilter::archived(current_user.visibility()))
        .await?;

    Ok(Json(projects.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/project/{id}",
    tag = "projects",
    summary = "Get project",
    params(("id" = uuid::Uuid, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Project", body = ProjectResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Project not found or not visible"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id), project_id = %abbrev_uuid(&id)))]
pub async fn get_project(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<ProjectId>,
) -> Result<Json<ProjectResponse>> {
    Ok(Json(get_visible(&state, &current_user, id).await?.into()))
}

#[utoipa::path(
    put,
    path = "/project/{id}",
    tag = "projects",
    summary = "Update project",
    params(("id" = uuid::Uuid, Path, description = "Project ID")),
    request_body = ProjectUpdate,
    responses(
        (status = 200, description = "Project updated", body = ProjectResponse),
        (status = 400, description = "Empty name"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the owner, or email not verified"),
        (status = 404, description = "Project not found or not visible"),
        (status = 409, description = "Name already used by another project of the same client"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id), project_id = %abbrev_uuid(&id)))]
pub async fn update_project(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<ProjectId>,
    Json(request): Json<ProjectUpdate>,
) -> Result<Json<ProjectResponse>> {
    current_user.require_verified()?;
    request.validate()?;
    get_owned(&state, &current_user, id, Operation::Update).await?;

    let project = state.store.projects().update(id, &request.into()).await?;
    Ok(Json(project.into()))
}

#[utoipa::path(
    patch,
    path = "/project/{id}/archive",
    tag = "projects",
    summary = "Archive project",
    description = "Soft delete. Delivery notes of the project are left untouched.",
    params(("id" = uuid::Uuid, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Project archived", body = ProjectResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Project not found or not visible"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id), project_id = %abbrev_uuid(&id)))]
pub async fn archive_project(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<ProjectId>,
) -> Result<Json<ProjectResponse>> {
    get_owned(&state, &current_user, id, Operation::Archive).await?;

    let project = state
        .store
        .projects()
        .set_archived(id, true)
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(Json(project.into()))
}

#[utoipa::path(
    patch,
    path = "/project/{id}/recover",
    tag = "projects",
    summary = "Recover archived project",
    params(("id" = uuid::Uuid, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Project restored", body = ProjectResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Project not found or not visible"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id), project_id = %abbrev_uuid(&id)))]
pub async fn recover_project(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<ProjectId>,
) -> Result<Json<ProjectResponse>> {
    get_owned(&state, &current_user, id, Operation::Recover).await?;

    let project = state
        .store
        .projects()
        .set_archived(id, false)
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(Json(project.into()))
}

#[utoipa::path(
    delete,
    path = "/project/{id}",
    tag = "projects",
    summary = "Delete project permanently",
    description = "Irreversible. Delivery notes referencing the project are kept.",
    params(("id" = uuid::Uuid, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Project deleted", body = MessageResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Project not found or not visible"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id), project_id = %abbrev_uuid(&id)))]
pub async fn delete_project(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<ProjectId>,
) -> Result<Json<MessageResponse>> {
    get_owned(&state, &current_user, id, Operation::Delete).await?;

    if !state.store.projects().delete(id).await? {
        return Err(not_found(id));
    }
    info!("project deleted permanently");
    Ok(Json(MessageResponse::new("Project deleted")))
}
