//! OpenAPI documentation for the REST API.
//!
//! The document is served at `/api-docs/openapi.json` and rendered by Scalar at `/docs`.

use serde::Serialize;
use utoipa::{
    Modify, OpenApi, ToSchema,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::api;
use crate::db::models::delivery_notes::{DeliveryNoteItem, DeliveryNoteKind, ItemKind};

/// Body of every error response.
#[derive(Debug, Serialize, ToSchema)]
#[allow(unused)]
pub struct ErrorResponse {
    /// Human readable description of the failure
    pub error: String,
}

/// Bearer token issued by register and login.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "BearerAuth".to_string(),
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Session token returned by `POST /user/register` and `POST /user/login`:\n\n\
                            ```\nAuthorization: Bearer YOUR_TOKEN\n```",
                        ))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Albaran API",
        description = "Clients, projects and signed delivery notes, shared within a company."
    ),
    modifiers(&SecurityAddon),
    paths(
        api::handlers::users::register,
        api::handlers::users::validate_email_code,
        api::handlers::users::login,
        api::handlers::users::update_personal_data,
        api::handlers::users::update_company,
        api::handlers::users::upload_logo,
        api::handlers::users::get_profile,
        api::handlers::users::delete_user,
        api::handlers::users::change_password,
        api::handlers::users::forgot_password,
        api::handlers::users::reset_password,
        api::handlers::users::invite_guest,
        api::handlers::clients::create_client,
        api::handlers::clients::list_clients,
        api::handlers::clients::list_archived_clients,
        api::handlers::clients::get_client,
        api::handlers::clients::update_client,
        api::handlers::clients::archive_client,
        api::handlers::clients::recover_client,
        api::handlers::clients::delete_client,
        api::handlers::projects::create_project,
        api::handlers::projects::list_projects,
        api::handlers::projects::list_archived_projects,
        api::handlers::projects::get_project,
        api::handlers::projects::update_project,
        api::handlers::projects::archive_project,
        api::handlers::projects::recover_project,
        api::handlers::projects::delete_project,
        api::handlers::delivery_notes::create_delivery_note,
        api::handlers::delivery_notes::list_delivery_notes,
        api::handlers::delivery_notes::get_delivery_note,
        api::handlers::delivery_notes::sign_delivery_note,
        api::handlers::delivery_notes::delete_delivery_note,
        api::handlers::delivery_notes::download_delivery_note_pdf,
    ),
    components(
        schemas(
            ErrorResponse,
            api::models::MessageResponse,
            api::models::Status,
            api::models::users::Role,
            api::models::users::RegisterRequest,
            api::models::users::LoginRequest,
            api::models::users::ValidateRequest,
            api::models::users::PersonalDataRequest,
            api::models::users::CompanyRequest,
            api::models::users::ChangePasswordRequest,
            api::models::users::ForgotPasswordRequest,
            api::models::users::ResetPasswordRequest,
            api::models::users::InviteRequest,
            api::models::users::CompanyResponse,
            api::models::users::AuthUser,
            api::models::users::AuthResponse,
            api::models::users::UserResponse,
            api::models::users::ProfileResponse,
            api::models::users::UserUpdatedResponse,
            api::models::users::CompanyUpdatedResponse,
            api::models::users::LogoResponse,
            api::models::users::InviteResponse,
            api::models::clients::ClientCreate,
            api::models::clients::ClientUpdate,
            api::models::clients::ClientResponse,
            api::models::projects::ProjectCreate,
            api::models::projects::ProjectUpdate,
            api::models::projects::ProjectResponse,
            api::models::delivery_notes::DeliveryNoteItemInput,
            api::models::delivery_notes::DeliveryNoteCreate,
            api::models::delivery_notes::DeliveryNoteResponse,
            api::models::delivery_notes::SignResponse,
            DeliveryNoteKind,
            DeliveryNoteItem,
            ItemKind,
        )
    ),
    tags(
        (name = "users", description = "Accounts, verification, company profile and guest invitations"),
        (name = "clients", description = "Clients of the caller and their company"),
        (name = "projects", description = "Projects, each belonging to a client"),
        (name = "delivery_notes", description = "Delivery notes of hours or materials, signed once and exported as PDF"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/user/register",
            "/user/validate",
            "/client/archived/list",
            "/project/{id}/recover",
            "/deliverynote/sign/{id}",
            "/deliverynote/pdf/{id}",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }

        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("BearerAuth"));
    }
}
