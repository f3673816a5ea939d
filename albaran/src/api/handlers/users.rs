//! HTTP handlers for accounts: registration, login, verification, profile, company, passwords and
//! guest invitations.

use crate::{
    AppState,
    api::models::{
        MessageResponse,
        users::{
            AuthResponse, AuthUser, ChangePasswordRequest, CompanyRequest, CompanyUpdatedResponse, CurrentUser,
            DeleteUserQuery, ForgotPasswordRequest, InviteRequest, InviteResponse, LoginRequest, LogoResponse,
            PersonalDataRequest, ProfileResponse, RegisterRequest, ResetPasswordRequest, Role, UserResponse,
            UserUpdatedResponse, ValidateRequest, is_code, validate_email, validate_password,
        },
    },
    auth::{
        password::{self, Argon2Params},
        session,
    },
    db::{
        handlers::{Repository, Store},
        models::users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
    },
    errors::{Error, Result},
    types::{Operation, abbrev_uuid},
    uploads,
};
use axum::{
    Json,
    extract::{Multipart, Query, State},
    http::StatusCode,
};
use tracing::info;

/// Public mount of uploaded company logos.
pub const LOGOS_PREFIX: &str = "/uploads";

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn argon2_params(state: &AppState) -> Argon2Params {
    Argon2Params::from(&state.config.auth.password)
}

/// Reload the caller's full record.
async fn load_user(state: &AppState, user: &CurrentUser) -> Result<UserDBResponse> {
    state
        .store
        .users()
        .get_by_id(user.id)
        .await?
        .ok_or(Error::Unauthenticated {
            message: Some("Account no longer exists".to_string()),
        })
}

async fn user_response(state: &AppState, user: UserDBResponse) -> Result<UserResponse> {
    let clients = state.store.clients().list_ids_by_owner(user.id).await?;
    Ok(UserResponse::new(user, clients))
}

fn auth_response(state: &AppState, message: &str, user: &UserDBResponse, code: Option<String>) -> Result<AuthResponse> {
    let token = session::create_session_token(&CurrentUser::from(user), &state.config)?;
    Ok(AuthResponse {
        message: message.to_string(),
        user: AuthUser {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
            verified: user.verified,
            code,
        },
        token,
    })
}

#[utoipa::path(
    post,
    path = "/user/register",
    tag = "users",
    summary = "Register",
    description = "Create an unverified account. Registering an email that exists but is not yet verified returns the pending code again.",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 200, description = "Account already pending verification", body = AuthResponse),
        (status = 400, description = "Invalid email or password"),
        (status = 409, description = "Email already registered and verified"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    request.validate(state.config.auth.password.min_length)?;
    let email = normalize_email(&request.email);

    if let Some(existing) = state.store.users().get_by_email(&email).await? {
        if existing.verified {
            return Err(Error::Conflict {
                message: "Email already registered".to_string(),
            });
        }

        let code = existing.verification_code.clone();
        let response = auth_response(&state, "Account pending verification", &existing, Some(code))?;
        return Ok((StatusCode::OK, Json(response)));
    }

    let password_hash = password::hash_password_blocking(request.password, argon2_params(&state)).await?;
    let user = state
        .store
        .users()
        .create(&UserCreateDBRequest {
            email,
            password_hash,
            role: Role::User,
            verification_code: password::generate_code(),
            company: None,
        })
        .await?;

    info!(user_id = %abbrev_uuid(&user.id), "registered new account");
    let code = user.verification_code.clone();
    let response = auth_response(&state, "Account created", &user, Some(code))?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[utoipa::path(
    post,
    path = "/user/validate",
    tag = "users",
    summary = "Verify email",
    request_body = ValidateRequest,
    responses(
        (status = 200, description = "Email verified", body = MessageResponse),
        (status = 400, description = "Wrong code, malformed code or already verified"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id)))]
pub async fn validate_email_code(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<ValidateRequest>,
) -> Result<Json<MessageResponse>> {
    let user = load_user(&state, &current_user).await?;

    if user.verified {
        return Err(Error::BadRequest {
            message: "Email already verified".to_string(),
        });
    }
    if !is_code(request.code.trim()) {
        return Err(Error::BadRequest {
            message: "Code must be 6 digits".to_string(),
        });
    }

    if request.code.trim() != user.verification_code {
        let attempts = state.store.users().record_failed_verification(user.id).await?;
        info!(attempts, "wrong verification code");
        return Err(Error::BadRequest {
            message: "Invalid verification code".to_string(),
        });
    }

    state
        .store
        .users()
        .update(
            user.id,
            &UserUpdateDBRequest {
                verified: Some(true),
                ..Default::default()
            },
        )
        .await?;

    Ok(Json(MessageResponse::new("Email verified")))
}

#[utoipa::path(
    post,
    path = "/user/login",
    tag = "users",
    summary = "Log in",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 401, description = "Wrong password, unverified or deleted account"),
        (status = 404, description = "No account with this email"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<Json<AuthResponse>> {
    let email = normalize_email(&request.email);
    let user = state
        .store
        .users()
        .get_by_email(&email)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "User".to_string(),
            id: email.clone(),
        })?;

    if user.deleted {
        return Err(Error::Unauthenticated {
            message: Some("Account has been deleted".to_string()),
        });
    }
    if !user.verified {
        return Err(Error::Unauthenticated {
            message: Some("Email not verified".to_string()),
        });
    }
    if !password::verify_password_blocking(request.password, user.password_hash.clone()).await? {
        return Err(Error::Unauthenticated {
            message: Some("Invalid credentials".to_string()),
        });
    }

    Ok(Json(auth_response(&state, "Logged in", &user, None)?))
}

#[utoipa::path(
    put,
    path = "/user/register",
    tag = "users",
    summary = "Update personal data",
    request_body = PersonalDataRequest,
    responses(
        (status = 200, description = "Personal data updated", body = UserUpdatedResponse),
        (status = 401, description = "Unauthorized"),
        (status = 422, description = "Invalid personal data"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id)))]
pub async fn update_personal_data(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<PersonalDataRequest>,
) -> Result<Json<UserUpdatedResponse>> {
    let personal = request.into_personal_data()?;
    let user = state
        .store
        .users()
        .update(
            current_user.id,
            &UserUpdateDBRequest {
                personal: Some(personal),
                ..Default::default()
            },
        )
        .await?;

    Ok(Json(UserUpdatedResponse {
        message: "Personal data updated".to_string(),
        user: user_response(&state, user).await?,
    }))
}

#[utoipa::path(
    patch,
    path = "/user/company",
    tag = "users",
    summary = "Set company",
    description = "Attach or replace the caller's company. Self-employed callers get a company built from their personal data. Records created earlier keep the company they were created with.",
    request_body = CompanyRequest,
    responses(
        (status = 200, description = "Company updated", body = CompanyUpdatedResponse),
        (status = 400, description = "Self-employed without personal data"),
        (status = 401, description = "Unauthorized"),
        (status = 422, description = "Invalid company data"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id)))]
pub async fn update_company(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<CompanyRequest>,
) -> Result<Json<CompanyUpdatedResponse>> {
    let user = load_user(&state, &current_user).await?;
    let company = request.into_company(user.personal_data())?;

    state
        .store
        .users()
        .update(
            user.id,
            &UserUpdateDBRequest {
                company: Some(company.clone()),
                ..Default::default()
            },
        )
        .await?;

    info!("company updated");
    Ok(Json(CompanyUpdatedResponse {
        message: "Company updated".to_string(),
        company: company.into(),
    }))
}

#[utoipa::path(
    patch,
    path = "/user/logo",
    tag = "users",
    summary = "Upload logo",
    request_body(content_type = "multipart/form-data", description = "Image file in field `logo` (png, jpg or jpeg)"),
    responses(
        (status = 200, description = "Logo stored", body = LogoResponse),
        (status = 400, description = "Missing file or unsupported extension"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id)))]
pub async fn upload_logo(
    State(state): State<AppState>,
    current_user: CurrentUser,
    mut multipart: Multipart,
) -> Result<Json<LogoResponse>> {
    let image = uploads::read_image_field(&mut multipart, "logo").await?;
    let stored = uploads::store_image(&state.config.storage.uploads_dir, LOGOS_PREFIX, &image).await?;

    state
        .store
        .users()
        .update(
            current_user.id,
            &UserUpdateDBRequest {
                logo_path: Some(stored.public_path.clone()),
                ..Default::default()
            },
        )
        .await?;

    Ok(Json(LogoResponse {
        message: "Logo uploaded".to_string(),
        logo: stored.public_path,
    }))
}

#[utoipa::path(
    get,
    path = "/user",
    tag = "users",
    summary = "Get own profile",
    responses(
        (status = 200, description = "Profile", body = ProfileResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id)))]
pub async fn get_profile(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<ProfileResponse>> {
    let user = load_user(&state, &current_user).await?;
    Ok(Json(ProfileResponse {
        user: user_response(&state, user).await?,
    }))
}

#[utoipa::path(
    delete,
    path = "/user",
    tag = "users",
    summary = "Delete own account",
    params(DeleteUserQuery),
    responses(
        (status = 200, description = "Account deleted", body = MessageResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id)))]
pub async fn delete_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<DeleteUserQuery>,
) -> Result<Json<MessageResponse>> {
    if query.soft.unwrap_or(true) {
        state
            .store
            .users()
            .update(
                current_user.id,
                &UserUpdateDBRequest {
                    deleted: Some(true),
                    ..Default::default()
                },
            )
            .await?;
        info!("account soft-deleted");
        return Ok(Json(MessageResponse::new("Account deactivated")));
    }

    state.store.users().delete(current_user.id).await?;
    info!("account permanently deleted");
    Ok(Json(MessageResponse::new("Account permanently deleted")))
}

#[utoipa::path(
    patch,
    path = "/user/change-password",
    tag = "users",
    summary = "Change password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Wrong current password or new password too short"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id)))]
pub async fn change_password(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>> {
    let user = load_user(&state, &current_user).await?;

    if !password::verify_password_blocking(request.current_password, user.password_hash).await? {
        return Err(Error::BadRequest {
            message: "Current password is incorrect".to_string(),
        });
    }
    validate_password(&request.new_password, state.config.auth.password.min_length)?;

    let password_hash = password::hash_password_blocking(request.new_password, argon2_params(&state)).await?;
    state
        .store
        .users()
        .update(
            user.id,
            &UserUpdateDBRequest {
                password_hash: Some(password_hash),
                ..Default::default()
            },
        )
        .await?;

    Ok(Json(MessageResponse::new("Password changed")))
}

#[utoipa::path(
    post,
    path = "/user/forgot-password",
    tag = "users",
    summary = "Request a password reset code",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Code sent by email", body = MessageResponse),
        (status = 404, description = "No account with this email"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(request): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>> {
    let email = normalize_email(&request.email);
    let user = state
        .store
        .users()
        .get_by_email(&email)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "User".to_string(),
            id: email.clone(),
        })?;

    let code = password::generate_code();
    state
        .store
        .users()
        .update(
            user.id,
            &UserUpdateDBRequest {
                reset_code: Some(Some(code.clone())),
                reset_attempts: Some(0),
                ..Default::default()
            },
        )
        .await?;

    state.email.send_reset_code(&user.email, &code).await?;
    info!(user_id = %abbrev_uuid(&user.id), "password reset code issued");

    Ok(Json(MessageResponse::new("Reset code sent")))
}

#[utoipa::path(
    patch,
    path = "/user/reset-password",
    tag = "users",
    summary = "Reset password with a code",
    description = "Replaces the password and clears the code. Does not verify the email; unverified accounts still confirm it at /user/validate.",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset", body = MessageResponse),
        (status = 400, description = "Wrong or missing code, or new password too short"),
        (status = 404, description = "No account with this email"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>> {
    let email = normalize_email(&request.email);
    let user = state
        .store
        .users()
        .get_by_email(&email)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "User".to_string(),
            id: email.clone(),
        })?;

    let matches = user.reset_code.as_deref().is_some_and(|code| code == request.code.trim());
    if !matches {
        let attempts = state.store.users().record_failed_reset(user.id).await?;
        info!(user_id = %abbrev_uuid(&user.id), attempts, "wrong reset code");
        return Err(Error::BadRequest {
            message: "Invalid reset code".to_string(),
        });
    }
    validate_password(&request.new_password, state.config.auth.password.min_length)?;

    let password_hash = password::hash_password_blocking(request.new_password, argon2_params(&state)).await?;
    state
        .store
        .users()
        .update(
            user.id,
            &UserUpdateDBRequest {
                password_hash: Some(password_hash),
                reset_code: Some(None),
                ..Default::default()
            },
        )
        .await?;

    Ok(Json(MessageResponse::new("Password reset")))
}

#[utoipa::path(
    post,
    path = "/user/invite",
    tag = "users",
    summary = "Invite a guest",
    description = "Create a guest account in the caller's company and email it an access code.",
    request_body = InviteRequest,
    responses(
        (status = 201, description = "Guest created and invited", body = InviteResponse),
        (status = 400, description = "Caller has no company, or invalid email"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Guests cannot invite"),
        (status = 409, description = "Email already registered"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id)))]
pub async fn invite_guest(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<InviteRequest>,
) -> Result<(StatusCode, Json<InviteResponse>)> {
    if current_user.role == Role::Guest {
        return Err(Error::InsufficientPermissions {
            action: Operation::Invite,
            resource: "guests".to_string(),
        });
    }
    let company = current_user.company.clone().ok_or_else(|| Error::BadRequest {
        message: "You need a company to invite guests".to_string(),
    })?;

    validate_email(&request.email)?;
    let email = normalize_email(&request.email);
    if state.store.users().get_by_email(&email).await?.is_some() {
        return Err(Error::Conflict {
            message: "Email already registered".to_string(),
        });
    }

    let password_hash =
        password::hash_password_blocking(password::generate_random_password(), argon2_params(&state)).await?;
    let code = password::generate_code();
    let guest = state
        .store
        .users()
        .create(&UserCreateDBRequest {
            email,
            password_hash,
            role: Role::Guest,
            verification_code: code.clone(),
            company: Some(company.clone()),
        })
        .await?;

    state.email.send_invitation(&guest.email, &company.name, &code).await?;
    info!(guest_id = %abbrev_uuid(&guest.id), "guest invited");

    Ok((
        StatusCode::CREATED,
        Json(InviteResponse {
            message: "Guest created and invitation sent".to_string(),
            guest_id: guest.id,
        }),
    ))
}
