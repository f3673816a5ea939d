//! PostgreSQL repository for users.

use crate::types::{UserId, abbrev_uuid};
use crate::{
    api::models::users::Role,
    db::{
        errors::{DbError, Result},
        handlers::repository::{Repository, UserRepository},
        models::{
            company::Company,
            users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
        },
    },
};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::instrument;
use uuid::Uuid;

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct User {
    id: UserId,
    email: String,
    password_hash: String,
    role: Role,
    verified: bool,
    verification_code: String,
    verification_attempts: i32,
    reset_code: Option<String>,
    reset_attempts: i32,
    deleted: bool,
    first_name: Option<String>,
    last_name: Option<String>,
    nif: Option<String>,
    company_name: Option<String>,
    company_tax_id: Option<String>,
    company_address: Option<String>,
    logo_path: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<User> for UserDBResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            verified: user.verified,
            verification_code: user.verification_code,
            verification_attempts: user.verification_attempts,
            reset_code: user.reset_code,
            reset_attempts: user.reset_attempts,
            deleted: user.deleted,
            first_name: user.first_name,
            last_name: user.last_name,
            nif: user.nif,
            company: Company::from_columns(user.company_name, user.company_tax_id, user.company_address),
            logo_path: user.logo_path,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

pub struct Users {
    db: PgPool,
}

impl Users {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl Repository for Users {
    type CreateRequest = UserCreateDBRequest;
    type UpdateRequest = UserUpdateDBRequest;
    type Response = UserDBResponse;
    type Id = UserId;

    #[instrument(skip(self, request), fields(role = ?request.role), err)]
    async fn create(&self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let company = request.company.as_ref();
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, password_hash, role, verification_code,
                               company_name, company_tax_id, company_address)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.email)
        .bind(&request.password_hash)
        .bind(request.role)
        .bind(&request.verification_code)
        .bind(company.map(|c| c.name.as_str()))
        .bind(company.map(|c| c.tax_id.as_str()))
        .bind(company.map(|c| c.address.as_str()))
        .fetch_one(&self.db)
        .await?;

        Ok(user.into())
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&self, id: Self::Id) -> Result<Option<Self::Response>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        Ok(user.map(Into::into))
    }

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn update(&self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let personal = request.personal.as_ref();
        let company = request.company.as_ref();

        // Atomic update with conditional field updates
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                password_hash = COALESCE($2, password_hash),
                verified = COALESCE($3, verified),
                reset_code = CASE WHEN $4 THEN $5 ELSE reset_code END,
                reset_attempts = COALESCE($6, reset_attempts),
                first_name = COALESCE($7, first_name),
                last_name = COALESCE($8, last_name),
                nif = COALESCE($9, nif),
                company_name = COALESCE($10, company_name),
                company_tax_id = COALESCE($11, company_tax_id),
                company_address = COALESCE($12, company_address),
                logo_path = COALESCE($13, logo_path),
                deleted = COALESCE($14, deleted),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.password_hash.as_deref())
        .bind(request.verified)
        .bind(request.reset_code.is_some())
        .bind(request.reset_code.clone().flatten())
        .bind(request.reset_attempts)
        .bind(personal.map(|p| p.first_name.as_str()))
        .bind(personal.map(|p| p.last_name.as_str()))
        .bind(personal.map(|p| p.nif.as_str()))
        .bind(company.map(|c| c.name.as_str()))
        .bind(company.map(|c| c.tax_id.as_str()))
        .bind(company.map(|c| c.address.as_str()))
        .bind(request.logo_path.as_deref())
        .bind(request.deleted)
        .fetch_optional(&self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(user.into())
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn delete(&self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait::async_trait]
impl UserRepository for Users {
    #[instrument(skip(self, email), err)]
    async fn get_by_email(&self, email: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.db)
            .await?;

        Ok(user.map(Into::into))
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn record_failed_verification(&self, id: UserId) -> Result<i32> {
        let attempts: i32 = sqlx::query_scalar(
            "UPDATE users SET verification_attempts = verification_attempts + 1, updated_at = NOW() \
             WHERE id = $1 RETURNING verification_attempts",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(attempts)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn record_failed_reset(&self, id: UserId) -> Result<i32> {
        let attempts: i32 = sqlx::query_scalar(
            "UPDATE users SET reset_attempts = reset_attempts + 1, updated_at = NOW() \
             WHERE id = $1 RETURNING reset_attempts",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(attempts)
    }
}
