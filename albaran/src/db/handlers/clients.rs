//! PostgreSQL repository for clients.

use crate::types::{ClientId, UserId, abbrev_uuid};
use crate::db::{
    errors::{DbError, Result},
    handlers::repository::{ClientRepository, ListFilter, Repository},
    models::{
        clients::{ClientCreateDBRequest, ClientDBResponse, ClientUpdateDBRequest},
        company::Company,
    },
};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, QueryBuilder};
use tracing::instrument;
use uuid::Uuid;

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct Client {
    id: ClientId,
    owner_id: UserId,
    name: String,
    email: Option<String>,
    phone: Option<String>,
    address: Option<String>,
    company_name: Option<String>,
    company_tax_id: Option<String>,
    company_address: Option<String>,
    deleted: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<Client> for ClientDBResponse {
    fn from(client: Client) -> Self {
        Self {
            id: client.id,
            owner_id: client.owner_id,
            name: client.name,
            email: client.email,
            phone: client.phone,
            address: client.address,
            company: Company::from_columns(client.company_name, client.company_tax_id, client.company_address),
            deleted: client.deleted,
            created_at: client.created_at,
            updated_at: client.updated_at,
        }
    }
}

pub struct Clients {
    db: PgPool,
}

impl Clients {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl Repository for Clients {
    type CreateRequest = ClientCreateDBRequest;
    type UpdateRequest = ClientUpdateDBRequest;
    type Response = ClientDBResponse;
    type Id = ClientId;

    #[instrument(skip(self, request), fields(owner_id = %abbrev_uuid(&request.owner_id)), err)]
    async fn create(&self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let company = request.company.as_ref();
        let client = sqlx::query_as::<_, Client>(
            r#"
            INSERT INTO clients (id, owner_id, name, email, phone, address,
                                 company_name, company_tax_id, company_address)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.owner_id)
        .bind(&request.name)
        .bind(request.email.as_deref())
        .bind(request.phone.as_deref())
        .bind(request.address.as_deref())
        .bind(company.map(|c| c.name.as_str()))
        .bind(company.map(|c| c.tax_id.as_str()))
        .bind(company.map(|c| c.address.as_str()))
        .fetch_one(&self.db)
        .await?;

        Ok(client.into())
    }

    #[instrument(skip(self), fields(client_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&self, id: Self::Id) -> Result<Option<Self::Response>> {
        let client = sqlx::query_as::<_, Client>("SELECT * FROM clients WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        Ok(client.map(Into::into))
    }

    #[instrument(skip(self, request), fields(client_id = %abbrev_uuid(&id)), err)]
    async fn update(&self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let client = sqlx::query_as::<_, Client>(
            r#"
            UPDATE clients SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                phone = COALESCE($4, phone),
                address = COALESCE($5, address),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.name.as_deref())
        .bind(request.email.as_deref())
        .bind(request.phone.as_deref())
        .bind(request.address.as_deref())
        .fetch_optional(&self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(client.into())
    }

    #[instrument(skip(self), fields(client_id = %abbrev_uuid(&id)), err)]
    async fn delete(&self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM clients WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait::async_trait]
impl ClientRepository for Clients {
    #[instrument(skip(self, filter), fields(archived = filter.archived), err)]
    async fn list(&self, filter: &ListFilter) -> Result<Vec<ClientDBResponse>> {
        let mut query = QueryBuilder::new("SELECT * FROM clients WHERE deleted = ");
        query.push_bind(filter.archived);
        query.push(" AND ");
        filter.visibility.push_sql(&mut query);
        query.push(" ORDER BY created_at DESC");

        let clients = query.build_query_as::<Client>().fetch_all(&self.db).await?;

        Ok(clients.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self), fields(owner_id = %abbrev_uuid(&owner)), err)]
    async fn list_ids_by_owner(&self, owner: UserId) -> Result<Vec<ClientId>> {
        let ids = sqlx::query_scalar::<_, ClientId>("SELECT id FROM clients WHERE owner_id = $1 ORDER BY created_at")
            .bind(owner)
            .fetch_all(&self.db)
            .await?;

        Ok(ids)
    }

    #[instrument(skip(self), fields(client_id = %abbrev_uuid(&id)), err)]
    async fn set_archived(&self, id: ClientId, archived: bool) -> Result<Option<ClientDBResponse>> {
        let client = sqlx::query_as::<_, Client>(
            "UPDATE clients SET deleted = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(archived)
        .fetch_optional(&self.db)
        .await?;

        Ok(client.map(Into::into))
    }
}
