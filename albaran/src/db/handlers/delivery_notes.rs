//! PostgreSQL repository for delivery notes.

use crate::types::{ClientId, DeliveryNoteId, ProjectId, UserId, abbrev_uuid};
use crate::db::{
    errors::{DbError, Result},
    handlers::repository::{DeliveryNoteRepository, ListFilter, Repository},
    models::{
        company::Company,
        delivery_notes::{
            DeliveryNoteCreateDBRequest, DeliveryNoteDBResponse, DeliveryNoteItem, DeliveryNoteKind,
            DeliveryNoteUpdateDBRequest, NoteState,
        },
    },
};
use anyhow::anyhow;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, QueryBuilder, types::Json};
use tracing::instrument;
use uuid::Uuid;

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct DeliveryNote {
    id: DeliveryNoteId,
    kind: DeliveryNoteKind,
    items: Json<Vec<DeliveryNoteItem>>,
    owner_id: UserId,
    client_id: ClientId,
    project_id: ProjectId,
    company_name: Option<String>,
    company_tax_id: Option<String>,
    company_address: Option<String>,
    signed: bool,
    signature_path: Option<String>,
    signed_at: Option<DateTime<Utc>>,
    pdf_path: Option<String>,
    deleted: bool,
    issued_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<DeliveryNote> for DeliveryNoteDBResponse {
    type Error = DbError;

    fn try_from(note: DeliveryNote) -> Result<Self> {
        let state = match (note.signed, note.signature_path, note.signed_at) {
            (false, _, _) => NoteState::Draft,
            (true, Some(signature_path), signed_at) => NoteState::Signed {
                signature_path,
                signed_at: signed_at.unwrap_or(note.updated_at),
            },
            (true, None, _) => {
                return Err(DbError::Other(anyhow!(
                    "delivery note {} is signed without a signature path",
                    note.id
                )));
            }
        };

        Ok(Self {
            id: note.id,
            kind: note.kind,
            items: note.items.0,
            owner_id: note.owner_id,
            client_id: note.client_id,
            project_id: note.project_id,
            company: Company::from_columns(note.company_name, note.company_tax_id, note.company_address),
            state,
            pdf_path: note.pdf_path,
            deleted: note.deleted,
            issued_at: note.issued_at,
            created_at: note.created_at,
            updated_at: note.updated_at,
        })
    }
}

pub struct DeliveryNotes {
    db: PgPool,
}

impl DeliveryNotes {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl Repository for DeliveryNotes {
    type CreateRequest = DeliveryNoteCreateDBRequest;
    type UpdateRequest = DeliveryNoteUpdateDBRequest;
    type Response = DeliveryNoteDBResponse;
    type Id = DeliveryNoteId;

    #[instrument(skip(self, request), fields(owner_id = %abbrev_uuid(&request.owner_id), kind = %request.kind, items = request.items.len()), err)]
    async fn create(&self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let company = request.company.as_ref();
        let note = sqlx::query_as::<_, DeliveryNote>(
            r#"
            INSERT INTO delivery_notes (id, kind, items, owner_id, client_id, project_id,
                                        company_name, company_tax_id, company_address)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.kind)
        .bind(Json(&request.items))
        .bind(request.owner_id)
        .bind(request.client_id)
        .bind(request.project_id)
        .bind(company.map(|c| c.name.as_str()))
        .bind(company.map(|c| c.tax_id.as_str()))
        .bind(company.map(|c| c.address.as_str()))
        .fetch_one(&self.db)
        .await?;

        note.try_into()
    }

    #[instrument(skip(self), fields(note_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&self, id: Self::Id) -> Result<Option<Self::Response>> {
        let note = sqlx::query_as::<_, DeliveryNote>("SELECT * FROM delivery_notes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        note.map(TryInto::try_into).transpose()
    }

    #[instrument(skip(self, request), fields(note_id = %abbrev_uuid(&id)), err)]
    async fn update(&self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let note = sqlx::query_as::<_, DeliveryNote>(
            r#"
            UPDATE delivery_notes SET
                pdf_path = COALESCE($2, pdf_path),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.pdf_path.as_deref())
        .fetch_optional(&self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        note.try_into()
    }

    #[instrument(skip(self), fields(note_id = %abbrev_uuid(&id)), err)]
    async fn delete(&self, id: Self::Id) -> Result<bool> {
        // Signed notes are never removed, whatever the caller checked beforehand
        let result = sqlx::query("DELETE FROM delivery_notes WHERE id = $1 AND signed = false")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait::async_trait]
impl DeliveryNoteRepository for DeliveryNotes {
    #[instrument(skip(self, filter), err)]
    async fn list(&self, filter: &ListFilter) -> Result<Vec<DeliveryNoteDBResponse>> {
        let mut query = QueryBuilder::new("SELECT * FROM delivery_notes WHERE deleted = ");
        query.push_bind(filter.archived);
        query.push(" AND ");
        filter.visibility.push_sql(&mut query);
        query.push(" ORDER BY issued_at DESC");

        let notes = query.build_query_as::<DeliveryNote>().fetch_all(&self.db).await?;

        notes.into_iter().map(TryInto::try_into).collect()
    }

    #[instrument(skip(self, signature_path), fields(note_id = %abbrev_uuid(&id)), err)]
    async fn sign(
        &self,
        id: DeliveryNoteId,
        signature_path: &str,
        signed_at: DateTime<Utc>,
    ) -> Result<Option<DeliveryNoteDBResponse>> {
        let note = sqlx::query_as::<_, DeliveryNote>(
            r#"
            UPDATE delivery_notes SET
                signed = true,
                signature_path = $2,
                signed_at = $3,
                updated_at = NOW()
            WHERE id = $1 AND signed = false
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(signature_path)
        .bind(signed_at)
        .fetch_optional(&self.db)
        .await?;

        note.map(TryInto::try_into).transpose()
    }
}
