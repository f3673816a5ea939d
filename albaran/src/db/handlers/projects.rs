//! PostgreSQL repository for projects.

use crate::types::{ClientId, ProjectId, UserId, abbrev_uuid};
use crate::db::{
    errors::{DbError, Result},
    handlers::repository::{ListFilter, ProjectRepository, Repository},
    models::{
        company::Company,
        projects::{ProjectCreateDBRequest, ProjectDBResponse, ProjectUpdateDBRequest},
    },
};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, QueryBuilder};
use tracing::instrument;
use uuid::Uuid;

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct Project {
    id: ProjectId,
    owner_id: UserId,
    client_id: ClientId,
    name: String,
    description: Option<String>,
    company_name: Option<String>,
    company_tax_id: Option<String>,
    company_address: Option<String>,
    deleted: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<Project> for ProjectDBResponse {
    fn from(project: Project) -> Self {
        Self {
            id: project.id,
            owner_id: project.owner_id,
            client_id: project.client_id,
            name: project.name,
            description: project.description,
            company: Company::from_columns(project.company_name, project.company_tax_id, project.company_address),
            deleted: project.deleted,
            created_at: project.created_at,
            updated_at: project.updated_at,
        }
    }
}

pub struct Projects {
    db: PgPool,
}

impl Projects {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl Repository for Projects {
    type CreateRequest = ProjectCreateDBRequest;
    type UpdateRequest = ProjectUpdateDBRequest;
    type Response = ProjectDBResponse;
    type Id = ProjectId;

    #[instrument(skip(self, request), fields(owner_id = %abbrev_uuid(&request.owner_id), client_id = %abbrev_uuid(&request.client_id)), err)]
    async fn create(&self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let company = request.company.as_ref();
        let project = sqlx::query_as::<_, Project>(
            r#"
            INSERT INTO projects (id, owner_id, client_id, name, description,
                                  company_name, company_tax_id, company_address)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.owner_id)
        .bind(request.client_id)
        .bind(&request.name)
        .bind(request.description.as_deref())
        .bind(company.map(|c| c.name.as_str()))
        .bind(company.map(|c| c.tax_id.as_str()))
        .bind(company.map(|c| c.address.as_str()))
        .fetch_one(&self.db)
        .await?;

        Ok(project.into())
    }

    #[instrument(skip(self), fields(project_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&self, id: Self::Id) -> Result<Option<Self::Response>> {
        let project = sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        Ok(project.map(Into::into))
    }

    #[instrument(skip(self, request), fields(project_id = %abbrev_uuid(&id)), err)]
    async fn update(&self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let project = sqlx::query_as::<_, Project>(
            r#"
            UPDATE projects SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.name.as_deref())
        .bind(request.description.as_deref())
        .fetch_optional(&self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(project.into())
    }

    #[instrument(skip(self), fields(project_id = %abbrev_uuid(&id)), err)]
    async fn delete(&self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait::async_trait]
impl ProjectRepository for Projects {
    #[instrument(skip(self, filter), fields(archived = filter.archived), err)]
    async fn list(&self, filter: &ListFilter) -> Result<Vec<ProjectDBResponse>> {
        let mut query = QueryBuilder::new("SELECT * FROM projects WHERE deleted = ");
        query.push_bind(filter.archived);
        query.push(" AND ");
        filter.visibility.push_sql(&mut query);
        query.push(" ORDER BY created_at DESC");

        let projects = query.build_query_as::<Project>().fetch_all(&self.db).await?;

        Ok(projects.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self), fields(project_id = %abbrev_uuid(&id)), err)]
    async fn set_archived(&self, id: ProjectId, archived: bool) -> Result<Option<ProjectDBResponse>> {
        let project = sqlx::query_as::<_, Project>(
            "UPDATE projects SET deleted = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(archived)
        .fetch_optional(&self.db)
        .await?;

        Ok(project.map(Into::into))
    }
}
