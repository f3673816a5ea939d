//! Repository traits for store operations.
//!
//! A repository is the data access layer for one kind of record. [`Repository`] carries the
//! operations every record kind supports; each kind extends it with its own trait. The
//! PostgreSQL and in-memory backends both implement the full set, and [`Store`] hands out one
//! repository per record kind.

use crate::db::errors::Result;
use crate::db::models::{
    clients::{ClientCreateDBRequest, ClientDBResponse, ClientUpdateDBRequest},
    delivery_notes::{DeliveryNoteCreateDBRequest, DeliveryNoteDBResponse, DeliveryNoteUpdateDBRequest},
    projects::{ProjectCreateDBRequest, ProjectDBResponse, ProjectUpdateDBRequest},
    users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
};
use crate::db::visibility::Visibility;
use crate::types::{ClientId, DeliveryNoteId, ProjectId, UserId};
use chrono::{DateTime, Utc};

/// Base repository trait providing common store operations
///
/// This trait has separate associated types for create requests, update requests, and responses.
#[async_trait::async_trait]
pub trait Repository: Send + Sync {
    /// The request type for creating entities
    type CreateRequest: Send + Sync;

    /// The request type for updating entities
    type UpdateRequest: Send + Sync;

    /// The response type returned by operations
    type Response;

    /// The identifier type for lookups
    type Id: Send + Sync;

    /// Create a new entity
    async fn create(&self, request: &Self::CreateRequest) -> Result<Self::Response>;

    /// Get an entity by ID, regardless of who may see it
    async fn get_by_id(&self, id: Self::Id) -> Result<Option<Self::Response>>;

    /// Update an entity by ID. Missing entities are [`DbError::NotFound`](crate::db::errors::DbError::NotFound).
    async fn update(&self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response>;

    /// Permanently remove an entity. Returns false if nothing was removed.
    async fn delete(&self, id: Self::Id) -> Result<bool>;
}

/// Filter for listing clients, projects and delivery notes
#[derive(Debug, Clone)]
pub struct ListFilter {
    pub visibility: Visibility,
    /// List archived (soft-deleted) records instead of active ones
    pub archived: bool,
}

impl ListFilter {
    pub fn active(visibility: Visibility) -> Self {
        Self {
            visibility,
            archived: false,
        }
    }

    pub fn archived(visibility: Visibility) -> Self {
        Self {
            visibility,
            archived: true,
        }
    }
}

#[async_trait::async_trait]
pub trait UserRepository:
    Repository<CreateRequest = UserCreateDBRequest, UpdateRequest = UserUpdateDBRequest, Response = UserDBResponse, Id = UserId>
{
    async fn get_by_email(&self, email: &str) -> Result<Option<UserDBResponse>>;

    /// Count a wrong email verification code. Returns the new attempt count.
    async fn record_failed_verification(&self, id: UserId) -> Result<i32>;

    /// Count a wrong password reset code. Returns the new attempt count.
    async fn record_failed_reset(&self, id: UserId) -> Result<i32>;
}

#[async_trait::async_trait]
pub trait ClientRepository:
    Repository<CreateRequest = ClientCreateDBRequest, UpdateRequest = ClientUpdateDBRequest, Response = ClientDBResponse, Id = ClientId>
{
    async fn list(&self, filter: &ListFilter) -> Result<Vec<ClientDBResponse>>;

    /// Ids of every client created by `owner`, archived ones included
    async fn list_ids_by_owner(&self, owner: UserId) -> Result<Vec<ClientId>>;

    /// Archive or restore. Returns `None` if the client does not exist.
    async fn set_archived(&self, id: ClientId, archived: bool) -> Result<Option<ClientDBResponse>>;
}

#[async_trait::async_trait]
pub trait ProjectRepository:
    Repository<CreateRequest = ProjectCreateDBRequest, UpdateRequest = ProjectUpdateDBRequest, Response = ProjectDBResponse, Id = ProjectId>
{
    async fn list(&self, filter: &ListFilter) -> Result<Vec<ProjectDBResponse>>;

    /// Archive or restore. Returns `None` if the project does not exist.
    async fn set_archived(&self, id: ProjectId, archived: bool) -> Result<Option<ProjectDBResponse>>;
}

#[async_trait::async_trait]
pub trait DeliveryNoteRepository:
    Repository<
        CreateRequest = DeliveryNoteCreateDBRequest,
        UpdateRequest = DeliveryNoteUpdateDBRequest,
        Response = DeliveryNoteDBResponse,
        Id = DeliveryNoteId,
    >
{
    async fn list(&self, filter: &ListFilter) -> Result<Vec<DeliveryNoteDBResponse>>;

    /// Attach a signature to an unsigned note.
    ///
    /// Returns `None` when the note does not exist or is already signed; of two concurrent calls
    /// at most one gets `Some`.
    async fn sign(
        &self,
        id: DeliveryNoteId,
        signature_path: &str,
        signed_at: DateTime<Utc>,
    ) -> Result<Option<DeliveryNoteDBResponse>>;
}

/// A complete record store.
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    fn users(&self) -> &dyn UserRepository;
    fn clients(&self) -> &dyn ClientRepository;
    fn projects(&self) -> &dyn ProjectRepository;
    fn delivery_notes(&self) -> &dyn DeliveryNoteRepository;

    /// Release backend resources. Called once on shutdown.
    async fn close(&self);
}
