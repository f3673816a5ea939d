//! Repository implementations backed by PostgreSQL.
//!
//! Each repository wraps the shared pool, builds queries at runtime and maps rows into the models
//! from [`crate::db::models`]:
//!
//! - [`Users`]: accounts, credentials, verification and reset codes
//! - [`Clients`]: clients, unique by name per owner
//! - [`Projects`]: projects, unique by name per owner and client
//! - [`DeliveryNotes`]: delivery notes and their one-way signing
//!
//! [`PgStore`] bundles them behind the [`Store`] trait.

pub mod clients;
pub mod delivery_notes;
pub mod projects;
pub mod repository;
pub mod users;

pub use clients::Clients;
pub use delivery_notes::DeliveryNotes;
pub use projects::Projects;
pub use repository::{Repository, Store};
pub use users::Users;

use repository::{ClientRepository, DeliveryNoteRepository, ProjectRepository, UserRepository};
use sqlx::PgPool;

pub struct PgStore {
    pool: PgPool,
    users: Users,
    clients: Clients,
    projects: Projects,
    delivery_notes: DeliveryNotes,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            users: Users::new(pool.clone()),
            clients: Clients::new(pool.clone()),
            projects: Projects::new(pool.clone()),
            delivery_notes: DeliveryNotes::new(pool.clone()),
            pool,
        }
    }
}

#[async_trait::async_trait]
impl Store for PgStore {
    fn users(&self) -> &dyn UserRepository {
        &self.users
    }

    fn clients(&self) -> &dyn ClientRepository {
        &self.clients
    }

    fn projects(&self) -> &dyn ProjectRepository {
        &self.projects
    }

    fn delivery_notes(&self) -> &dyn DeliveryNoteRepository {
        &self.delivery_notes
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
