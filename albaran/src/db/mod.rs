//! Store layer for data persistence and access.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐
//! │   Handlers   │  (API request handlers)
//! └──────┬───────┘
//!        │  Arc<dyn Store>
//!        ↓
//! ┌──────────────┐
//! │ Repositories │  (db::handlers - one trait per record kind)
//! └──────┬───────┘
//!        │
//!        ├──────────────────┐
//!        ↓                  ↓
//! ┌──────────────┐   ┌──────────────┐
//! │  PostgreSQL  │   │   Memory     │
//! └──────────────┘   └──────────────┘
//! ```
//!
//! # Modules
//!
//! - [`handlers`]: Repository traits and the PostgreSQL implementation
//! - [`memory`]: In-process implementation for tests and throwaway runs
//! - [`models`]: Record structures passed to and returned from repositories
//! - [`visibility`]: The owner-or-company filter applied to clients, projects and notes
//! - [`errors`]: Store error types
//!
//! ## Example Usage
//!
//! ```ignore
//! use albaran::db::{handlers::PgStore, handlers::repository::{ListFilter, Store}, visibility::Visibility};
//!
//! async fn example(pool: sqlx::PgPool, user: &UserDBResponse) -> albaran::db::errors::Result<()> {
//!     let store = PgStore::new(pool);
//!     let clients = store.clients().list(&ListFilter::active(Visibility::for_user(user))).await?;
//!     println!("{} clients visible", clients.len());
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod handlers;
pub mod memory;
pub mod models;
pub mod visibility;
