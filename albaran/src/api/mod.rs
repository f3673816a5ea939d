//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for every endpoint
//! - **[`models`]**: Request/response data structures
//!
//! # API Structure
//!
//! - **Users** (`/user/*`): registration, verification, login, profile, company, passwords, guests
//! - **Clients** (`/client/*`): client registry with archive and recover
//! - **Projects** (`/project/*`): projects of a client, same shape as clients
//! - **Delivery notes** (`/deliverynote/*`): notes, signing and PDF export
//!
//! All endpoints are documented with `utoipa`; see [`crate::openapi`].

pub mod handlers;
pub mod models;
