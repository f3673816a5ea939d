//! HTTP request handlers, one module per resource.
//!
//! - [`users`]: account lifecycle, company profile and guest invitations
//! - [`clients`]: client CRUD, archive and recover
//! - [`projects`]: project CRUD, archive and recover
//! - [`delivery_notes`]: delivery notes, signatures and PDF export
//!
//! Every handler except registration, login and the password reset pair takes a
//! [`CurrentUser`](crate::api::models::users::CurrentUser), which rejects the request with 401
//! unless it carries a valid bearer token for a live account.

pub mod clients;
pub mod delivery_notes;
pub mod projects;
pub mod users;
