//! Authentication: password hashing, bearer tokens and the current-user extractor.
//!
//! Registration and login return a signed JWT. Every other protected route expects it in an
//! `Authorization: Bearer <token>` header; the [`CurrentUser`](crate::api::models::users::CurrentUser)
//! extractor verifies it and reloads the account so that deleted accounts lose access at once.
//!
//! # Modules
//!
//! - [`current_user`]: Extractor for the authenticated user in handlers
//! - [`password`]: Argon2 hashing and one-time code generation
//! - [`session`]: JWT creation and verification

pub mod current_user;
pub mod password;
pub mod session;
