//! Store record models.
//!
//! These structs are what repositories accept and return. They carry no serialization concerns;
//! the API layer converts them into response types.
//!
//! - **Create requests** (`*CreateDBRequest`): everything needed to insert a row
//! - **Update requests** (`*UpdateDBRequest`): partial updates, `None` leaves a column untouched
//! - **Responses** (`*DBResponse`): a full record as stored

pub mod clients;
pub mod company;
pub mod delivery_notes;
pub mod projects;
pub mod users;
