//! In-process record store.
//!
//! Holds every record in hash maps behind [`parking_lot::RwLock`]s and mirrors the PostgreSQL
//! constraints (unique emails, unique client names per owner, unique project names per owner and
//! client) and the conditional signing update. Nothing survives a restart.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::{
        ClientRepository, DeliveryNoteRepository, ListFilter, ProjectRepository, Repository, Store, UserRepository,
    },
    models::{
        clients::{ClientCreateDBRequest, ClientDBResponse, ClientUpdateDBRequest},
        delivery_notes::{DeliveryNoteCreateDBRequest, DeliveryNoteDBResponse, DeliveryNoteUpdateDBRequest, NoteState},
        projects::{ProjectCreateDBRequest, ProjectDBResponse, ProjectUpdateDBRequest},
        users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
    },
};
use crate::types::{ClientId, DeliveryNoteId, ProjectId, UserId, abbrev_uuid};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryStore {
    users: MemoryUsers,
    clients: MemoryClients,
    projects: MemoryProjects,
    delivery_notes: MemoryDeliveryNotes,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl Store for MemoryStore {
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

    async fn close(&self) {}
}

/// Newest first, matching `ORDER BY created_at DESC`.
fn newest_first<T>(mut records: Vec<T>, created_at: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    records.sort_by_key(|r| std::cmp::Reverse(created_at(r)));
    records
}

#[derive(Default)]
pub struct MemoryUsers {
    rows: RwLock<HashMap<UserId, UserDBResponse>>,
}

#[async_trait::async_trait]
impl Repository for MemoryUsers {
    type CreateRequest = UserCreateDBRequest;
    type UpdateRequest = UserUpdateDBRequest;
    type Response = UserDBResponse;
    type Id = UserId;

    #[instrument(skip(self, request), fields(role = ?request.role), err)]
    async fn create(&self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let mut rows = self.rows.write();
        if rows.values().any(|u| u.email == request.email) {
            return Err(DbError::unique("users", "users_email_key"));
        }

        let now = Utc::now();
        let user = UserDBResponse {
            id: Uuid::new_v4(),
            email: request.email.clone(),
            password_hash: request.password_hash.clone(),
            role: request.role,
            verified: false,
            verification_code: request.verification_code.clone(),
            verification_attempts: 0,
            reset_code: None,
            reset_attempts: 0,
            deleted: false,
            first_name: None,
            last_name: None,
            nif: None,
            company: request.company.clone(),
            logo_path: None,
            created_at: now,
            updated_at: now,
        };
        rows.insert(user.id, user.clone());
        Ok(user)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&self, id: Self::Id) -> Result<Option<Self::Response>> {
        Ok(self.rows.read().get(&id).cloned())
    }

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn update(&self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let mut rows = self.rows.write();
        let user = rows.get_mut(&id).ok_or(DbError::NotFound)?;

        if let Some(hash) = &request.password_hash {
            user.password_hash = hash.clone();
        }
        if let Some(verified) = request.verified {
            user.verified = verified;
        }
        if let Some(code) = &request.reset_code {
            user.reset_code = code.clone();
        }
        if let Some(attempts) = request.reset_attempts {
            user.reset_attempts = attempts;
        }
        if let Some(personal) = &request.personal {
            user.first_name = Some(personal.first_name.clone());
            user.last_name = Some(personal.last_name.clone());
            user.nif = Some(personal.nif.clone());
        }
        if let Some(company) = &request.company {
            user.company = Some(company.clone());
        }
        if let Some(logo) = &request.logo_path {
            user.logo_path = Some(logo.clone());
        }
        if let Some(deleted) = request.deleted {
            user.deleted = deleted;
        }
        user.updated_at = Utc::now();

        Ok(user.clone())
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn delete(&self, id: Self::Id) -> Result<bool> {
        Ok(self.rows.write().remove(&id).is_some())
    }
}

#[async_trait::async_trait]
impl UserRepository for MemoryUsers {
    #[instrument(skip(self, email), err)]
    async fn get_by_email(&self, email: &str) -> Result<Option<UserDBResponse>> {
        Ok(self.rows.read().values().find(|u| u.email == email).cloned())
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn record_failed_verification(&self, id: UserId) -> Result<i32> {
        let mut rows = self.rows.write();
        let user = rows.get_mut(&id).ok_or(DbError::NotFound)?;
        user.verification_attempts += 1;
        user.updated_at = Utc::now();
        Ok(user.verification_attempts)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn record_failed_reset(&self, id: UserId) -> Result<i32> {
        let mut rows = self.rows.write();
        let user = rows.get_mut(&id).ok_or(DbError::NotFound)?;
        user.reset_attempts += 1;
        user.updated_at = Utc::now();
        Ok(user.reset_attempts)
    }
}

#[derive(Default)]
pub struct MemoryClients {
    rows: RwLock<HashMap<ClientId, ClientDBResponse>>,
}

#[async_trait::async_trait]
impl Repository for MemoryClients {
    type CreateRequest = ClientCreateDBRequest;
    type UpdateRequest = ClientUpdateDBRequest;
    type Response = ClientDBResponse;
    type Id = ClientId;

    #[instrument(skip(self, request), fields(owner_id = %abbrev_uuid(&request.owner_id)), err)]
    async fn create(&self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let mut rows = self.rows.write();
        if rows
            .values()
            .any(|c| c.owner_id == request.owner_id && c.name == request.name)
        {
            return Err(DbError::unique("clients", "clients_owner_id_name_key"));
        }

        let now = Utc::now();
        let client = ClientDBResponse {
            id: Uuid::new_v4(),
            owner_id: request.owner_id,
            name: request.name.clone(),
            email: request.email.clone(),
            phone: request.phone.clone(),
            address: request.address.clone(),
            company: request.company.clone(),
            deleted: false,
            created_at: now,
            updated_at: now,
        };
        rows.insert(client.id, client.clone());
        Ok(client)
    }

    #[instrument(skip(self), fields(client_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&self, id: Self::Id) -> Result<Option<Self::Response>> {
        Ok(self.rows.read().get(&id).cloned())
    }

    #[instrument(skip(self, request), fields(client_id = %abbrev_uuid(&id)), err)]
    async fn update(&self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let mut rows = self.rows.write();
        let owner_id = rows.get(&id).ok_or(DbError::NotFound)?.owner_id;

        if let Some(name) = &request.name
            && rows
                .values()
                .any(|c| c.id != id && c.owner_id == owner_id && &c.name == name)
        {
            return Err(DbError::unique("clients", "clients_owner_id_name_key"));
        }

        let client = rows.get_mut(&id).ok_or(DbError::NotFound)?;
        if let Some(name) = &request.name {
            client.name = name.clone();
        }
        if let Some(email) = &request.email {
            client.email = Some(email.clone());
        }
        if let Some(phone) = &request.phone {
            client.phone = Some(phone.clone());
        }
        if let Some(address) = &request.address {
            client.address = Some(address.clone());
        }
        client.updated_at = Utc::now();

        Ok(client.clone())
    }

    #[instrument(skip(self), fields(client_id = %abbrev_uuid(&id)), err)]
    async fn delete(&self, id: Self::Id) -> Result<bool> {
        Ok(self.rows.write().remove(&id).is_some())
    }
}

#[async_trait::async_trait]
impl ClientRepository for MemoryClients {
    #[instrument(skip(self, filter), fields(archived = filter.archived), err)]
    async fn list(&self, filter: &ListFilter) -> Result<Vec<ClientDBResponse>> {
        let clients = self
            .rows
            .read()
            .values()
            .filter(|c| c.deleted == filter.archived && filter.visibility.permits(c.owner_id, c.company.as_ref()))
            .cloned()
            .collect();

        Ok(newest_first(clients, |c: &ClientDBResponse| c.created_at))
    }

    #[instrument(skip(self), fields(owner_id = %abbrev_uuid(&owner)), err)]
    async fn list_ids_by_owner(&self, owner: UserId) -> Result<Vec<ClientId>> {
        let mut owned: Vec<_> = self
            .rows
            .read()
            .values()
            .filter(|c| c.owner_id == owner)
            .map(|c| (c.created_at, c.id))
            .collect();
        owned.sort();

        Ok(owned.into_iter().map(|(_, id)| id).collect())
    }

    #[instrument(skip(self), fields(client_id = %abbrev_uuid(&id)), err)]
    async fn set_archived(&self, id: ClientId, archived: bool) -> Result<Option<ClientDBResponse>> {
        let mut rows = self.rows.write();
        Ok(rows.get_mut(&id).map(|client| {
            client.deleted = archived;
            client.updated_at = Utc::now();
            client.clone()
        }))
    }
}

#[derive(Default)]
pub struct MemoryProjects {
    rows: RwLock<HashMap<ProjectId, ProjectDBResponse>>,
}

#[async_trait::async_trait]
impl Repository for MemoryProjects {
    type CreateRequest = ProjectCreateDBRequest;
    type UpdateRequest = ProjectUpdateDBRequest;
    type Response = ProjectDBResponse;
    type Id = ProjectId;

    #[instrument(skip(self, request), fields(owner_id = %abbrev_uuid(&request.owner_id), client_id = %abbrev_uuid(&request.client_id)), err)]
    async fn create(&self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let mut rows = self.rows.write();
        if rows.values().any(|p| {
            p.owner_id == request.owner_id && p.client_id == request.client_id && p.name == request.name
        }) {
            return Err(DbError::unique("projects", "projects_owner_id_client_id_name_key"));
        }

        let now = Utc::now();
        let project = ProjectDBResponse {
            id: Uuid::new_v4(),
            owner_id: request.owner_id,
            client_id: request.client_id,
            name: request.name.clone(),
            description: request.description.clone(),
            company: request.company.clone(),
            deleted: false,
            created_at: now,
            updated_at: now,
        };
        rows.insert(project.id, project.clone());
        Ok(project)
    }

    #[instrument(skip(self), fields(project_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&self, id: Self::Id) -> Result<Option<Self::Response>> {
        Ok(self.rows.read().get(&id).cloned())
    }

    #[instrument(skip(self, request), fields(project_id = %abbrev_uuid(&id)), err)]
    async fn update(&self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let mut rows = self.rows.write();
        let (owner_id, client_id) = rows
            .get(&id)
            .map(|p| (p.owner_id, p.client_id))
            .ok_or(DbError::NotFound)?;

        if let Some(name) = &request.name
            && rows
                .values()
                .any(|p| p.id != id && p.owner_id == owner_id && p.client_id == client_id && &p.name == name)
        {
            return Err(DbError::unique("projects", "projects_owner_id_client_id_name_key"));
        }

        let project = rows.get_mut(&id).ok_or(DbError::NotFound)?;
        if let Some(name) = &request.name {
            project.name = name.clone();
        }
        if let Some(description) = &request.description {
            project.description = Some(description.clone());
        }
        project.updated_at = Utc::now();

        Ok(project.clone())
    }

    #[instrument(skip(self), fields(project_id = %abbrev_uuid(&id)), err)]
    async fn delete(&self, id: Self::Id) -> Result<bool> {
        Ok(self.rows.write().remove(&id).is_some())
    }
}

#[async_trait::async_trait]
impl ProjectRepository for MemoryProjects {
    #[instrument(skip(self, filter), fields(archived = filter.archived), err)]
    async fn list(&self, filter: &ListFilter) -> Result<Vec<ProjectDBResponse>> {
        let projects = self
            .rows
            .read()
            .values()
            .filter(|p| p.deleted == filter.archived && filter.visibility.permits(p.owner_id, p.company.as_ref()))
            .cloned()
            .collect();

        Ok(newest_first(projects, |p: &ProjectDBResponse| p.created_at))
    }

    #[instrument(skip(self), fields(project_id = %abbrev_uuid(&id)), err)]
    async fn set_archived(&self, id: ProjectId, archived: bool) -> Result<Option<ProjectDBResponse>> {
        let mut rows = self.rows.write();
        Ok(rows.get_mut(&id).map(|project| {
            project.deleted = archived;
            project.updated_at = Utc::now();
            project.clone()
        }))
    }
}

#[derive(Default)]
pub struct MemoryDeliveryNotes {
    rows: RwLock<HashMap<DeliveryNoteId, DeliveryNoteDBResponse>>,
}

#[async_trait::async_trait]
impl Repository for MemoryDeliveryNotes {
    type CreateRequest = DeliveryNoteCreateDBRequest;
    type UpdateRequest = DeliveryNoteUpdateDBRequest;
    type Response = DeliveryNoteDBResponse;
    type Id = DeliveryNoteId;

    #[instrument(skip(self, request), fields(owner_id = %abbrev_uuid(&request.owner_id), kind = %request.kind, items = request.items.len()), err)]
    async fn create(&self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let now = Utc::now();
        let note = DeliveryNoteDBResponse {
            id: Uuid::new_v4(),
            kind: request.kind,
            items: request.items.clone(),
            owner_id: request.owner_id,
            client_id: request.client_id,
            project_id: request.project_id,
            company: request.company.clone(),
            state: NoteState::Draft,
            pdf_path: None,
            deleted: false,
            issued_at: now,
            created_at: now,
            updated_at: now,
        };
        self.rows.write().insert(note.id, note.clone());
        Ok(note)
    }

    #[instrument(skip(self), fields(note_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&self, id: Self::Id) -> Result<Option<Self::Response>> {
        Ok(self.rows.read().get(&id).cloned())
    }

    #[instrument(skip(self, request), fields(note_id = %abbrev_uuid(&id)), err)]
    async fn update(&self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let mut rows = self.rows.write();
        let note = rows.get_mut(&id).ok_or(DbError::NotFound)?;
        if let Some(path) = &request.pdf_path {
            note.pdf_path = Some(path.clone());
        }
        note.updated_at = Utc::now();
        Ok(note.clone())
    }

    #[instrument(skip(self), fields(note_id = %abbrev_uuid(&id)), err)]
    async fn delete(&self, id: Self::Id) -> Result<bool> {
        let mut rows = self.rows.write();
        match rows.get(&id) {
            Some(note) if !note.state.is_signed() => Ok(rows.remove(&id).is_some()),
            _ => Ok(false),
        }
    }
}

#[async_trait::async_trait]
impl DeliveryNoteRepository for MemoryDeliveryNotes {
    #[instrument(skip(self, filter), err)]
    async fn list(&self, filter: &ListFilter) -> Result<Vec<DeliveryNoteDBResponse>> {
        let notes = self
            .rows
            .read()
            .values()
            .filter(|n| n.deleted == filter.archived && filter.visibility.permits(n.owner_id, n.company.as_ref()))
            .cloned()
            .collect();

        Ok(newest_first(notes, |n: &DeliveryNoteDBResponse| n.issued_at))
    }

    #[instrument(skip(self, signature_path), fields(note_id = %abbrev_uuid(&id)), err)]
    async fn sign(
        &self,
        id: DeliveryNoteId,
        signature_path: &str,
        signed_at: DateTime<Utc>,
    ) -> Result<Option<DeliveryNoteDBResponse>> {
        let mut rows = self.rows.write();
        let Some(note) = rows.get_mut(&id) else {
            return Ok(None);
        };

        match note.state.sign(signature_path.to_string(), signed_at) {
            Ok(state) => {
                note.state = state;
                note.updated_at = Utc::now();
                Ok(Some(note.clone()))
            }
            Err(_) => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::users::Role;
    use crate::db::models::{
        company::Company,
        delivery_notes::{DeliveryNoteItem, DeliveryNoteKind, ItemKind},
    };
    use crate::db::visibility::Visibility;

    fn acme() -> Company {
        Company {
            name: "Acme SL".to_string(),
            tax_id: "B12345678".to_string(),
            address: "Calle Mayor 1".to_string(),
        }
    }

    fn client_request(owner_id: UserId, name: &str, company: Option<Company>) -> ClientCreateDBRequest {
        ClientCreateDBRequest {
            owner_id,
            name: name.to_string(),
            email: None,
            phone: None,
            address: None,
            company,
        }
    }

    fn note_request(owner_id: UserId) -> DeliveryNoteCreateDBRequest {
        DeliveryNoteCreateDBRequest {
            kind: DeliveryNoteKind::Horas,
            items: vec![DeliveryNoteItem {
                kind: ItemKind::Hora,
                description: "Montaje".to_string(),
                quantity: 1.0,
                hours: Some(4.0),
                price: None,
            }],
            owner_id,
            client_id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            company: None,
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_is_unique_violation() {
        let store = MemoryStore::new();
        let request = UserCreateDBRequest {
            email: "a@example.com".to_string(),
            password_hash: "hash".to_string(),
            role: Role::User,
            verification_code: "123456".to_string(),
            company: None,
        };

        store.users().create(&request).await.unwrap();
        let err = store.users().create(&request).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { table: Some(ref t), .. } if t == "users"));
    }

    #[tokio::test]
    async fn test_reset_code_can_be_cleared() {
        let store = MemoryStore::new();
        let user = store
            .users()
            .create(&UserCreateDBRequest {
                email: "a@example.com".to_string(),
                password_hash: "hash".to_string(),
                role: Role::User,
                verification_code: "123456".to_string(),
                company: None,
            })
            .await
            .unwrap();

        let updated = store
            .users()
            .update(
                user.id,
                &UserUpdateDBRequest {
                    reset_code: Some(Some("654321".to_string())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.reset_code.as_deref(), Some("654321"));

        assert_eq!(store.users().record_failed_reset(user.id).await.unwrap(), 1);

        let cleared = store
            .users()
            .update(
                user.id,
                &UserUpdateDBRequest {
                    reset_code: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(cleared.reset_code, None);
        assert_eq!(cleared.reset_attempts, 1);
    }

    #[tokio::test]
    async fn test_client_names_are_unique_per_owner() {
        let store = MemoryStore::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        store.clients().create(&client_request(a, "Acme", None)).await.unwrap();
        assert!(store.clients().create(&client_request(a, "Acme", None)).await.is_err());
        assert!(store.clients().create(&client_request(b, "Acme", None)).await.is_ok());
    }

    #[tokio::test]
    async fn test_list_applies_visibility_and_archive_flag() {
        let store = MemoryStore::new();
        let me = Uuid::new_v4();
        let mate = Uuid::new_v4();
        let stranger = Uuid::new_v4();

        let mine = store.clients().create(&client_request(me, "Mine", None)).await.unwrap();
        store
            .clients()
            .create(&client_request(mate, "Shared", Some(acme())))
            .await
            .unwrap();
        store
            .clients()
            .create(&client_request(stranger, "Hidden", None))
            .await
            .unwrap();

        let alone = Visibility::new(me, None);
        let names: Vec<_> = store
            .clients()
            .list(&ListFilter::active(alone.clone()))
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Mine"]);

        let with_company = Visibility::new(me, Some(&acme()));
        assert_eq!(store.clients().list(&ListFilter::active(with_company)).await.unwrap().len(), 2);

        store.clients().set_archived(mine.id, true).await.unwrap();
        assert!(store.clients().list(&ListFilter::active(alone.clone())).await.unwrap().is_empty());
        assert_eq!(store.clients().list(&ListFilter::archived(alone)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sign_succeeds_once() {
        let store = MemoryStore::new();
        let note = store.delivery_notes().create(&note_request(Uuid::new_v4())).await.unwrap();

        let signed = store
            .delivery_notes()
            .sign(note.id, "/firmas/1.png", Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(signed.state.signature_path(), Some("/firmas/1.png"));

        let again = store.delivery_notes().sign(note.id, "/firmas/2.png", Utc::now()).await.unwrap();
        assert!(again.is_none());

        let stored = store.delivery_notes().get_by_id(note.id).await.unwrap().unwrap();
        assert_eq!(stored.state.signature_path(), Some("/firmas/1.png"));
    }

    #[tokio::test]
    async fn test_signed_notes_are_not_deleted() {
        let store = MemoryStore::new();
        let draft = store.delivery_notes().create(&note_request(Uuid::new_v4())).await.unwrap();
        let signed = store.delivery_notes().create(&note_request(Uuid::new_v4())).await.unwrap();
        store
            .delivery_notes()
            .sign(signed.id, "/firmas/1.png", Utc::now())
            .await
            .unwrap();

        assert!(store.delivery_notes().delete(draft.id).await.unwrap());
        assert!(!store.delivery_notes().delete(signed.id).await.unwrap());
        assert!(store.delivery_notes().get_by_id(signed.id).await.unwrap().is_some());
    }
}
