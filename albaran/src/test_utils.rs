//! Test utilities for integration testing.

use crate::{
    AppState, build_router,
    config::{Config, DatabaseConfig, EmailTransportConfig, PasswordConfig, StorageConfig},
    db::{
        handlers::{Repository, Store},
        memory::MemoryStore,
        models::users::UserDBResponse,
    },
    email::EmailService,
};
use axum_test::TestServer;
use serde_json::{Value, json};
use std::{path::Path, sync::Arc};
use tempfile::TempDir;

pub const TEST_PASSWORD: &str = "correct horse battery";

/// Configuration for tests: in-memory store, files and emails under `root`, cheap hashing.
pub fn create_test_config(root: &Path) -> Config {
    Config {
        database: DatabaseConfig::Memory,
        secret_key: Some("test-secret-key-for-albaran".to_string()),
        storage: StorageConfig {
            signatures_dir: root.join("firmas"),
            pdf_dir: root.join("pdfs"),
            uploads_dir: root.join("uploads"),
            ..Default::default()
        },
        auth: crate::config::AuthConfig {
            password: PasswordConfig {
                argon2_memory_kib: 1024,
                argon2_iterations: 1,
                ..Default::default()
            },
            ..Default::default()
        },
        email: crate::config::EmailConfig {
            transport: EmailTransportConfig::File {
                path: root.join("emails").to_string_lossy().into_owned(),
            },
            ..Default::default()
        },
        ..Default::default()
    }
}

/// A running router over a fresh memory store. The store stays reachable so tests can inspect
/// codes that are only ever emailed.
pub struct TestApp {
    pub server: TestServer,
    pub store: Arc<dyn Store>,
    pub config: Config,
    _dir: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config = create_test_config(dir.path());
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());

        let state = AppState::builder()
            .config(config.clone())
            .store(store.clone())
            .email(Arc::new(EmailService::new(&config).expect("Failed to create email service")))
            .build();
        let router = build_router(state).expect("Failed to build router");
        let server = TestServer::new(router.into_make_service()).expect("Failed to create test server");

        Self {
            server,
            store,
            config,
            _dir: dir,
        }
    }

    pub async fn user(&self, email: &str) -> UserDBResponse {
        self.store
            .users()
            .get_by_email(email)
            .await
            .expect("Failed to query user")
            .expect("User should exist")
    }

    /// Register `email` and return the bearer token and the verification code.
    pub async fn register(&self, email: &str) -> (String, String) {
        let response = self
            .server
            .post("/user/register")
            .json(&json!({ "email": email, "password": TEST_PASSWORD }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);

        let body: Value = response.json();
        let token = body["token"].as_str().expect("token").to_string();
        let code = body["user"]["code"].as_str().expect("code").to_string();
        (token, code)
    }

    /// Register and verify `email`, returning its bearer token.
    pub async fn verified_user(&self, email: &str) -> String {
        let (token, code) = self.register(email).await;
        self.server
            .post("/user/validate")
            .authorization_bearer(&token)
            .json(&json!({ "code": code }))
            .await
            .assert_status_ok();
        token
    }

    /// A verified user belonging to `company`.
    pub async fn company_user(&self, email: &str, company: &str) -> String {
        let token = self.verified_user(email).await;
        self.server
            .patch("/user/company")
            .authorization_bearer(&token)
            .json(&json!({
                "nombre": company,
                "cif": "B12345678",
                "direccion": "Calle Mayor 1, Madrid",
            }))
            .await
            .assert_status_ok();
        token
    }

    pub async fn create_client(&self, token: &str, name: &str) -> Value {
        let response = self
            .server
            .post("/client")
            .authorization_bearer(token)
            .json(&json!({ "name": name, "email": "contacto@cliente.es" }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        response.json()
    }

    pub async fn create_project(&self, token: &str, client_id: &str, name: &str) -> Value {
        let response = self
            .server
            .post("/project")
            .authorization_bearer(token)
            .json(&json!({ "nombre": name, "descripcion": "Obra", "clientId": client_id }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        response.json()
    }

    /// A draft note with one hour item, on a fresh client and project of the caller.
    pub async fn create_note(&self, token: &str) -> Value {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let client = self.create_client(token, &format!("Cliente {suffix}")).await;
        let client_id = client["id"].as_str().expect("client id");
        let project = self.create_project(token, client_id, "Reforma").await;

        let response = self
            .server
            .post("/deliverynote")
            .authorization_bearer(token)
            .json(&json!({
                "tipo": "horas",
                "clientId": client_id,
                "projectId": project["id"],
                "items": [{ "tipo": "hora", "descripcion": "Montaje", "cantidad": 1, "horas": 3.5 }],
            }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        response.json()
    }
}
