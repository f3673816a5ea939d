//! # albaran: delivery notes for small companies
//!
//! A REST service where users keep their clients, the projects done for each client, and the
//! delivery notes ("albaranes") recording hours or materials delivered under a project. Notes are
//! signed once by the client and can be exported as PDF.
//!
//! ## Tenancy
//!
//! Every record has an owner. A user who declares a company sees the records of every user
//! declaring the same company name, in addition to their own; see [`db::visibility`]. Owners can
//! invite guests into their company.
//!
//! ## Architecture
//!
//! - **[`api`]**: axum handlers and wire models
//! - **[`auth`]**: password hashing, session tokens and the bearer extractor
//! - **[`db`]**: repository traits with PostgreSQL and in-memory backends
//! - **[`pdf`]**: delivery note rendering
//! - **[`config`]**, **[`telemetry`]**, **[`errors`]**: ambient plumbing
//!
//! ## Lifecycle
//!
//! 1. **Create**: [`Application::new`] opens the store (running migrations for PostgreSQL) and
//!    builds the router
//! 2. **Serve**: [`Application::serve`] binds the configured address
//! 3. **Shutdown**: on the shutdown signal the server drains, then the store is closed and
//!    telemetry flushed

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod email;
pub mod errors;
pub mod openapi;
mod pdf;
pub mod telemetry;
mod types;
mod uploads;

#[cfg(test)]
mod test;
#[cfg(test)]
pub mod test_utils;

use crate::{
    api::handlers::{clients, delivery_notes, projects, users},
    config::{CorsOrigin, DatabaseConfig},
    db::{
        handlers::{PgStore, Store},
        memory::MemoryStore,
    },
    email::EmailService,
    openapi::ApiDoc,
};
use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::{self, HeaderValue},
    routing::{get, patch, post},
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
pub use config::Config;
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use types::{ClientId, DeliveryNoteId, ProjectId, UserId};

/// Application state shared across all request handlers.
///
/// ```ignore
/// let state = AppState::builder()
///     .config(config)
///     .store(Arc::new(MemoryStore::new()))
///     .email(Arc::new(EmailService::new(&config)?))
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub email: Arc<EmailService>,
}

/// Get the database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Open the configured store. PostgreSQL stores are migrated before use.
#[instrument(skip_all, err)]
async fn setup_store(config: &Config) -> anyhow::Result<Arc<dyn Store>> {
    match &config.database {
        DatabaseConfig::Postgres { url, pool } => {
            let mut options = PgPoolOptions::new()
                .max_connections(pool.max_connections)
                .min_connections(pool.min_connections)
                .acquire_timeout(Duration::from_secs(pool.acquire_timeout_secs));
            if pool.idle_timeout_secs > 0 {
                options = options.idle_timeout(Duration::from_secs(pool.idle_timeout_secs));
            }
            if pool.max_lifetime_secs > 0 {
                options = options.max_lifetime(Duration::from_secs(pool.max_lifetime_secs));
            }

            let pool = options.connect(url).await?;
            migrator().run(&pool).await?;
            info!("Connected to PostgreSQL and applied migrations");
            Ok(Arc::new(PgStore::new(pool)))
        }
        DatabaseConfig::Memory => {
            info!("Using the in-memory store; records are lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let cors_config = &config.auth.cors;

    let allow_origin = if cors_config.allowed_origins.iter().any(|o| matches!(o, CorsOrigin::Wildcard)) {
        AllowOrigin::any()
    } else {
        let mut origins = Vec::new();
        for origin in &cors_config.allowed_origins {
            if let CorsOrigin::Url(url) = origin {
                origins.push(url.origin().ascii_serialization().parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(origins)
    };

    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(cors_config.allow_credentials)
        .expose_headers(vec![http::header::CONTENT_DISPOSITION]);

    if let Some(max_age) = cors_config.max_age {
        cors = cors.max_age(Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router with all endpoints and middleware.
///
/// - `/user/*`, `/client/*`, `/project/*`, `/deliverynote/*`: the REST API
/// - `/firmas`, `/pdfs`, `/uploads`: stored files, served as-is
/// - `/healthz`, `/api-docs/openapi.json`, `/docs`
/// - `/internal/metrics` when metrics are enabled
#[instrument(skip_all)]
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let storage = &state.config.storage;

    let user_routes = Router::new()
        .route("/user", get(users::get_profile).delete(users::delete_user))
        .route("/user/register", post(users::register).put(users::update_personal_data))
        .route("/user/validate", post(users::validate_email_code).put(users::validate_email_code))
        .route("/user/login", post(users::login))
        .route("/user/company", patch(users::update_company))
        .route("/user/logo", patch(users::upload_logo))
        .route("/user/change-password", patch(users::change_password))
        .route("/user/forgot-password", post(users::forgot_password))
        .route("/user/reset-password", patch(users::reset_password))
        .route("/user/invite", post(users::invite_guest));

    let client_routes = Router::new()
        .route("/client", post(clients::create_client).get(clients::list_clients))
        .route("/client/archived/list", get(clients::list_archived_clients))
        .route(
            "/client/{id}",
            get(clients::get_client)
                .patch(clients::update_client)
                .delete(clients::delete_client),
        )
        .route("/client/{id}/archive", patch(clients::archive_client))
        .route("/client/{id}/recover", patch(clients::recover_client));

    let project_routes = Router::new()
        .route("/project", post(projects::create_project).get(projects::list_projects))
        .route("/project/archived/list", get(projects::list_archived_projects))
        .route(
            "/project/{id}",
            get(projects::get_project)
                .put(projects::update_project)
                .delete(projects::delete_project),
        )
        .route("/project/{id}/archive", patch(projects::archive_project))
        .route("/project/{id}/recover", patch(projects::recover_project));

    let note_routes = Router::new()
        .route(
            "/deliverynote",
            post(delivery_notes::create_delivery_note).get(delivery_notes::list_delivery_notes),
        )
        .route(
            "/deliverynote/{id}",
            get(delivery_notes::get_delivery_note).delete(delivery_notes::delete_delivery_note),
        )
        .route("/deliverynote/sign/{id}", patch(delivery_notes::sign_delivery_note))
        .route("/deliverynote/pdf/{id}", get(delivery_notes::download_delivery_note_pdf));

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .merge(user_routes)
        .merge(client_routes)
        .merge(project_routes)
        .merge(note_routes)
        .layer(DefaultBodyLimit::max(storage.max_upload_size))
        .with_state(state.clone())
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .nest_service(delivery_notes::SIGNATURES_PREFIX, ServeDir::new(&storage.signatures_dir))
        .nest_service(delivery_notes::PDF_PREFIX, ServeDir::new(&storage.pdf_dir))
        .nest_service(users::LOGOS_PREFIX, ServeDir::new(&storage.uploads_dir));

    let cors_layer = create_cors_layer(&state.config)?;
    let mut router = router.layer(cors_layer);

    if state.config.enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/internal/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// A configured service, ready to serve.
pub struct Application {
    router: Router,
    store: Arc<dyn Store>,
    config: Config,
}

impl Application {
    /// Open the store, set up email delivery and build the router
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting albaran with configuration: {:#?}", config);

        let store = setup_store(&config).await?;
        let email = EmailService::new(&config)?;

        let app_state = AppState::builder()
            .config(config.clone())
            .store(store.clone())
            .email(Arc::new(email))
            .build();

        let router = build_router(app_state)?;

        Ok(Self { router, store, config })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router.into_make_service()).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "albaran listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing store...");
        self.store.close().await;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
