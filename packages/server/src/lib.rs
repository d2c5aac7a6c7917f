#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the pothole map application.
//!
//! Accepts citizen pothole reports, hands them to the reconciliation engine
//! in `pothole_map_database`, and serves defect listings, lookups, and
//! moderation patches. All storage work runs on the blocking thread pool
//! since `DuckDB` calls are synchronous.

mod handlers;

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpResponse, HttpServer, error, middleware, web};
use pothole_map_database::store::DefectStore;
use pothole_map_server_models::ApiError;
use pothole_map_spatial::matching::{
    DEFAULT_MATCH_THRESHOLD_METERS, DEFAULT_SEARCH_RADIUS_METERS, MatchConfig,
};

/// Path value that selects a throwaway in-memory database.
pub const IN_MEMORY_DATABASE: &str = ":memory:";

/// Shared application state.
pub struct AppState {
    /// Pooled `DuckDB` defect store.
    pub store: Arc<DefectStore>,
    /// Reconciliation threshold and search radius.
    pub match_config: MatchConfig,
}

/// Runtime settings, read from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// `DATABASE_PATH`: `DuckDB` file, or `:memory:`.
    pub database_path: PathBuf,
    /// `DB_POOL_SIZE`: number of pooled connections.
    pub pool_size: usize,
    /// `BIND_ADDR`: interface to listen on.
    pub bind_addr: String,
    /// `PORT`: port to listen on.
    pub port: u16,
    /// `MATCH_THRESHOLD_METERS` and `MATCH_SEARCH_RADIUS_METERS`.
    pub match_config: MatchConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database_path: pothole_map_database::paths::default_db_path(),
            pool_size: 4,
            bind_addr: "127.0.0.1".to_string(),
            port: 4000,
            match_config: MatchConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Reads settings from environment variables, falling back to
    /// [`ServerConfig::default`] for anything unset or unparseable.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
            let raw = lookup(key)?;
            let value = raw.trim().parse().ok();
            if value.is_none() {
                log::warn!("Ignoring invalid {key}={raw:?}");
            }
            value
        }

        let defaults = Self::default();

        Self {
            database_path: lookup("DATABASE_PATH").map_or(defaults.database_path, PathBuf::from),
            pool_size: parsed(&lookup, "DB_POOL_SIZE").unwrap_or(defaults.pool_size),
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
            port: parsed(&lookup, "PORT").unwrap_or(defaults.port),
            match_config: MatchConfig::new(
                parsed(&lookup, "MATCH_THRESHOLD_METERS").unwrap_or(DEFAULT_MATCH_THRESHOLD_METERS),
                parsed(&lookup, "MATCH_SEARCH_RADIUS_METERS")
                    .unwrap_or(DEFAULT_SEARCH_RADIUS_METERS),
            ),
        }
    }

    /// Opens the configured defect store.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or its schema
    /// cannot be created.
    pub fn open_store(&self) -> Result<DefectStore, pothole_map_database::DbError> {
        if self.database_path.as_os_str() == IN_MEMORY_DATABASE {
            DefectStore::open_in_memory(self.pool_size)
        } else {
            DefectStore::open(&self.database_path, self.pool_size)
        }
    }
}

/// Registers the `/api` routes and JSON/query error handlers.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        let body = ApiError::new(err.to_string());
        error::InternalError::from_response(err, HttpResponse::BadRequest().json(body)).into()
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _req| {
        let body = ApiError::new(err.to_string());
        error::InternalError::from_response(err, HttpResponse::BadRequest().json(body)).into()
    }))
    .service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/reports", web::post().to(handlers::submit_report))
            .route("/reporters", web::post().to(handlers::create_reporter))
            .route("/potholes", web::get().to(handlers::list_potholes))
            .route("/potholes/{id}", web::get().to(handlers::get_pothole))
            .route("/potholes/{id}", web::patch().to(handlers::patch_pothole))
            .route(
                "/potholes/{id}/reports",
                web::get().to(handlers::list_pothole_reports),
            ),
    );
}

/// Starts the pothole map API server.
///
/// Reads [`ServerConfig`] from the environment, opens the defect store,
/// and starts the Actix-Web HTTP server. The caller is responsible for
/// providing the async runtime (e.g. via `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Result` error if the store cannot be opened, or the
/// HTTP server fails to bind or encounters a runtime error.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let config = ServerConfig::from_env();

    log::info!("Opening defect store at {}...", config.database_path.display());
    let store = config.open_store().map_err(std::io::Error::other)?;

    log::info!(
        "Matching reports within {} m (search radius {} m)",
        config.match_config.threshold_m(),
        config.match_config.search_radius_m(),
    );

    let state = web::Data::new(AppState {
        store: Arc::new(store),
        match_config: config.match_config,
    });

    log::info!("Starting server on {}:{}", config.bind_addr, config.port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((config.bind_addr.as_str(), config.port))?
    .run()
    .await
}
