pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod domain;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod uploads;

use actix_web::web;

pub use db::create_pool;

/// Extractor configs plus every route under `/api`.
///
/// Shared state (`DatabaseConnection`, `TokenValidator`, `AppCache`,
/// `PlanCatalogue`, `UploadStore`) must be registered by the caller.
pub fn configure_app(cfg: &mut web::ServiceConfig) {
    cfg.app_data(errors::json_config())
        .app_data(errors::query_config())
        .app_data(errors::path_config())
        .service(web::scope("/api").configure(handlers::init_routes));
}
