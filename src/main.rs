use actix_cors::Cors;
use actix_files::Files;
use actix_web::{App, HttpServer, middleware::Logger, web};
use dotenv::dotenv;
use migration::{Migrator, MigratorTrait};
use servicehub_backend::auth::jwks::JwksCache;
use servicehub_backend::auth::jwt::TokenValidator;
use servicehub_backend::cache::{AppCache, RedisCache};
use servicehub_backend::config::AppConfig;
use servicehub_backend::uploads::{PUBLIC_PREFIX, UploadStore};
use servicehub_backend::{configure_app, create_pool, db};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// How often lapsed subscriptions are flagged as expired.
const EXPIRY_SWEEP_INTERVAL: Duration = Duration::from_secs(15 * 60);

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env().map_err(std::io::Error::other)?;

    let db = create_pool(&config.database_url)
        .await
        .map_err(std::io::Error::other)?;
    tracing::info!("Connected to database");

    if config.run_migrations {
        Migrator::up(&db, None).await.map_err(std::io::Error::other)?;
        tracing::info!("Migrations applied");
    }

    let redis = match &config.redis_url {
        Some(url) => match RedisCache::new(url).await {
            Ok(cache) => {
                tracing::info!("Connected to Redis");
                Some(cache)
            }
            Err(e) => {
                tracing::warn!("Redis unavailable, caching disabled: {e}");
                None
            }
        },
        None => {
            tracing::info!("REDIS_URL not set, caching disabled");
            None
        }
    };
    let cache_data = web::Data::new(AppCache::new(redis, config.cache.clone()));

    let jwks = config
        .jwks_url
        .as_deref()
        .map(|url| JwksCache::new(url, config.auth_api_key.as_deref()));
    let validator = TokenValidator::new(config.jwt_secret.clone(), jwks);
    let validator_data = web::Data::new(validator);

    tokio::fs::create_dir_all(&config.upload_dir).await?;
    let store = UploadStore::new(config.upload_dir.clone(), config.max_upload_bytes);
    let upload_dir = store.dir().clone();
    let store_data = web::Data::new(store);

    let plans_data = web::Data::new(config.plans.clone());
    let db_data = web::Data::new(db);

    let sweeper_db = db_data.clone();
    actix_web::rt::spawn(async move {
        let mut ticker = tokio::time::interval(EXPIRY_SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            match db::subscriptions::expire_lapsed(sweeper_db.get_ref(), chrono::Utc::now()).await
            {
                Ok(0) => {}
                Ok(n) => tracing::info!("Marked {n} subscriptions as expired"),
                Err(e) => tracing::error!("Subscription expiry sweep failed: {e}"),
            }
        }
    });

    let bind_addr = config.bind_addr();
    tracing::info!("Server running at http://{bind_addr}");

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                actix_web::http::header::AUTHORIZATION,
                actix_web::http::header::CONTENT_TYPE,
                actix_web::http::header::ACCEPT,
            ])
            .max_age(3600);

        App::new()
            .wrap(cors)
            .wrap(Logger::default())
            .app_data(db_data.clone())
            .app_data(cache_data.clone())
            .app_data(validator_data.clone())
            .app_data(plans_data.clone())
            .app_data(store_data.clone())
            .configure(configure_app)
            .service(Files::new(PUBLIC_PREFIX, upload_dir.clone()))
    })
    .bind(&bind_addr)?
    .run()
    .await
}
