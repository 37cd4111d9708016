use actix_web::{HttpResponse, web};
use sea_orm::DatabaseConnection;

/// GET /api/health
pub async fn health(db: web::Data<DatabaseConnection>) -> HttpResponse {
    match db.ping().await {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({
            "status": "ok",
            "database": "up",
        })),
        Err(e) => {
            tracing::warn!("Health check could not reach the database: {e}");
            HttpResponse::ServiceUnavailable().json(serde_json::json!({
                "status": "degraded",
                "database": "down",
            }))
        }
    }
}
