//! End-to-end booking workflow over HTTP.
//!
//! Each test spins up the full `/api` app against a fresh in-memory SQLite
//! database migrated with the `migration` crate. Caching is disabled and
//! tokens are minted with a shared HS256 secret.
//!
//! Run with: `cargo test --test booking_flow_test`
use actix_http::Request;
use actix_web::body::MessageBody;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::StatusCode;
use actix_web::test::{self, TestRequest};
use actix_web::{App, web};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};
use serde_json::{Value, json};
use uuid::Uuid;

use servicehub_backend::auth::jwt::{Claims, TokenValidator};
use servicehub_backend::cache::AppCache;
use servicehub_backend::configure_app;
use servicehub_backend::domain::plans::PlanCatalogue;
use servicehub_backend::models::subscriptions::{self, Plan, SubscriptionStatus};
use servicehub_backend::models::users::{self, Roles};
use servicehub_backend::uploads::UploadStore;

const TEST_SECRET: &str = "booking-flow-secret-at-least-256-bits-xxxxxxxxxxxx";

macro_rules! test_app {
    ($db:expr) => {
        test_app!($db, 1024 * 1024)
    };
    ($db:expr, $max_upload_bytes:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($db.clone()))
                .app_data(web::Data::new(AppCache::disabled()))
                .app_data(web::Data::new(TokenValidator::with_secret(TEST_SECRET)))
                .app_data(web::Data::new(PlanCatalogue::default()))
                .app_data(web::Data::new(UploadStore::new(
                    std::env::temp_dir().join("servicehub-test-uploads"),
                    $max_upload_bytes,
                )))
                .configure(configure_app),
        )
        .await
    };
}

async fn setup_db() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:");
    // One connection keeps every query on the same in-memory database.
    options.max_connections(1).sqlx_logging(false);

    let db = Database::connect(options)
        .await
        .expect("Failed to open in-memory SQLite");
    Migrator::up(&db, None).await.expect("Migrations failed");
    db
}

fn mint_token(user_id: Uuid, email: &str) -> String {
    let now = Utc::now().timestamp() as usize;
    let claims = Claims {
        sub: user_id.to_string(),
        exp: now + 3600,
        iat: Some(now),
        iss: None,
        email: Some(email.to_string()),
        role: Some("authenticated".to_string()),
        user_metadata: None,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .expect("Failed to encode test JWT")
}

async fn send<S, R, B>(app: &S, req: R) -> (StatusCode, Value)
where
    S: Service<R, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let resp = test::call_service(app, req).await;
    let status = resp.status();
    let body = test::read_body(resp).await;
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn get(uri: &str, token: &str) -> TestRequest {
    TestRequest::get()
        .uri(uri)
        .insert_header(("Authorization", format!("Bearer {token}")))
}

fn post(uri: &str, token: &str, body: Value) -> TestRequest {
    TestRequest::post()
        .uri(uri)
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(body)
}

fn put(uri: &str, token: &str, body: Value) -> TestRequest {
    TestRequest::put()
        .uri(uri)
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(body)
}

struct Party {
    id: Uuid,
    token: String,
}

fn new_party(email: &str) -> Party {
    let id = Uuid::new_v4();
    Party {
        id,
        token: mint_token(id, email),
    }
}

async fn insert_admin(db: &DatabaseConnection) -> Party {
    let admin = new_party("admin@example.com");
    users::ActiveModel {
        id: Set(admin.id),
        email: Set("admin@example.com".to_string()),
        full_name: Set(Some("Platform Admin".to_string())),
        phone: Set(None),
        avatar_url: Set(None),
        auth_provider: Set("password".to_string()),
        role: Set(Roles::Admin),
        is_active: Set(true),
        created_at: Set(Utc::now()),
        updated_at: Set(None),
    }
    .insert(db)
    .await
    .expect("Failed to insert admin");
    admin
}

async fn insert_subscription(
    db: &DatabaseConnection,
    technician_id: Uuid,
    plan: Plan,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    booking_quota: Option<i32>,
) {
    subscriptions::ActiveModel {
        id: Set(Uuid::new_v4()),
        technician_id: Set(technician_id),
        plan: Set(plan),
        status: Set(SubscriptionStatus::Active),
        starts_at: Set(starts_at),
        ends_at: Set(ends_at),
        booking_quota: Set(booking_quota),
        bookings_used: Set(0),
        auto_renew: Set(false),
        created_at: Set(starts_at),
        updated_at: Set(None),
    }
    .insert(db)
    .await
    .expect("Failed to insert subscription");
}

/// Register a technician profile and have the admin verify it.
/// Returns the technician and their profile id.
async fn onboard_technician<S, B>(app: &S, admin: &Party, email: &str) -> (Party, String)
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let tech = new_party(email);

    let (status, profile) = send(
        app,
        post(
            "/api/technicians/profile",
            &tech.token,
            json!({
                "category": "plumbing",
                "hourly_rate": 5000.0,
                "city": "dakar",
                "years_experience": 6
            }),
        )
        .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "profile: {profile}");
    assert_eq!(profile["verification_status"], "pending");
    assert_eq!(profile["city"], "Dakar");
    let profile_id = profile["id"].as_str().unwrap().to_string();

    let (status, verified) = send(
        app,
        put(
            &format!("/api/admin/technicians/{profile_id}/verify"),
            &admin.token,
            json!({ "status": "verified" }),
        )
        .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "verify: {verified}");
    assert_eq!(verified["verification_status"], "verified");

    (tech, profile_id)
}

fn booking_body(technician_id: Uuid, scheduled_at: DateTime<Utc>) -> Value {
    json!({
        "technician_id": technician_id,
        "category": "plumbing",
        "description": "Leaking pipe under the kitchen sink",
        "address": "12 Rue Carnot",
        "city": "Dakar",
        "scheduled_at": scheduled_at.to_rfc3339(),
        "duration_minutes": 60,
        "estimated_price": 15000.0
    })
}

fn tomorrow_at(hour: u32) -> DateTime<Utc> {
    let day = (Utc::now() + Duration::days(1)).date_naive();
    day.and_hms_opt(hour, 0, 0).unwrap().and_utc()
}

/// Client requests `tech` at `scheduled_at`; returns the booking id.
async fn request_booking<S, B>(
    app: &S,
    client: &Party,
    tech: &Party,
    scheduled_at: DateTime<Utc>,
) -> String
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let (status, booking) = send(
        app,
        post("/api/bookings", &client.token, booking_body(tech.id, scheduled_at)).to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create: {booking}");
    booking["id"].as_str().unwrap().to_string()
}

/// Multipart body with a single `file` field.
fn multipart_upload(uri: &str, token: &str, content_type: &str, data: &[u8]) -> TestRequest {
    let boundary = "servicehub-test-boundary";
    let mut body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"receipt\"\r\nContent-Type: {content_type}\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    TestRequest::post()
        .uri(uri)
        .insert_header(("Authorization", format!("Bearer {token}")))
        .insert_header((
            "Content-Type",
            format!("multipart/form-data; boundary={boundary}"),
        ))
        .set_payload(body)
}

#[actix_web::test]
async fn test_full_booking_lifecycle() {
    let db = setup_db().await;
    let app = test_app!(db);
    let admin = insert_admin(&db).await;
    let (tech, profile_id) = onboard_technician(&app, &admin, "tech@example.com").await;
    let client = new_party("client@example.com");

    let (status, sub) = send(
        &app,
        post(
            "/api/subscriptions/create",
            &tech.token,
            json!({ "plan": "monthly", "payment_method": "mobile_money", "payment_reference": "OM-123" }),
        )
        .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "subscribe: {sub}");
    assert_eq!(sub["payment"]["amount"].as_f64(), Some(5000.0));
    assert_eq!(sub["payment"]["currency"], "XOF");

    let (status, booking) = send(
        &app,
        post("/api/bookings", &client.token, booking_body(tech.id, tomorrow_at(10))).to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create: {booking}");
    assert_eq!(booking["status"], "pending");
    let id = booking["id"].as_str().unwrap().to_string();

    let (status, booking) = send(
        &app,
        post(&format!("/api/bookings/{id}/accept"), &tech.token, json!({})).to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "accept: {booking}");
    assert_eq!(booking["status"], "accepted");

    for next in ["on_the_way", "in_progress"] {
        let (status, booking) = send(
            &app,
            put(
                &format!("/api/bookings/{id}/status"),
                &tech.token,
                json!({ "status": next }),
            )
            .to_request(),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{next}: {booking}");
        assert_eq!(booking["status"], next);
    }

    let (status, booking) = send(
        &app,
        put(
            &format!("/api/bookings/{id}/status"),
            &tech.token,
            json!({ "status": "awaiting_payment", "final_price": 20000.0 }),
        )
        .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "awaiting_payment: {booking}");
    assert_eq!(booking["final_price"].as_f64(), Some(20000.0));

    let (status, body) = send(
        &app,
        post(
            &format!("/api/bookings/{id}/payment"),
            &client.token,
            json!({ "method": "cash", "amount": 15000.0 }),
        )
        .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "wrong amount: {body}");
    assert_eq!(body["error"], "VALIDATION_ERROR");

    let (status, booking) = send(
        &app,
        post(
            &format!("/api/bookings/{id}/payment"),
            &client.token,
            json!({ "method": "cash", "amount": 20000.0 }),
        )
        .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "payment: {booking}");
    assert_eq!(booking["status"], "completed");
    assert_eq!(booking["amount_paid"].as_f64(), Some(20000.0));
    assert!(booking["paid_at"].is_string());

    let (status, review) = send(
        &app,
        post(
            &format!("/api/bookings/{id}/review"),
            &client.token,
            json!({ "rating": 4, "comment": "Quick and tidy" }),
        )
        .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "review: {review}");

    let (status, body) = send(
        &app,
        post(
            &format!("/api/bookings/{id}/review"),
            &client.token,
            json!({ "rating": 5 }),
        )
        .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT, "second review: {body}");

    let (status, profile) = send(
        &app,
        get(&format!("/api/technicians/{profile_id}"), &client.token).to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["average_rating"].as_f64(), Some(4.0));
    assert_eq!(profile["review_count"], 1);
}

#[actix_web::test]
async fn test_out_of_order_transition_is_rejected() {
    let db = setup_db().await;
    let app = test_app!(db);
    let admin = insert_admin(&db).await;
    let (tech, _) = onboard_technician(&app, &admin, "tech@example.com").await;
    let client = new_party("client@example.com");

    let (_, booking) = send(
        &app,
        post("/api/bookings", &client.token, booking_body(tech.id, tomorrow_at(9))).to_request(),
    )
    .await;
    let id = booking["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        put(
            &format!("/api/bookings/{id}/status"),
            &tech.token,
            json!({ "status": "in_progress" }),
        )
        .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");
    assert_eq!(body["error"], "INVALID_STATUS_TRANSITION");

    // The client may not push the technician's workflow either.
    let (status, body) = send(
        &app,
        post(&format!("/api/bookings/{id}/accept"), &client.token, json!({})).to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{body}");

    let (_, current) = send(&app, get(&format!("/api/bookings/{id}"), &client.token).to_request()).await;
    assert_eq!(current["status"], "pending");
}

#[actix_web::test]
async fn test_subscription_gate_blocks_accept() {
    let db = setup_db().await;
    let app = test_app!(db);
    let admin = insert_admin(&db).await;
    let (tech, _) = onboard_technician(&app, &admin, "tech@example.com").await;
    let client = new_party("client@example.com");

    let (_, booking) = send(
        &app,
        post("/api/bookings", &client.token, booking_body(tech.id, tomorrow_at(14))).to_request(),
    )
    .await;
    let id = booking["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        post(&format!("/api/bookings/{id}/accept"), &tech.token, json!({})).to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED, "{body}");
    assert_eq!(body["error"], "SUBSCRIPTION_REQUIRED");

    let now = Utc::now();
    insert_subscription(
        &db,
        tech.id,
        Plan::Monthly,
        now - Duration::days(40),
        now - Duration::days(10),
        None,
    )
    .await;

    let (status, body) = send(
        &app,
        post(&format!("/api/bookings/{id}/accept"), &tech.token, json!({})).to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED, "{body}");
    assert_eq!(body["error"], "SUBSCRIPTION_EXPIRED");

    let (status, summary) =
        send(&app, get("/api/subscriptions/status", &tech.token).to_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["state"], "expired");
    assert_eq!(summary["can_accept_bookings"], false);

    let (_, current) = send(&app, get(&format!("/api/bookings/{id}"), &client.token).to_request()).await;
    assert_eq!(current["status"], "pending");
}

#[actix_web::test]
async fn test_trial_quota_is_consumed_on_accept() {
    let db = setup_db().await;
    let app = test_app!(db);
    let admin = insert_admin(&db).await;
    let (tech, _) = onboard_technician(&app, &admin, "tech@example.com").await;
    let client = new_party("client@example.com");

    let now = Utc::now();
    insert_subscription(
        &db,
        tech.id,
        Plan::Trial,
        now - Duration::days(1),
        now + Duration::days(13),
        Some(1),
    )
    .await;

    let mut ids = Vec::new();
    for hour in [8, 12] {
        let (status, booking) = send(
            &app,
            post("/api/bookings", &client.token, booking_body(tech.id, tomorrow_at(hour)))
                .to_request(),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{booking}");
        ids.push(booking["id"].as_str().unwrap().to_string());
    }

    let (status, body) = send(
        &app,
        post(&format!("/api/bookings/{}/accept", ids[0]), &tech.token, json!({})).to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, body) = send(
        &app,
        post(&format!("/api/bookings/{}/accept", ids[1]), &tech.token, json!({})).to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED, "{body}");
    assert_eq!(body["error"], "TRIAL_QUOTA_EXHAUSTED");
}

#[actix_web::test]
async fn test_payment_requires_awaiting_payment() {
    let db = setup_db().await;
    let app = test_app!(db);
    let admin = insert_admin(&db).await;
    let (tech, _) = onboard_technician(&app, &admin, "tech@example.com").await;
    let client = new_party("client@example.com");

    let now = Utc::now();
    insert_subscription(&db, tech.id, Plan::Monthly, now, now + Duration::days(30), None).await;

    let (_, booking) = send(
        &app,
        post("/api/bookings", &client.token, booking_body(tech.id, tomorrow_at(16))).to_request(),
    )
    .await;
    let id = booking["id"].as_str().unwrap().to_string();

    let pay = json!({ "method": "card", "amount": 15000.0 });

    let (status, body) = send(
        &app,
        post(&format!("/api/bookings/{id}/payment"), &client.token, pay.clone()).to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT, "pending: {body}");
    assert_eq!(body["error"], "INVALID_STATUS_TRANSITION");

    send(
        &app,
        post(&format!("/api/bookings/{id}/accept"), &tech.token, json!({})).to_request(),
    )
    .await;

    let (status, body) = send(
        &app,
        post(&format!("/api/bookings/{id}/payment"), &client.token, pay).to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT, "accepted: {body}");

    let (_, current) = send(&app, get(&format!("/api/bookings/{id}"), &client.token).to_request()).await;
    assert_eq!(current["status"], "accepted");
    assert!(current["paid_at"].is_null());
}

#[actix_web::test]
async fn test_slot_conflicts() {
    let db = setup_db().await;
    let app = test_app!(db);
    let admin = insert_admin(&db).await;
    let (tech, _) = onboard_technician(&app, &admin, "tech@example.com").await;
    let client = new_party("client@example.com");
    let other_client = new_party("other@example.com");

    let now = Utc::now();
    insert_subscription(&db, tech.id, Plan::Yearly, now, now + Duration::days(365), None).await;

    // Two pending requests for the same slot are both accepted into the queue.
    let ten = tomorrow_at(10);
    let (status, first) =
        send(&app, post("/api/bookings", &client.token, booking_body(tech.id, ten)).to_request()).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, competing) = send(
        &app,
        post("/api/bookings", &other_client.token, booking_body(tech.id, ten)).to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "pending must not block: {competing}");

    let first_id = first["id"].as_str().unwrap().to_string();
    let (status, _) = send(
        &app,
        post(&format!("/api/bookings/{first_id}/accept"), &tech.token, json!({})).to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Now the 10:00-11:00 slot is held.
    let (status, body) = send(
        &app,
        post(
            "/api/bookings",
            &client.token,
            booking_body(tech.id, ten + Duration::minutes(30)),
        )
        .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");
    assert_eq!(body["error"], "SLOT_UNAVAILABLE");

    let competing_id = competing["id"].as_str().unwrap().to_string();
    let (status, body) = send(
        &app,
        post(&format!("/api/bookings/{competing_id}/accept"), &tech.token, json!({})).to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");
    assert_eq!(body["error"], "SLOT_UNAVAILABLE");

    // Touching intervals don't overlap.
    let (status, body) = send(
        &app,
        post(
            "/api/bookings",
            &client.token,
            booking_body(tech.id, ten + Duration::minutes(60)),
        )
        .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
}

#[actix_web::test]
async fn test_reviews_recompute_average() {
    let db = setup_db().await;
    let app = test_app!(db);
    let admin = insert_admin(&db).await;
    let (tech, profile_id) = onboard_technician(&app, &admin, "tech@example.com").await;
    let client = new_party("client@example.com");

    let now = Utc::now();
    insert_subscription(&db, tech.id, Plan::Monthly, now, now + Duration::days(30), None).await;

    for (hour, rating) in [(8, 5), (13, 2)] {
        let (_, booking) = send(
            &app,
            post("/api/bookings", &client.token, booking_body(tech.id, tomorrow_at(hour)))
                .to_request(),
        )
        .await;
        let id = booking["id"].as_str().unwrap().to_string();

        send(
            &app,
            post(&format!("/api/bookings/{id}/accept"), &tech.token, json!({})).to_request(),
        )
        .await;
        for next in ["on_the_way", "in_progress", "awaiting_payment"] {
            let (status, body) = send(
                &app,
                put(
                    &format!("/api/bookings/{id}/status"),
                    &tech.token,
                    json!({ "status": next }),
                )
                .to_request(),
            )
            .await;
            assert_eq!(status, StatusCode::OK, "{next}: {body}");
        }

        // No final price given: the estimate is what's due.
        let (status, body) = send(
            &app,
            post(
                &format!("/api/bookings/{id}/payment"),
                &client.token,
                json!({ "method": "mobile_money", "reference": "W-42", "amount": 15000.0 }),
            )
            .to_request(),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "payment: {body}");

        let (status, body) = send(
            &app,
            post(
                &format!("/api/bookings/{id}/review"),
                &client.token,
                json!({ "rating": rating }),
            )
            .to_request(),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "review: {body}");
    }

    let (_, profile) = send(
        &app,
        get(&format!("/api/technicians/{profile_id}"), &client.token).to_request(),
    )
    .await;
    assert_eq!(profile["average_rating"].as_f64(), Some(3.5));
    assert_eq!(profile["review_count"], 2);

    let (status, reviews) = send(
        &app,
        get(&format!("/api/technicians/{profile_id}/reviews"), &client.token).to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reviews.as_array().map(Vec::len), Some(2));
}

#[actix_web::test]
async fn test_outsiders_and_anonymous_callers_are_refused() {
    let db = setup_db().await;
    let app = test_app!(db);
    let admin = insert_admin(&db).await;
    let (tech, _) = onboard_technician(&app, &admin, "tech@example.com").await;
    let client = new_party("client@example.com");
    let stranger = new_party("stranger@example.com");

    let (_, booking) = send(
        &app,
        post("/api/bookings", &client.token, booking_body(tech.id, tomorrow_at(11))).to_request(),
    )
    .await;
    let id = booking["id"].as_str().unwrap().to_string();

    let (status, body) =
        send(&app, get(&format!("/api/bookings/{id}"), &stranger.token).to_request()).await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{body}");
    assert_eq!(body["error"], "FORBIDDEN");

    let (status, _) =
        send(&app, get(&format!("/api/bookings/{id}"), &admin.token).to_request()).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        TestRequest::get().uri("/api/bookings").to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "{body}");
    assert_eq!(body["error"], "UNAUTHORIZED");

    let (status, plans) = send(
        &app,
        TestRequest::get().uri("/api/subscriptions/plans").to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(plans.as_array().map(Vec::len), Some(4));

    let (status, _) = send(&app, TestRequest::get().uri("/api/health").to_request()).await;
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn test_admin_can_cancel_in_progress_booking() {
    let db = setup_db().await;
    let app = test_app!(db);
    let admin = insert_admin(&db).await;
    let (tech, _) = onboard_technician(&app, &admin, "tech@example.com").await;
    let client = new_party("client@example.com");

    let now = Utc::now();
    insert_subscription(&db, tech.id, Plan::Monthly, now, now + Duration::days(30), None).await;

    let (_, booking) = send(
        &app,
        post("/api/bookings", &client.token, booking_body(tech.id, tomorrow_at(15))).to_request(),
    )
    .await;
    let id = booking["id"].as_str().unwrap().to_string();

    send(
        &app,
        post(&format!("/api/bookings/{id}/accept"), &tech.token, json!({})).to_request(),
    )
    .await;
    send(
        &app,
        put(
            &format!("/api/bookings/{id}/status"),
            &tech.token,
            json!({ "status": "on_the_way" }),
        )
        .to_request(),
    )
    .await;

    // Too late for the client.
    let (status, body) = send(
        &app,
        post(&format!("/api/bookings/{id}/cancel"), &client.token, json!({ "reason": "changed my mind" }))
            .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");

    let (status, cancelled) = send(
        &app,
        post(
            &format!("/api/admin/bookings/{id}/cancel"),
            &admin.token,
            json!({ "reason": "Reported as fraudulent" }),
        )
        .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{cancelled}");
    assert_eq!(cancelled["status"], "cancelled");
    assert_eq!(cancelled["cancelled_by"], json!(admin.id));

    let (status, stats) = send(&app, get("/api/admin/stats", &admin.token).to_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["bookings"]["cancelled"], 1);
    assert_eq!(stats["users"]["admin"], 1);
    assert_eq!(stats["live_subscriptions"], 1);
}

#[actix_web::test]
async fn test_concurrent_accepts_cannot_double_book() {
    let db = setup_db().await;
    let app = test_app!(db);
    let admin = insert_admin(&db).await;
    let (tech, _) = onboard_technician(&app, &admin, "tech@example.com").await;
    let client = new_party("client@example.com");
    let other_client = new_party("other@example.com");

    let now = Utc::now();
    insert_subscription(&db, tech.id, Plan::Monthly, now, now + Duration::days(30), None).await;

    let ten = tomorrow_at(10);
    let first = request_booking(&app, &client, &tech, ten).await;
    let second = request_booking(&app, &other_client, &tech, ten).await;

    let ((first_status, _), (second_status, _)) = futures_util::future::join(
        send(
            &app,
            post(&format!("/api/bookings/{first}/accept"), &tech.token, json!({})).to_request(),
        ),
        send(
            &app,
            post(&format!("/api/bookings/{second}/accept"), &tech.token, json!({})).to_request(),
        ),
    )
    .await;

    let mut statuses = vec![first_status, second_status];
    statuses.sort();
    assert_eq!(statuses, vec![StatusCode::OK, StatusCode::CONFLICT]);

    let (_, mine) = send(
        &app,
        get("/api/bookings?status=accepted", &tech.token).to_request(),
    )
    .await;
    assert_eq!(mine.as_array().map(Vec::len), Some(1));
}

#[actix_web::test]
async fn test_huge_page_numbers_are_capped() {
    let db = setup_db().await;
    let app = test_app!(db);
    let admin = insert_admin(&db).await;
    let client = new_party("client@example.com");

    for uri in [
        "/api/bookings?page=18446744073709551615&limit=100",
        "/api/technicians?page=18446744073709551615&limit=100",
    ] {
        let (status, body) = send(&app, get(uri, &client.token).to_request()).await;
        assert_eq!(status, StatusCode::OK, "{uri}: {body}");
        assert_eq!(body, json!([]));
    }

    let (status, body) = send(
        &app,
        get("/api/admin/bookings?page=18446744073709551615", &admin.token).to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body, json!([]));
}

#[actix_web::test]
async fn test_available_technicians_filters_gate_slot_and_presence() {
    let db = setup_db().await;
    let app = test_app!(db);
    let admin = insert_admin(&db).await;
    let client = new_party("client@example.com");
    let now = Utc::now();

    let (free, free_profile) = onboard_technician(&app, &admin, "free@example.com").await;
    let (unpaid, _) = onboard_technician(&app, &admin, "unpaid@example.com").await;
    let (busy, _) = onboard_technician(&app, &admin, "busy@example.com").await;
    let (offline, _) = onboard_technician(&app, &admin, "offline@example.com").await;

    for tech in [&free, &busy, &offline] {
        insert_subscription(&db, tech.id, Plan::Monthly, now, now + Duration::days(30), None)
            .await;
    }
    for tech in [&free, &unpaid, &busy] {
        let (status, body) = send(
            &app,
            put("/api/technicians/profile/online", &tech.token, json!({ "is_online": true }))
                .to_request(),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }

    let ten = tomorrow_at(10);
    let held = request_booking(&app, &client, &busy, ten).await;
    let (status, body) = send(
        &app,
        post(&format!("/api/bookings/{held}/accept"), &busy.token, json!({})).to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let at = (ten + Duration::minutes(30)).to_rfc3339_opts(SecondsFormat::Secs, true);
    let (status, available) = send(
        &app,
        get(
            &format!("/api/technicians/available?category=plumbing&city=dakar&scheduled_at={at}&duration_minutes=60"),
            &client.token,
        )
        .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{available}");
    let ids: Vec<&str> = available
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![free_profile.as_str()]);
}

#[actix_web::test]
async fn test_trial_then_paid_plan() {
    let db = setup_db().await;
    let app = test_app!(db);
    let admin = insert_admin(&db).await;
    let (tech, _) = onboard_technician(&app, &admin, "tech@example.com").await;

    let (status, trial) =
        send(&app, post("/api/subscriptions/trial", &tech.token, json!({})).to_request()).await;
    assert_eq!(status, StatusCode::CREATED, "{trial}");
    assert_eq!(trial["plan"], "trial");
    assert_eq!(trial["booking_quota"], 3);

    let (status, body) =
        send(&app, post("/api/subscriptions/trial", &tech.token, json!({})).to_request()).await;
    assert_eq!(status, StatusCode::CONFLICT, "second trial: {body}");

    let purchase = json!({ "plan": "quarterly", "payment_method": "card" });
    let (status, body) = send(
        &app,
        post("/api/subscriptions/create", &tech.token, purchase.clone()).to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");

    let (_, summary) =
        send(&app, get("/api/subscriptions/status", &tech.token).to_request()).await;
    assert_eq!(summary["state"], "active");
    assert_eq!(summary["subscription"]["plan"], "quarterly");
    assert!(summary["bookings_remaining"].is_null());

    let (status, body) = send(
        &app,
        post("/api/subscriptions/create", &tech.token, purchase).to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT, "while live: {body}");

    let (_, payments) =
        send(&app, get("/api/subscriptions/payments", &tech.token).to_request()).await;
    assert_eq!(payments.as_array().map(Vec::len), Some(1));
}

#[actix_web::test]
async fn test_cancelled_subscription_keeps_access_until_period_end() {
    let db = setup_db().await;
    let app = test_app!(db);
    let admin = insert_admin(&db).await;
    let (tech, _) = onboard_technician(&app, &admin, "tech@example.com").await;
    let client = new_party("client@example.com");

    let (status, body) = send(
        &app,
        post(
            "/api/subscriptions/create",
            &tech.token,
            json!({ "plan": "monthly", "payment_method": "cash", "auto_renew": true }),
        )
        .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");

    let (status, cancelled) =
        send(&app, post("/api/subscriptions/cancel", &tech.token, json!({})).to_request()).await;
    assert_eq!(status, StatusCode::OK, "{cancelled}");
    assert_eq!(cancelled["status"], "cancelled");
    assert_eq!(cancelled["auto_renew"], false);

    let (status, body) =
        send(&app, post("/api/subscriptions/cancel", &tech.token, json!({})).to_request()).await;
    assert_eq!(status, StatusCode::NOT_FOUND, "nothing left to cancel: {body}");

    let (_, summary) =
        send(&app, get("/api/subscriptions/status", &tech.token).to_request()).await;
    assert_eq!(summary["can_accept_bookings"], true);

    let id = request_booking(&app, &client, &tech, tomorrow_at(9)).await;
    let (status, body) = send(
        &app,
        post(&format!("/api/bookings/{id}/accept"), &tech.token, json!({})).to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
}

#[actix_web::test]
async fn test_decline_and_technician_cancel() {
    let db = setup_db().await;
    let app = test_app!(db);
    let admin = insert_admin(&db).await;
    let (tech, _) = onboard_technician(&app, &admin, "tech@example.com").await;
    let client = new_party("client@example.com");

    let now = Utc::now();
    insert_subscription(&db, tech.id, Plan::Monthly, now, now + Duration::days(30), None).await;

    let declined = request_booking(&app, &client, &tech, tomorrow_at(8)).await;
    let (status, body) = send(
        &app,
        post(&format!("/api/bookings/{declined}/decline"), &client.token, json!({})).to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "client decline: {body}");

    let (status, booking) = send(
        &app,
        post(
            &format!("/api/bookings/{declined}/decline"),
            &tech.token,
            json!({ "reason": "Fully booked that day" }),
        )
        .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{booking}");
    assert_eq!(booking["status"], "declined");
    assert_eq!(booking["status_reason"], "Fully booked that day");

    let (status, body) = send(
        &app,
        post(&format!("/api/bookings/{declined}/accept"), &tech.token, json!({})).to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT, "accept after decline: {body}");

    let accepted = request_booking(&app, &client, &tech, tomorrow_at(14)).await;
    send(
        &app,
        post(&format!("/api/bookings/{accepted}/accept"), &tech.token, json!({})).to_request(),
    )
    .await;

    // No body at all is fine for a cancel.
    let (status, booking) = send(
        &app,
        TestRequest::post()
            .uri(&format!("/api/bookings/{accepted}/cancel"))
            .insert_header(("Authorization", format!("Bearer {}", tech.token)))
            .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{booking}");
    assert_eq!(booking["status"], "cancelled");
    assert_eq!(booking["cancelled_by"], json!(tech.id));
}

#[actix_web::test]
async fn test_receipt_upload_rules() {
    let db = setup_db().await;
    let app = test_app!(db, 64);
    let admin = insert_admin(&db).await;
    let (tech, _) = onboard_technician(&app, &admin, "tech@example.com").await;
    let client = new_party("client@example.com");

    let now = Utc::now();
    insert_subscription(&db, tech.id, Plan::Monthly, now, now + Duration::days(30), None).await;

    let id = request_booking(&app, &client, &tech, tomorrow_at(11)).await;
    let receipt_uri = format!("/api/bookings/{id}/receipt");

    let (status, body) = send(
        &app,
        multipart_upload(&receipt_uri, &client.token, "image/png", &[7; 16]).to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT, "pending: {body}");

    send(
        &app,
        post(&format!("/api/bookings/{id}/accept"), &tech.token, json!({})).to_request(),
    )
    .await;
    for next in ["on_the_way", "in_progress", "awaiting_payment"] {
        let (status, body) = send(
            &app,
            put(&format!("/api/bookings/{id}/status"), &tech.token, json!({ "status": next }))
                .to_request(),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{next}: {body}");
    }

    let (status, body) = send(
        &app,
        multipart_upload(&receipt_uri, &client.token, "image/png", &[7; 200]).to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE, "{body}");
    assert_eq!(body["error"], "PAYLOAD_TOO_LARGE");

    let (status, body) = send(
        &app,
        multipart_upload(&receipt_uri, &client.token, "text/plain", &[7; 16]).to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (status, booking) = send(
        &app,
        multipart_upload(&receipt_uri, &client.token, "image/png", &[7; 16]).to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{booking}");
    let url = booking["receipt_url"].as_str().unwrap();
    assert!(url.starts_with("/uploads/receipts/") && url.ends_with(".png"), "{url}");

    let (status, body) = send(
        &app,
        post(
            &format!("/api/bookings/{id}/payment"),
            &client.token,
            json!({ "method": "cash", "amount": 15000.0 }),
        )
        .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    for rating in [0, 6] {
        let (status, body) = send(
            &app,
            post(&format!("/api/bookings/{id}/review"), &client.token, json!({ "rating": rating }))
                .to_request(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "rating {rating}: {body}");
        assert_eq!(body["error"], "VALIDATION_ERROR");
    }
}

#[actix_web::test]
async fn test_technician_account_changes() {
    let db = setup_db().await;
    let app = test_app!(db);
    let admin = insert_admin(&db).await;
    let (tech, profile_id) = onboard_technician(&app, &admin, "tech@example.com").await;

    let (status, body) = send(
        &app,
        post("/api/auth/complete-profile", &tech.token, json!({ "role": "client" })).to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");

    let (status, me) = send(
        &app,
        post(
            "/api/auth/complete-profile",
            &tech.token,
            json!({ "role": "technician", "full_name": "Awa Ndiaye" }),
        )
        .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{me}");
    assert_eq!(me["role"], "technician");

    let (status, body) = send(
        &app,
        put(
            &format!("/api/users/{}", tech.id),
            &tech.token,
            json!({ "full_name": "Awa N. Ndiaye" }),
        )
        .to_request(),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (_, card) = send(
        &app,
        get(&format!("/api/technicians/{profile_id}"), &admin.token).to_request(),
    )
    .await;
    assert_eq!(card["full_name"], "Awa N. Ndiaye");
}
