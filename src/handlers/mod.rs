pub mod admin;
pub mod auth;
pub mod bookings;
pub mod health;
pub mod subscriptions;
pub mod technicians;
pub mod users;

use actix_web::web;

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health::health));

    // ── Auth routes (protected by JWT via the AuthenticatedUser extractor) ──
    cfg.service(
        web::scope("/auth")
            .route("/me", web::get().to(auth::me))
            .route("/complete-profile", web::post().to(auth::complete_profile)),
    );

    cfg.service(
        web::resource("/users/{id}")
            .route(web::get().to(users::get_user))
            .route(web::put().to(users::update_user)),
    );

    // ── Technician routes (static segments before `/{id}`) ──
    cfg.service(
        web::scope("/technicians")
            .route("", web::get().to(technicians::search_technicians))
            .route("/available", web::get().to(technicians::available_technicians))
            .route("/profile", web::post().to(technicians::create_profile))
            .route("/profile", web::get().to(technicians::get_own_profile))
            .route("/profile", web::put().to(technicians::update_own_profile))
            .route("/profile/online", web::put().to(technicians::set_online))
            .route("/profile/document", web::post().to(technicians::upload_document))
            .route("/{id}", web::get().to(technicians::get_technician))
            .route("/{id}/reviews", web::get().to(technicians::get_technician_reviews)),
    );

    // ── Booking routes ──
    cfg.service(
        web::scope("/bookings")
            .route("", web::get().to(bookings::get_bookings))
            .route("", web::post().to(bookings::create_booking))
            .route("/{id}", web::get().to(bookings::get_booking))
            .route("/{id}/accept", web::post().to(bookings::accept_booking))
            .route("/{id}/decline", web::post().to(bookings::decline_booking))
            .route("/{id}/cancel", web::post().to(bookings::cancel_booking))
            .route("/{id}/status", web::put().to(bookings::update_status))
            .route("/{id}/payment", web::post().to(bookings::record_payment))
            .route("/{id}/receipt", web::post().to(bookings::upload_receipt))
            .route("/{id}/review", web::post().to(bookings::create_review)),
    );

    // ── Subscription routes (plans are public) ──
    cfg.service(
        web::scope("/subscriptions")
            .route("/plans", web::get().to(subscriptions::get_plans))
            .route("/status", web::get().to(subscriptions::get_status))
            .route("/trial", web::post().to(subscriptions::start_trial))
            .route("/create", web::post().to(subscriptions::create_subscription))
            .route("/cancel", web::post().to(subscriptions::cancel_subscription))
            .route("/payments", web::get().to(subscriptions::get_payments)),
    );

    // ── Admin routes (role admin) ──
    cfg.service(
        web::scope("/admin")
            .route("/technicians", web::get().to(admin::list_technicians))
            .route("/technicians/{id}/verify", web::put().to(admin::verify_technician))
            .route("/bookings", web::get().to(admin::list_bookings))
            .route("/bookings/{id}/cancel", web::post().to(admin::cancel_booking))
            .route("/stats", web::get().to(admin::stats)),
    );
}
