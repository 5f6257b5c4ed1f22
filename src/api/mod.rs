//! JSON-over-HTTP edge. Every booking route is scoped to a space.

mod error;
mod handlers;

pub use error::{ApiError, ApiResult};

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{MatchedPath, Request};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::clock::Clock;
use crate::config::PolicyConfig;
use crate::notify::NotificationDispatcher;
use crate::service::BookingService;
use crate::tenant::TenantManager;

#[derive(Clone)]
pub struct AppState {
    pub tenants: Arc<TenantManager>,
    pub notifier: Arc<dyn NotificationDispatcher>,
    pub clock: Arc<dyn Clock>,
    pub policy: PolicyConfig,
}

impl AppState {
    /// Booking service over the named space's engine, loading it on first use.
    pub fn service(&self, space: &str) -> Result<BookingService, ApiError> {
        let engine = self.tenants.get_or_create(space)?;
        Ok(BookingService::new(
            engine,
            self.notifier.clone(),
            self.clock.clone(),
            self.policy,
        ))
    }
}

pub fn router(state: AppState) -> Router {
    let spaces = Router::new()
        .route("/bookings", get(handlers::list_bookings).post(handlers::create_booking))
        .route("/bookings/mine", get(handlers::my_bookings))
        .route("/bookings/{id}", get(handlers::get_booking))
        .route("/bookings/{id}/status", patch(handlers::update_status))
        .route("/availability/{year}/{month}", get(handlers::month_availability))
        .route("/owners", get(handlers::members))
        .route("/owners/me", get(handlers::profile))
        .route("/owners/sync", post(handlers::sync_owner))
        .route("/owners/quota", get(handlers::quota))
        .route("/owners/quota/reset", post(handlers::reset_quota))
        .route("/messages", get(handlers::list_messages).post(handlers::send_message))
        .route("/messages/{id}/read", post(handlers::mark_message_read));

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/spaces/{space}", spaces)
        .layer(middleware::from_fn(track_latency))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn track_latency(request: Request, next: Next) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());
    let start = Instant::now();
    let response = next.run(request).await;
    metrics::histogram!(crate::observability::REQUEST_DURATION_SECONDS, "route" => route)
        .record(start.elapsed().as_secs_f64());
    response
}
