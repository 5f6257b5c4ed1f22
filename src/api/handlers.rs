use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;
use ulid::Ulid;

use crate::identity::HeaderIdentity;
use crate::model::*;
use crate::policy::BookingRequest;
use crate::service::{MessageRequest, OwnerProfile};

use super::{ApiError, ApiResult, AppState};

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "callabo",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub owner_id: Option<Ulid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl ListQuery {
    fn into_filter(self) -> Result<ReservationFilter, ApiError> {
        let status = match self.status.as_deref() {
            Some(s) => Some(
                s.parse::<Status>()
                    .map_err(|()| ApiError::BadRequest(format!("unknown status: {s:?}")))?,
            ),
            None => None,
        };
        let window = match (self.from, self.to) {
            (Some(from), Some(to)) if from <= to => Some(DateRange::new(from, to)),
            (Some(_), Some(_)) => {
                return Err(ApiError::BadRequest("`from` must not be after `to`".into()));
            }
            (None, None) => None,
            _ => return Err(ApiError::BadRequest("`from` and `to` go together".into())),
        };
        Ok(ReservationFilter { owner_id: self.owner_id, status, window })
    }
}

/// GET /spaces/{space}/bookings
pub async fn list_bookings(
    State(state): State<AppState>,
    Path(space): Path<String>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<Reservation>> {
    let filter = query.into_filter()?;
    let bookings = state.service(&space)?.list_bookings(&filter).await?;
    Ok(Json(bookings))
}

/// POST /spaces/{space}/bookings
pub async fn create_booking(
    State(state): State<AppState>,
    Path(space): Path<String>,
    headers: HeaderMap,
    Json(request): Json<BookingRequest>,
) -> Result<(StatusCode, Json<Reservation>), ApiError> {
    let identity = HeaderIdentity::from_headers(&headers);
    let reservation = state.service(&space)?.create_booking(&identity, &request).await?;
    Ok((StatusCode::CREATED, Json(reservation)))
}

/// GET /spaces/{space}/bookings/mine
pub async fn my_bookings(
    State(state): State<AppState>,
    Path(space): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Vec<Reservation>> {
    let identity = HeaderIdentity::from_headers(&headers);
    Ok(Json(state.service(&space)?.owner_bookings(&identity).await?))
}

/// GET /spaces/{space}/bookings/{id}
pub async fn get_booking(
    State(state): State<AppState>,
    Path((space, id)): Path<(String, Ulid)>,
) -> ApiResult<Reservation> {
    Ok(Json(state.service(&space)?.get_booking(id).await?))
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: Status,
}

/// PATCH /spaces/{space}/bookings/{id}/status
pub async fn update_status(
    State(state): State<AppState>,
    Path((space, id)): Path<(String, Ulid)>,
    headers: HeaderMap,
    Json(update): Json<StatusUpdate>,
) -> ApiResult<Reservation> {
    let identity = HeaderIdentity::from_headers(&headers);
    let reservation = state
        .service(&space)?
        .update_status(&identity, id, update.status)
        .await?;
    Ok(Json(reservation))
}

/// GET /spaces/{space}/availability/{year}/{month}
pub async fn month_availability(
    State(state): State<AppState>,
    Path((space, year, month)): Path<(String, i32, u32)>,
) -> ApiResult<Vec<DayAvailability>> {
    Ok(Json(state.service(&space)?.month_availability(year, month).await?))
}

/// POST /spaces/{space}/owners/sync
pub async fn sync_owner(
    State(state): State<AppState>,
    Path(space): Path<String>,
    headers: HeaderMap,
    Json(profile): Json<OwnerProfile>,
) -> ApiResult<Owner> {
    let identity = HeaderIdentity::from_headers(&headers);
    Ok(Json(state.service(&space)?.sync_owner(&identity, &profile).await?))
}

/// GET /spaces/{space}/owners/quota
pub async fn quota(
    State(state): State<AppState>,
    Path(space): Path<String>,
    headers: HeaderMap,
) -> ApiResult<QuotaSummary> {
    let identity = HeaderIdentity::from_headers(&headers);
    Ok(Json(state.service(&space)?.quota(&identity).await?))
}

/// POST /spaces/{space}/owners/quota/reset
pub async fn reset_quota(
    State(state): State<AppState>,
    Path(space): Path<String>,
    headers: HeaderMap,
) -> ApiResult<QuotaSummary> {
    let identity = HeaderIdentity::from_headers(&headers);
    Ok(Json(state.service(&space)?.reset_quota(&identity).await?))
}

/// GET /spaces/{space}/owners
pub async fn members(
    State(state): State<AppState>,
    Path(space): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Vec<Member>> {
    let identity = HeaderIdentity::from_headers(&headers);
    Ok(Json(state.service(&space)?.members(&identity).await?))
}

/// GET /spaces/{space}/owners/me
///
/// `null` until the caller's first sync or booking.
pub async fn profile(
    State(state): State<AppState>,
    Path(space): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Option<Owner>> {
    let identity = HeaderIdentity::from_headers(&headers);
    Ok(Json(state.service(&space)?.profile(&identity).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct ThreadQuery {
    pub with: Option<Ulid>,
}

/// GET /spaces/{space}/messages
pub async fn list_messages(
    State(state): State<AppState>,
    Path(space): Path<String>,
    headers: HeaderMap,
    Query(query): Query<ThreadQuery>,
) -> ApiResult<Vec<Message>> {
    let identity = HeaderIdentity::from_headers(&headers);
    Ok(Json(state.service(&space)?.messages(&identity, query.with).await?))
}

/// POST /spaces/{space}/messages
pub async fn send_message(
    State(state): State<AppState>,
    Path(space): Path<String>,
    headers: HeaderMap,
    Json(request): Json<MessageRequest>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let identity = HeaderIdentity::from_headers(&headers);
    let message = state.service(&space)?.send_message(&identity, &request).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// POST /spaces/{space}/messages/{id}/read
pub async fn mark_message_read(
    State(state): State<AppState>,
    Path((space, id)): Path<(String, Ulid)>,
    headers: HeaderMap,
) -> ApiResult<Message> {
    let identity = HeaderIdentity::from_headers(&headers);
    Ok(Json(state.service(&space)?.mark_message_read(&identity, id).await?))
}
