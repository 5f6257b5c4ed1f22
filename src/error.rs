use axum::http::StatusCode;
use chrono::NaiveDate;
use ulid::Ulid;

use crate::engine::StoreError;
use crate::model::Status;

/// The request itself is malformed. Nothing was read or written.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    #[error("unknown booking category: {0:?}")]
    UnknownCategory(String),
    #[error("cannot book dates in the past ({start} is before {today})")]
    PastDate { start: NaiveDate, today: NaiveDate },
    #[error("same-day bookings require start and end times")]
    SameDayRequiresTimes,
    #[error("start time must be before end time")]
    InvalidTimeRange,
    #[error("check-out date must not be before check-in date")]
    InvertedRange,
    #[error("stay of {nights} nights exceeds the {max} night limit")]
    RangeTooLong { nights: i64, max: i64 },
    #[error("{field} is longer than {max} characters")]
    FieldTooLong { field: &'static str, max: usize },
    #[error("no such month: {year}-{month}")]
    InvalidMonth { year: i32, month: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConflictError {
    #[error("booking dates conflict with {} existing reservation(s)", .conflicting_ids.len())]
    DateConflict { conflicting_ids: Vec<Ulid> },
}

impl ConflictError {
    pub fn conflicting_ids(&self) -> &[Ulid] {
        match self {
            ConflictError::DateConflict { conflicting_ids } => conflicting_ids,
        }
    }
}

/// A category-specific rule rejected an otherwise valid request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("personal use bookings are limited to {max} nights per stay; {requested} requested")]
    StayTooLong { requested: u32, max: u32 },
    #[error("insufficient nights remaining: {remaining} left this quarter, {requested} requested")]
    QuotaExceeded { remaining: u32, requested: u32 },
    #[error("personal use bookings require an owner account")]
    OwnerRequired,
    #[error("amount overflows")]
    AmountOverflow,
}

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Conflict(#[from] ConflictError),
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error("not found: {0}")]
    NotFound(Ulid),
    #[error("cannot move booking {id} from {from} to {to}")]
    InvalidTransition { id: Ulid, from: Status, to: Status },
    #[error("authentication required")]
    Unauthorized,
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl BookingError {
    /// Short machine-readable kind, also used as a metrics label.
    pub fn code(&self) -> &'static str {
        match self {
            BookingError::Validation(ValidationError::MissingFields(_)) => "missing_fields",
            BookingError::Validation(ValidationError::UnknownCategory(_)) => "unknown_category",
            BookingError::Validation(ValidationError::PastDate { .. }) => "past_date",
            BookingError::Validation(ValidationError::SameDayRequiresTimes) => "same_day_requires_times",
            BookingError::Validation(ValidationError::InvalidTimeRange) => "invalid_time_range",
            BookingError::Validation(ValidationError::InvertedRange) => "inverted_range",
            BookingError::Validation(ValidationError::RangeTooLong { .. }) => "range_too_long",
            BookingError::Validation(ValidationError::FieldTooLong { .. }) => "field_too_long",
            BookingError::Validation(ValidationError::InvalidMonth { .. }) => "invalid_month",
            BookingError::Conflict(_) => "date_conflict",
            BookingError::Policy(PolicyError::StayTooLong { .. }) => "stay_too_long",
            BookingError::Policy(PolicyError::QuotaExceeded { .. }) => "quota_exceeded",
            BookingError::Policy(PolicyError::OwnerRequired) => "owner_required",
            BookingError::Policy(PolicyError::AmountOverflow) => "amount_overflow",
            BookingError::NotFound(_) => "not_found",
            BookingError::InvalidTransition { .. } => "invalid_transition",
            BookingError::Unauthorized => "unauthorized",
            BookingError::LimitExceeded(_) => "limit_exceeded",
            BookingError::StoreUnavailable(_) => "store_unavailable",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            BookingError::Validation(_) | BookingError::Policy(_) | BookingError::LimitExceeded(_) => {
                StatusCode::BAD_REQUEST
            }
            BookingError::Conflict(_) | BookingError::InvalidTransition { .. } => StatusCode::CONFLICT,
            BookingError::NotFound(_) => StatusCode::NOT_FOUND,
            BookingError::Unauthorized => StatusCode::UNAUTHORIZED,
            BookingError::StoreUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether retrying the same call later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BookingError::StoreUnavailable(_))
    }
}

impl From<StoreError> for BookingError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(conflicting_ids) => {
                BookingError::Conflict(ConflictError::DateConflict { conflicting_ids })
            }
            StoreError::QuotaExceeded { remaining, requested } => {
                BookingError::Policy(PolicyError::QuotaExceeded { remaining, requested })
            }
            StoreError::NotFound(id) => BookingError::NotFound(id),
            StoreError::InvalidTransition { id, from, to } => {
                BookingError::InvalidTransition { id, from, to }
            }
            StoreError::LimitExceeded(what) => BookingError::LimitExceeded(what),
            other => BookingError::StoreUnavailable(other.to_string()),
        }
    }
}
