use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::clock::Clock;
use crate::config::PolicyConfig;
use crate::engine::{NewMessage, NewReservation, QuotaCharge, StoreError};
use crate::error::{BookingError, ConflictError, PolicyError, ValidationError};
use crate::identity::{IdentityProvider, Subject};
use crate::limits::MAX_MESSAGE_LEN;
use crate::model::*;
use crate::notify::{
    booking_confirmation, confirmation_recipient, message_notification, Notification, NotificationDispatcher,
};
use crate::observability;
use crate::policy::{self, quota, BookingRequest, Quote, ValidatedRequest};
use crate::store::DataStore;

const DEFAULT_OWNER_NAME: &str = "User";

/// Profile fields an owner may push from their identity provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OwnerProfile {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// A direct message as submitted by its sender.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MessageRequest {
    pub to: Option<Ulid>,
    pub body: Option<String>,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn validate_message(input: &MessageRequest) -> Result<(Ulid, String), ValidationError> {
    let body = non_blank(input.body.as_deref());
    let mut missing = Vec::new();
    if input.to.is_none() {
        missing.push("to");
    }
    if body.is_none() {
        missing.push("body");
    }
    match (input.to, body) {
        (Some(to), Some(body)) if body.len() <= MAX_MESSAGE_LEN => Ok((to, body.to_string())),
        (Some(_), Some(_)) => Err(ValidationError::FieldTooLong { field: "body", max: MAX_MESSAGE_LEN }),
        _ => Err(ValidationError::MissingFields(missing)),
    }
}

/// The booking pipeline for one space: validate, check conflicts, price,
/// then write. Each stage short-circuits; nothing is written unless every
/// earlier stage passed.
pub struct BookingService {
    store: Arc<dyn DataStore>,
    notifier: Arc<dyn NotificationDispatcher>,
    clock: Arc<dyn Clock>,
    config: PolicyConfig,
}

impl BookingService {
    pub fn new(
        store: Arc<dyn DataStore>,
        notifier: Arc<dyn NotificationDispatcher>,
        clock: Arc<dyn Clock>,
        config: PolicyConfig,
    ) -> Self {
        Self { store, notifier, clock, config }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Run a store call under the configured deadline, keeping the store's own error.
    async fn deadline<T>(
        &self,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        tokio::time::timeout(self.config.store_timeout, fut)
            .await
            .unwrap_or(Err(StoreError::Timeout))
    }

    async fn call<T>(
        &self,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, BookingError> {
        Ok(self.deadline(fut).await?)
    }

    // ── Pipeline stages ─────────────────────────────────────────

    pub fn validate_request(&self, input: &BookingRequest) -> Result<ValidatedRequest, BookingError> {
        Ok(policy::validate_request(input, self.clock.today())?)
    }

    /// Fails with the ids of every active reservation holding a requested day.
    pub async fn check_conflict(&self, range: &DateRange) -> Result<(), BookingError> {
        let conflicting_ids = self.call(self.store.conflicts(range)).await?;
        if conflicting_ids.is_empty() {
            Ok(())
        } else {
            Err(ConflictError::DateConflict { conflicting_ids }.into())
        }
    }

    pub fn price_and_enforce(&self, validated: &ValidatedRequest) -> Result<Quote, BookingError> {
        Ok(policy::price_and_enforce(
            validated.category,
            validated.nights,
            &self.config.pricing,
        )?)
    }

    /// Store the reservation. Overlap, and the quota charge when the counter
    /// is enforced, are re-checked by the store in the same write.
    pub async fn write_reservation(
        &self,
        validated: ValidatedRequest,
        quote: Quote,
        owner: Option<&Owner>,
    ) -> Result<Reservation, BookingError> {
        let charge = if self.config.enforce_quota_counter
            && validated.category == Category::OwnerPersonal
        {
            let owner = owner.ok_or(PolicyError::OwnerRequired)?;
            Some(QuotaCharge {
                owner_id: owner.id,
                nights: quote.nights,
                allowance: self.config.quota_nights_per_period,
                today: self.clock.today(),
            })
        } else {
            None
        };

        let status = if self.config.auto_confirm {
            Status::Confirmed
        } else {
            Status::Pending
        };
        let new = NewReservation {
            owner_id: owner.map(|o| o.id),
            start_date: validated.start_date,
            end_date: validated.end_date,
            start_time: validated.start_time,
            end_time: validated.end_time,
            category: validated.category,
            counterpart_name: validated.counterpart_name,
            counterpart_contact: validated.counterpart_contact,
            amount: quote.amount,
            nights: quote.nights,
            status,
            notes: validated.notes,
        };

        let reservation = self.call(self.store.insert_reservation(new, charge)).await?;
        metrics::counter!(observability::BOOKINGS_CREATED_TOTAL, "category" => reservation.category.as_str())
            .increment(1);
        info!(
            "booking {} written: {} {} nights, {}",
            reservation.id,
            reservation.category,
            reservation.nights,
            reservation.occupied()
        );
        self.send_confirmation(&reservation, owner.map(|o| o.email.as_str()));
        Ok(reservation)
    }

    fn send_confirmation(&self, reservation: &Reservation, owner_email: Option<&str>) {
        let Some(to) = confirmation_recipient(reservation, owner_email) else {
            debug!("booking {} has no confirmation recipient", reservation.id);
            return;
        };
        self.dispatch_detached(booking_confirmation(reservation, to), format!("booking {}", reservation.id));
    }

    /// Fire-and-forget delivery. Failures are logged and counted only.
    fn dispatch_detached(&self, notification: Notification, about: String) {
        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.dispatch(notification).await {
                metrics::counter!(observability::NOTIFICATION_FAILURES_TOTAL).increment(1);
                warn!("notification for {about} not sent: {e}");
            }
        });
    }

    // ── Operations ──────────────────────────────────────────────

    pub async fn create_booking(
        &self,
        identity: &dyn IdentityProvider,
        input: &BookingRequest,
    ) -> Result<Reservation, BookingError> {
        let result = self.run_pipeline(identity, input).await;
        if let Err(e) = &result {
            observability::record_rejection(e);
            debug!("booking rejected ({}): {e}", e.code());
        }
        result
    }

    async fn run_pipeline(
        &self,
        identity: &dyn IdentityProvider,
        input: &BookingRequest,
    ) -> Result<Reservation, BookingError> {
        let validated = self.validate_request(input)?;
        self.check_conflict(&validated.requested_range()).await?;
        let quote = self.price_and_enforce(&validated)?;
        let owner = match identity.current_subject().await {
            Some(subject) => Some(self.owner_for(&subject).await?),
            None => None,
        };
        self.write_reservation(validated, quote, owner.as_ref()).await
    }

    /// Move a booking to `status`. Anonymous callers are refused.
    pub async fn update_status(
        &self,
        identity: &dyn IdentityProvider,
        id: Ulid,
        status: Status,
    ) -> Result<Reservation, BookingError> {
        let subject = identity.current_subject().await.ok_or(BookingError::Unauthorized)?;
        let reservation = self.call(self.store.update_status(id, status)).await?;
        metrics::counter!(observability::STATUS_TRANSITIONS_TOTAL, "to" => status.as_str()).increment(1);
        info!("booking {id} is now {status} (by {})", subject.id);
        Ok(reservation)
    }

    pub async fn get_booking(&self, id: Ulid) -> Result<Reservation, BookingError> {
        self.call(self.store.get_reservation(id))
            .await?
            .ok_or(BookingError::NotFound(id))
    }

    pub async fn list_bookings(&self, filter: &ReservationFilter) -> Result<Vec<Reservation>, BookingError> {
        self.call(self.store.list_reservations(filter)).await
    }

    /// The caller's own bookings, newest stay first.
    pub async fn owner_bookings(&self, identity: &dyn IdentityProvider) -> Result<Vec<Reservation>, BookingError> {
        let owner = self.ensure_owner(identity).await?;
        let filter = ReservationFilter { owner_id: Some(owner.id), ..Default::default() };
        let mut bookings = self.list_bookings(&filter).await?;
        bookings.reverse();
        Ok(bookings)
    }

    /// Bring the caller's owner record in line with `profile`.
    ///
    /// Lookup is by subject, then by email among records no subject has
    /// claimed yet (linking that record to this subject). A new record is
    /// created when neither matches. A blank phone never clears a stored one.
    pub async fn sync_owner(
        &self,
        identity: &dyn IdentityProvider,
        profile: &OwnerProfile,
    ) -> Result<Owner, BookingError> {
        let subject = identity.current_subject().await.ok_or(BookingError::Unauthorized)?;
        self.sync_subject(&subject, profile).await
    }

    async fn sync_subject(&self, subject: &Subject, profile: &OwnerProfile) -> Result<Owner, BookingError> {
        let email = non_blank(profile.email.as_deref())
            .or(non_blank(subject.email.as_deref()))
            .map(str::to_string);
        let name = non_blank(profile.name.as_deref())
            .or(non_blank(subject.name.as_deref()))
            .map(str::to_string);
        let phone = non_blank(profile.phone.as_deref()).map(str::to_string);

        let mut existing = self.call(self.store.find_owner_by_subject(&subject.id)).await?;
        if existing.is_none()
            && let Some(email) = &email
        {
            existing = self
                .call(self.store.find_owner_by_email(email))
                .await?
                .filter(|o| o.subject.is_none());
        }

        if let Some(owner) = existing {
            let relinked = owner.subject.as_deref() != Some(subject.id.as_str());
            let updated = Owner {
                subject: Some(subject.id.clone()),
                name: name.unwrap_or(owner.name.clone()),
                email: email.unwrap_or(owner.email.clone()),
                phone: phone.or(owner.phone.clone()),
                ..owner
            };
            let updated = self.call(self.store.update_owner(updated)).await?;
            if relinked {
                info!("owner {} linked to subject {}", updated.id, subject.id);
            }
            return Ok(updated);
        }

        let now = Utc::now();
        let owner = Owner {
            id: Ulid::new(),
            subject: Some(subject.id.clone()),
            name: name.unwrap_or_else(|| DEFAULT_OWNER_NAME.to_string()),
            email: email.unwrap_or_default(),
            phone,
            nights_used: 0,
            quota_period_start: quota::quarter_start(self.clock.today()),
            created_at: now,
            updated_at: now,
        };
        match self.deadline(self.store.create_owner(owner)).await {
            Ok(owner) => {
                info!("owner {} created for subject {}", owner.id, subject.id);
                Ok(owner)
            }
            // A concurrent first request for this subject got there first.
            Err(StoreError::AlreadyExists(id)) => self
                .call(self.store.get_owner(id))
                .await?
                .ok_or(BookingError::NotFound(id)),
            Err(e) => Err(e.into()),
        }
    }

    /// The caller's owner record, created on first use.
    pub async fn ensure_owner(&self, identity: &dyn IdentityProvider) -> Result<Owner, BookingError> {
        let subject = identity.current_subject().await.ok_or(BookingError::Unauthorized)?;
        self.owner_for(&subject).await
    }

    async fn owner_for(&self, subject: &Subject) -> Result<Owner, BookingError> {
        if let Some(owner) = self.call(self.store.find_owner_by_subject(&subject.id)).await? {
            return Ok(owner);
        }
        self.sync_subject(subject, &OwnerProfile::default()).await
    }

    pub async fn quota(&self, identity: &dyn IdentityProvider) -> Result<QuotaSummary, BookingError> {
        let owner = self.ensure_owner(identity).await?;
        Ok(quota::summary(&owner, self.config.quota_nights_per_period, self.clock.today()))
    }

    /// Zero the caller's counter and start a new period today.
    pub async fn reset_quota(&self, identity: &dyn IdentityProvider) -> Result<QuotaSummary, BookingError> {
        let owner = self.ensure_owner(identity).await?;
        let today = self.clock.today();
        let owner = self.call(self.store.reset_quota(owner.id, today)).await?;
        info!("quota reset for owner {}", owner.id);
        Ok(quota::summary(&owner, self.config.quota_nights_per_period, today))
    }

    pub async fn month_availability(&self, year: i32, month: u32) -> Result<Vec<DayAvailability>, BookingError> {
        let window = DateRange::month(year, month)
            .ok_or(ValidationError::InvalidMonth { year, month })?;
        self.call(self.store.calendar(&window)).await
    }

    /// The caller's owner record, if they have one. Never creates it.
    pub async fn profile(&self, identity: &dyn IdentityProvider) -> Result<Option<Owner>, BookingError> {
        let subject = identity.current_subject().await.ok_or(BookingError::Unauthorized)?;
        self.call(self.store.find_owner_by_subject(&subject.id)).await
    }

    /// Every other owner of the space, by name.
    pub async fn members(&self, identity: &dyn IdentityProvider) -> Result<Vec<Member>, BookingError> {
        let subject = identity.current_subject().await.ok_or(BookingError::Unauthorized)?;
        let owners = self.call(self.store.list_owners()).await?;
        Ok(owners
            .iter()
            .filter(|o| o.subject.as_deref() != Some(subject.id.as_str()))
            .map(Member::from)
            .collect())
    }

    /// Send a direct message to another owner and tell them by email.
    pub async fn send_message(
        &self,
        identity: &dyn IdentityProvider,
        input: &MessageRequest,
    ) -> Result<Message, BookingError> {
        let subject = identity.current_subject().await.ok_or(BookingError::Unauthorized)?;
        let (to, body) = validate_message(input)?;
        let recipient = self
            .call(self.store.get_owner(to))
            .await?
            .ok_or(BookingError::NotFound(to))?;
        let sender = self.owner_for(&subject).await?;

        let new = NewMessage { from_owner: sender.id, to_owner: recipient.id, body };
        let message = self.call(self.store.insert_message(new)).await?;
        metrics::counter!(observability::MESSAGES_SENT_TOTAL).increment(1);
        info!("message {} sent from {} to {}", message.id, sender.id, recipient.id);

        match non_blank(Some(recipient.email.as_str())) {
            Some(email) => self.dispatch_detached(
                message_notification(&message, &sender.name, email.to_string()),
                format!("message {}", message.id),
            ),
            None => debug!("owner {} has no email for message {}", recipient.id, message.id),
        }
        Ok(message)
    }

    /// The caller's messages, oldest first; only the thread with `with` when given.
    pub async fn messages(
        &self,
        identity: &dyn IdentityProvider,
        with: Option<Ulid>,
    ) -> Result<Vec<Message>, BookingError> {
        let owner = self.ensure_owner(identity).await?;
        self.call(self.store.list_messages(owner.id, with)).await
    }

    /// Mark a message the caller received as read.
    pub async fn mark_message_read(
        &self,
        identity: &dyn IdentityProvider,
        id: Ulid,
    ) -> Result<Message, BookingError> {
        let owner = self.ensure_owner(identity).await?;
        self.call(self.store.mark_message_read(id, owner.id)).await
    }
}
