use async_trait::async_trait;
use chrono::NaiveDate;
use ulid::Ulid;

use crate::engine::{Engine, NewMessage, NewReservation, QuotaCharge, StoreError};
use crate::model::*;

/// Persistence the booking pipeline needs from a space.
///
/// `insert_reservation` must re-check overlap (and the quota charge, when
/// given) atomically with the write; callers treat earlier reads as advisory.
#[async_trait]
pub trait DataStore: Send + Sync {
    async fn conflicts(&self, range: &DateRange) -> Result<Vec<Ulid>, StoreError>;
    async fn insert_reservation(
        &self,
        new: NewReservation,
        charge: Option<QuotaCharge>,
    ) -> Result<Reservation, StoreError>;
    async fn get_reservation(&self, id: Ulid) -> Result<Option<Reservation>, StoreError>;
    async fn list_reservations(&self, filter: &ReservationFilter) -> Result<Vec<Reservation>, StoreError>;
    async fn update_status(&self, id: Ulid, status: Status) -> Result<Reservation, StoreError>;
    async fn calendar(&self, window: &DateRange) -> Result<Vec<DayAvailability>, StoreError>;

    async fn get_owner(&self, id: Ulid) -> Result<Option<Owner>, StoreError>;
    async fn find_owner_by_subject(&self, subject: &str) -> Result<Option<Owner>, StoreError>;
    async fn find_owner_by_email(&self, email: &str) -> Result<Option<Owner>, StoreError>;
    async fn create_owner(&self, owner: Owner) -> Result<Owner, StoreError>;
    async fn update_owner(&self, owner: Owner) -> Result<Owner, StoreError>;
    async fn reset_quota(&self, owner_id: Ulid, period_start: NaiveDate) -> Result<Owner, StoreError>;
    async fn list_owners(&self) -> Result<Vec<Owner>, StoreError>;

    async fn insert_message(&self, new: NewMessage) -> Result<Message, StoreError>;
    async fn mark_message_read(&self, id: Ulid, reader: Ulid) -> Result<Message, StoreError>;
    async fn list_messages(&self, owner_id: Ulid, with: Option<Ulid>) -> Result<Vec<Message>, StoreError>;
}

#[async_trait]
impl DataStore for Engine {
    async fn conflicts(&self, range: &DateRange) -> Result<Vec<Ulid>, StoreError> {
        Ok(Engine::conflicts(self, range).await)
    }

    async fn insert_reservation(
        &self,
        new: NewReservation,
        charge: Option<QuotaCharge>,
    ) -> Result<Reservation, StoreError> {
        Engine::insert_reservation(self, new, charge).await
    }

    async fn get_reservation(&self, id: Ulid) -> Result<Option<Reservation>, StoreError> {
        Ok(Engine::get_reservation(self, &id).await)
    }

    async fn list_reservations(&self, filter: &ReservationFilter) -> Result<Vec<Reservation>, StoreError> {
        Ok(Engine::list_reservations(self, filter).await)
    }

    async fn update_status(&self, id: Ulid, status: Status) -> Result<Reservation, StoreError> {
        Engine::update_status(self, id, status).await
    }

    async fn calendar(&self, window: &DateRange) -> Result<Vec<DayAvailability>, StoreError> {
        Ok(Engine::calendar(self, window).await)
    }

    async fn get_owner(&self, id: Ulid) -> Result<Option<Owner>, StoreError> {
        Ok(Engine::get_owner(self, &id).await)
    }

    async fn find_owner_by_subject(&self, subject: &str) -> Result<Option<Owner>, StoreError> {
        Ok(Engine::find_owner_by_subject(self, subject).await)
    }

    async fn find_owner_by_email(&self, email: &str) -> Result<Option<Owner>, StoreError> {
        Ok(Engine::find_owner_by_email(self, email).await)
    }

    async fn create_owner(&self, owner: Owner) -> Result<Owner, StoreError> {
        Engine::create_owner(self, owner).await
    }

    async fn update_owner(&self, owner: Owner) -> Result<Owner, StoreError> {
        Engine::update_owner(self, owner).await
    }

    async fn reset_quota(&self, owner_id: Ulid, period_start: NaiveDate) -> Result<Owner, StoreError> {
        Engine::reset_quota(self, owner_id, period_start).await
    }

    async fn list_owners(&self) -> Result<Vec<Owner>, StoreError> {
        Ok(Engine::list_owners(self).await)
    }

    async fn insert_message(&self, new: NewMessage) -> Result<Message, StoreError> {
        Engine::insert_message(self, new).await
    }

    async fn mark_message_read(&self, id: Ulid, reader: Ulid) -> Result<Message, StoreError> {
        Engine::mark_message_read(self, id, reader).await
    }

    async fn list_messages(&self, owner_id: Ulid, with: Option<Ulid>) -> Result<Vec<Message>, StoreError> {
        Ok(Engine::list_messages(self, owner_id, with).await)
    }
}
