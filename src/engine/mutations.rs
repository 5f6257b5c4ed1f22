use chrono::{NaiveDate, NaiveTime, Utc};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::policy::quota;

use super::conflict::check_no_conflict;
use super::{detached, Engine, StoreError, WalCommand};

/// A priced, validated reservation ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReservation {
    pub owner_id: Option<Ulid>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub category: Category,
    pub counterpart_name: String,
    pub counterpart_contact: String,
    pub amount: u64,
    pub nights: u32,
    pub status: Status,
    pub notes: Option<String>,
}

/// Nights to take from an owner's quarterly allowance in the same write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaCharge {
    pub owner_id: Ulid,
    pub nights: u32,
    pub allowance: u32,
    pub today: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub from_owner: Ulid,
    pub to_owner: Ulid,
    pub body: String,
}

fn check_owner_fields(owner: &Owner) -> Result<(), StoreError> {
    if owner.name.len() > MAX_NAME_LEN {
        return Err(StoreError::LimitExceeded("owner name too long"));
    }
    if owner.email.len() > MAX_EMAIL_LEN {
        return Err(StoreError::LimitExceeded("owner email too long"));
    }
    if owner.phone.as_ref().is_some_and(|p| p.len() > MAX_PHONE_LEN) {
        return Err(StoreError::LimitExceeded("owner phone too long"));
    }
    Ok(())
}

impl Engine {
    /// Insert a reservation if none of its days are taken.
    ///
    /// The overlap check, the optional quota check and the WAL append all run
    /// under the space's write lock, so this call is the source of truth for
    /// double bookings, not any earlier read.
    pub async fn insert_reservation(
        &self,
        new: NewReservation,
        charge: Option<QuotaCharge>,
    ) -> Result<Reservation, StoreError> {
        let engine = self.clone();
        detached(async move { engine.insert_reservation_inner(new, charge).await }).await
    }

    async fn insert_reservation_inner(
        &self,
        new: NewReservation,
        charge: Option<QuotaCharge>,
    ) -> Result<Reservation, StoreError> {
        let mut guard = self.state.write().await;
        if guard.reservations.len() >= MAX_RESERVATIONS_PER_SPACE {
            return Err(StoreError::LimitExceeded("too many reservations in space"));
        }

        let now = Utc::now();
        let reservation = Reservation {
            id: Ulid::new(),
            owner_id: new.owner_id,
            start_date: new.start_date,
            end_date: new.end_date,
            start_time: new.start_time,
            end_time: new.end_time,
            category: new.category,
            counterpart_name: new.counterpart_name,
            counterpart_contact: new.counterpart_contact,
            amount: new.amount,
            nights: new.nights,
            status: new.status,
            notes: new.notes,
            quota_nights: charge.map_or(0, |c| c.nights),
            created_at: now,
            updated_at: now,
        };

        check_no_conflict(&guard, &reservation.occupied())?;

        let mut events = Vec::with_capacity(3);
        if let Some(c) = charge {
            let owner = guard.owners.get(&c.owner_id).ok_or(StoreError::NotFound(c.owner_id))?;
            if quota::period_is_stale(owner, c.today) {
                events.push(Event::QuotaReset {
                    owner_id: c.owner_id,
                    period_start: quota::quarter_start(c.today),
                    at: now,
                });
            }
            let used = quota::nights_used(owner, c.today);
            if used.saturating_add(c.nights) > c.allowance {
                return Err(StoreError::QuotaExceeded {
                    remaining: c.allowance.saturating_sub(used),
                    requested: c.nights,
                });
            }
        }
        events.push(Event::ReservationCreated { reservation: reservation.clone() });
        if let Some(c) = charge {
            events.push(Event::QuotaCharged { owner_id: c.owner_id, nights: c.nights });
        }

        self.persist_and_apply(&mut guard, events).await?;
        Ok(reservation)
    }

    /// Move a reservation along `pending → confirmed → cancelled`.
    /// Cancelling gives back any nights it took from the owner's quota.
    pub async fn update_status(&self, id: Ulid, status: Status) -> Result<Reservation, StoreError> {
        let engine = self.clone();
        detached(async move { engine.update_status_inner(id, status).await }).await
    }

    async fn update_status_inner(&self, id: Ulid, status: Status) -> Result<Reservation, StoreError> {
        let mut guard = self.state.write().await;
        let current = guard.reservation(&id).ok_or(StoreError::NotFound(id))?;
        if !current.status.can_transition_to(status) {
            return Err(StoreError::InvalidTransition { id, from: current.status, to: status });
        }

        let mut events = vec![Event::ReservationStatusChanged { id, status, at: Utc::now() }];
        if status == Status::Cancelled
            && current.quota_nights > 0
            && let Some(owner_id) = current.owner_id
            && guard.owners.contains_key(&owner_id) {
                events.push(Event::QuotaRefunded { owner_id, nights: current.quota_nights });
            }

        self.persist_and_apply(&mut guard, events).await?;
        guard.reservation(&id).cloned().ok_or(StoreError::NotFound(id))
    }

    pub async fn create_owner(&self, owner: Owner) -> Result<Owner, StoreError> {
        check_owner_fields(&owner)?;
        let engine = self.clone();
        detached(async move { engine.create_owner_inner(owner).await }).await
    }

    async fn create_owner_inner(&self, owner: Owner) -> Result<Owner, StoreError> {
        let mut guard = self.state.write().await;
        if guard.owners.len() >= MAX_OWNERS_PER_SPACE {
            return Err(StoreError::LimitExceeded("too many owners in space"));
        }
        if guard.owners.contains_key(&owner.id) {
            return Err(StoreError::AlreadyExists(owner.id));
        }
        if let Some(subject) = &owner.subject
            && let Some(existing) = guard.owner_by_subject(subject) {
                return Err(StoreError::AlreadyExists(existing.id));
            }
        let event = Event::OwnerCreated { owner: owner.clone() };
        self.persist_and_apply(&mut guard, vec![event]).await?;
        Ok(owner)
    }

    /// Replace an owner's profile. The quota counter is not taken from `owner`;
    /// it only changes through charges, refunds and resets.
    pub async fn update_owner(&self, owner: Owner) -> Result<Owner, StoreError> {
        check_owner_fields(&owner)?;
        let engine = self.clone();
        detached(async move { engine.update_owner_inner(owner).await }).await
    }

    async fn update_owner_inner(&self, owner: Owner) -> Result<Owner, StoreError> {
        let mut guard = self.state.write().await;
        let existing = guard.owners.get(&owner.id).ok_or(StoreError::NotFound(owner.id))?;
        let updated = Owner {
            nights_used: existing.nights_used,
            quota_period_start: existing.quota_period_start,
            created_at: existing.created_at,
            updated_at: Utc::now(),
            ..owner
        };
        let event = Event::OwnerUpdated { owner: updated.clone() };
        self.persist_and_apply(&mut guard, vec![event]).await?;
        Ok(updated)
    }

    pub async fn reset_quota(&self, owner_id: Ulid, period_start: NaiveDate) -> Result<Owner, StoreError> {
        let engine = self.clone();
        detached(async move { engine.reset_quota_inner(owner_id, period_start).await }).await
    }

    async fn reset_quota_inner(&self, owner_id: Ulid, period_start: NaiveDate) -> Result<Owner, StoreError> {
        let mut guard = self.state.write().await;
        if !guard.owners.contains_key(&owner_id) {
            return Err(StoreError::NotFound(owner_id));
        }
        let event = Event::QuotaReset { owner_id, period_start, at: Utc::now() };
        self.persist_and_apply(&mut guard, vec![event]).await?;
        guard.owners.get(&owner_id).cloned().ok_or(StoreError::NotFound(owner_id))
    }

    /// Store a message. Both ends must be owners of this space.
    pub async fn insert_message(&self, new: NewMessage) -> Result<Message, StoreError> {
        if new.body.len() > MAX_MESSAGE_LEN {
            return Err(StoreError::LimitExceeded("message too long"));
        }
        let engine = self.clone();
        detached(async move { engine.insert_message_inner(new).await }).await
    }

    async fn insert_message_inner(&self, new: NewMessage) -> Result<Message, StoreError> {
        let mut guard = self.state.write().await;
        if guard.messages.len() >= MAX_MESSAGES_PER_SPACE {
            return Err(StoreError::LimitExceeded("too many messages in space"));
        }
        for id in [new.from_owner, new.to_owner] {
            if !guard.owners.contains_key(&id) {
                return Err(StoreError::NotFound(id));
            }
        }
        let message = Message {
            id: Ulid::new(),
            from_owner: new.from_owner,
            to_owner: new.to_owner,
            body: new.body,
            created_at: Utc::now(),
            read_at: None,
        };
        let event = Event::MessageSent { message: message.clone() };
        self.persist_and_apply(&mut guard, vec![event]).await?;
        Ok(message)
    }

    /// Mark a message read. Only its recipient may; anyone else gets
    /// `NotFound`. A second read keeps the first timestamp and writes nothing.
    pub async fn mark_message_read(&self, id: Ulid, reader: Ulid) -> Result<Message, StoreError> {
        let engine = self.clone();
        detached(async move { engine.mark_message_read_inner(id, reader).await }).await
    }

    async fn mark_message_read_inner(&self, id: Ulid, reader: Ulid) -> Result<Message, StoreError> {
        let mut guard = self.state.write().await;
        let message = guard
            .message(&id)
            .filter(|m| m.to_owner == reader)
            .ok_or(StoreError::NotFound(id))?;
        if message.read_at.is_some() {
            return Ok(message.clone());
        }
        let event = Event::MessageRead { id, at: Utc::now() };
        self.persist_and_apply(&mut guard, vec![event]).await?;
        guard.message(&id).cloned().ok_or(StoreError::NotFound(id))
    }

    /// Compact the WAL by rewriting it with only the events needed to recreate the current state.
    pub async fn compact_wal(&self) -> Result<(), StoreError> {
        // Hold the read lock across the swap so no append can land between
        // the snapshot and the rewrite.
        let guard = self.state.read().await;
        let mut events =
            Vec::with_capacity(guard.owners.len() + guard.reservations.len() + guard.messages.len());
        for owner in guard.owners.values() {
            events.push(Event::OwnerCreated { owner: owner.clone() });
        }
        for reservation in &guard.reservations {
            events.push(Event::ReservationCreated { reservation: reservation.clone() });
        }
        for message in &guard.messages {
            events.push(Event::MessageSent { message: message.clone() });
        }

        let (tx, rx) = tokio::sync::oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| StoreError::Wal("WAL writer shut down".into()))?;
        let result = rx
            .await
            .map_err(|_| StoreError::Wal("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::Wal(e.to_string()));
        drop(guard);
        result
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = tokio::sync::oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
