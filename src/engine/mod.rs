mod availability;
mod conflict;
mod error;
mod mutations;
mod queries;

pub use availability::day_calendar;
pub use error::StoreError;
pub use mutations::{NewMessage, NewReservation, QuotaCharge};

use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, RwLock};
use ulid::Ulid;

use crate::model::*;
use crate::wal::Wal;

/// Everything one space knows: its reservations, the owners booking it and
/// the messages between them.
#[derive(Debug, Default)]
pub struct SpaceState {
    /// Sorted by `start_date`.
    pub reservations: Vec<Reservation>,
    pub owners: HashMap<Ulid, Owner>,
    /// In send order.
    pub messages: Vec<Message>,
}

impl SpaceState {
    /// Insert reservation maintaining sort order by start date.
    pub fn insert_reservation(&mut self, reservation: Reservation) {
        let pos = self
            .reservations
            .partition_point(|r| r.start_date <= reservation.start_date);
        self.reservations.insert(pos, reservation);
    }

    pub fn reservation(&self, id: &Ulid) -> Option<&Reservation> {
        self.reservations.iter().find(|r| r.id == *id)
    }

    fn reservation_mut(&mut self, id: &Ulid) -> Option<&mut Reservation> {
        self.reservations.iter_mut().find(|r| r.id == *id)
    }

    /// Reservations (any status) whose occupied days overlap `query`.
    /// Everything starting at or after `query.end` is skipped by binary search.
    pub fn overlapping(&self, query: &DateRange) -> impl Iterator<Item = &Reservation> {
        let right_bound = self
            .reservations
            .partition_point(|r| r.start_date < query.end);
        self.reservations[..right_bound]
            .iter()
            .filter(move |r| r.occupied().end > query.start)
    }

    pub fn owner_by_subject(&self, subject: &str) -> Option<&Owner> {
        self.owners
            .values()
            .find(|o| o.subject.as_deref() == Some(subject))
    }

    pub fn owner_by_email(&self, email: &str) -> Option<&Owner> {
        self.owners
            .values()
            .find(|o| !o.email.is_empty() && o.email.eq_ignore_ascii_case(email))
    }

    pub fn message(&self, id: &Ulid) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == *id)
    }
}

/// Apply an event directly to a SpaceState. Caller holds the lock.
fn apply_event(state: &mut SpaceState, event: &Event) {
    match event {
        Event::ReservationCreated { reservation } => {
            state.insert_reservation(reservation.clone());
        }
        Event::ReservationStatusChanged { id, status, at } => {
            if let Some(r) = state.reservation_mut(id) {
                r.status = *status;
                r.updated_at = *at;
            }
        }
        Event::OwnerCreated { owner } | Event::OwnerUpdated { owner } => {
            state.owners.insert(owner.id, owner.clone());
        }
        Event::QuotaCharged { owner_id, nights } => {
            if let Some(o) = state.owners.get_mut(owner_id) {
                o.nights_used = o.nights_used.saturating_add(*nights);
            }
        }
        Event::QuotaRefunded { owner_id, nights } => {
            if let Some(o) = state.owners.get_mut(owner_id) {
                o.nights_used = o.nights_used.saturating_sub(*nights);
            }
        }
        Event::QuotaReset { owner_id, period_start, at } => {
            if let Some(o) = state.owners.get_mut(owner_id) {
                o.nights_used = 0;
                o.quota_period_start = *period_start;
                o.updated_at = *at;
            }
        }
        Event::MessageSent { message } => {
            state.messages.push(message.clone());
        }
        Event::MessageRead { id, at } => {
            if let Some(m) = state.messages.iter_mut().find(|m| m.id == *id) {
                m.read_at.get_or_insert(*at);
            }
        }
    }
}

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    /// Events of one mutation. They are flushed together.
    Append {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

type PendingAppend = (Vec<Event>, oneshot::Sender<io::Result<()>>);

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { events, response } => {
                let mut batch: Vec<PendingAppend> = vec![(events, response)];
                let mut deferred = None;

                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { events, response }) => batch.push((events, response)),
                        Ok(other) => {
                            deferred = Some(other);
                            break;
                        }
                        Err(_) => break,
                    }
                }

                metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE)
                    .record(batch.len() as f64);
                let flush_start = std::time::Instant::now();
                let result = flush_batch(&mut wal, &batch);
                metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
                    .record(flush_start.elapsed().as_secs_f64());
                respond_batch(batch, &result);

                if let Some(other) = deferred {
                    handle_non_append(&mut wal, other);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn flush_batch(wal: &mut Wal, batch: &[PendingAppend]) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    'outer: for (events, _) in batch {
        for event in events {
            if let Err(e) = wal.append_buffered(event) {
                append_err = Some(e);
                break 'outer;
            }
        }
    }
    // Flush even after an append error so buffered bytes don't leak into the next batch.
    let flush_err = wal.flush_sync().err();
    match (append_err, flush_err) {
        (Some(e), _) | (None, Some(e)) => Err(e),
        (None, None) => Ok(()),
    }
}

fn respond_batch(batch: Vec<PendingAppend>, result: &io::Result<()>) {
    for (_, tx) in batch {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!("appends are batched by the writer loop"),
    }
}

/// Run a mutation on its own task and wait for it.
///
/// The caller may stop waiting (a timeout, a dropped request) but the lock,
/// WAL append and apply of a started mutation still finish together, so
/// memory never lags behind what replay would rebuild.
async fn detached<T, F>(mutation: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: Future<Output = Result<T, StoreError>> + Send + 'static,
{
    tokio::spawn(mutation)
        .await
        .map_err(|e| StoreError::Wal(format!("write task failed: {e}")))?
}

/// Durable state for one bookable space.
///
/// Every mutation takes the single write lock, re-checks its preconditions
/// against current state, appends to the WAL and only then applies. Two
/// concurrent requests for the same days therefore serialize, and the second
/// sees the first's reservation.
///
/// Cloning yields another handle to the same space.
#[derive(Clone)]
pub struct Engine {
    pub(super) state: Arc<RwLock<SpaceState>>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
}

impl Engine {
    pub fn new(wal_path: PathBuf) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let mut state = SpaceState::default();
        for event in &events {
            apply_event(&mut state, event);
        }
        tracing::debug!(
            "replayed {} events from {} ({} reservations, {} owners, {} messages)",
            events.len(),
            wal_path.display(),
            state.reservations.len(),
            state.owners.len(),
            state.messages.len()
        );

        Ok(Self {
            state: Arc::new(RwLock::new(state)),
            wal_tx,
        })
    }

    /// Write events to the WAL via the background group-commit writer.
    async fn wal_append(&self, events: Vec<Event>) -> Result<(), StoreError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append { events, response: tx })
            .await
            .map_err(|_| StoreError::Wal("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::Wal("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::Wal(e.to_string()))
    }

    /// WAL-append then apply. State is untouched if the append fails.
    /// Only called from inside [`detached`].
    pub(super) async fn persist_and_apply(
        &self,
        state: &mut SpaceState,
        events: Vec<Event>,
    ) -> Result<(), StoreError> {
        self.wal_append(events.clone()).await?;
        for event in &events {
            apply_event(state, event);
        }
        Ok(())
    }
}
