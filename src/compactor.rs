use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::engine::Engine;

const CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Background task that rewrites a space's WAL once enough appends pile up.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    let mut interval = tokio::time::interval(CHECK_INTERVAL);
    loop {
        interval.tick().await;
        compact_if_needed(&engine, threshold).await;
    }
}

/// One compactor pass. Returns whether the WAL was rewritten.
pub async fn compact_if_needed(engine: &Engine, threshold: u64) -> bool {
    let appends = engine.wal_appends_since_compact().await;
    if appends < threshold {
        return false;
    }
    match engine.compact_wal().await {
        Ok(()) => {
            info!("compacted WAL after {appends} appends");
            true
        }
        Err(e) => {
            tracing::error!("WAL compaction failed: {e}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::NewReservation;
    use crate::model::*;
    use crate::wal::Wal;
    use chrono::NaiveDate;
    use std::path::PathBuf;

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("callabo_test_compactor");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    fn stay(start: NaiveDate) -> NewReservation {
        NewReservation {
            owner_id: None,
            start_date: start,
            end_date: start.succ_opt().unwrap(),
            start_time: None,
            end_time: None,
            category: Category::PayingClient,
            counterpart_name: "Guest".into(),
            counterpart_contact: "guest@example.com".into(),
            amount: 100,
            nights: 1,
            status: Status::Pending,
            notes: None,
        }
    }

    #[tokio::test]
    async fn compacts_past_threshold_only() {
        let path = test_wal_path("threshold.wal");
        let engine = Engine::new(path.clone()).unwrap();

        let start = NaiveDate::from_ymd_opt(2025, 8, 1).unwrap();
        let r = engine.insert_reservation(stay(start), None).await.unwrap();
        engine.update_status(r.id, Status::Confirmed).await.unwrap();
        engine.update_status(r.id, Status::Cancelled).await.unwrap();

        assert!(!compact_if_needed(&engine, 10).await);
        assert!(compact_if_needed(&engine, 3).await);
        assert_eq!(engine.wal_appends_since_compact().await, 0);

        // The status history collapses into a single created event.
        let events = Wal::replay(&path).unwrap();
        assert_eq!(events.len(), 1);
        match &events[0] {
            Event::ReservationCreated { reservation } => {
                assert_eq!(reservation.status, Status::Cancelled)
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
