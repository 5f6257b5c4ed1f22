use std::path::PathBuf;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::compactor;
use crate::engine::Engine;
use crate::limits::*;

/// Manages per-space engines. Each space gets its own Engine + WAL + compactor.
/// Space = the `{space}` path segment of the HTTP API.
pub struct TenantManager {
    engines: DashMap<String, Arc<Engine>>,
    data_dir: PathBuf,
    compact_threshold: u64,
}

/// Strip everything but `[A-Za-z0-9_-]` so a space name is a safe file stem.
fn sanitize(space: &str) -> String {
    space
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

impl TenantManager {
    pub fn new(data_dir: PathBuf, compact_threshold: u64) -> Self {
        Self {
            engines: DashMap::new(),
            data_dir,
            compact_threshold,
        }
    }

    /// Get or lazily create the engine for a space.
    pub fn get_or_create(&self, space: &str) -> std::io::Result<Arc<Engine>> {
        if space.len() > MAX_TENANT_NAME_LEN {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "space name too long",
            ));
        }
        let safe_name = sanitize(space);
        if safe_name.is_empty() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "empty space name",
            ));
        }
        if let Some(engine) = self.engines.get(&safe_name) {
            return Ok(engine.value().clone());
        }

        if self.engines.len() >= MAX_TENANTS {
            return Err(std::io::Error::other("too many spaces"));
        }

        // Two first requests for the same space race here; the entry lock
        // makes sure only one engine (and one WAL writer) is created.
        let entry = self.engines.entry(safe_name.clone());
        if let Entry::Occupied(existing) = &entry {
            return Ok(existing.get().clone());
        }

        let wal_path = self.data_dir.join(format!("{safe_name}.wal"));
        let engine = Arc::new(Engine::new(wal_path)?);

        let compactor_engine = engine.clone();
        let threshold = self.compact_threshold;
        tokio::spawn(async move {
            compactor::run_compactor(compactor_engine, threshold).await;
        });

        entry.insert(engine.clone());
        metrics::gauge!(crate::observability::TENANTS_ACTIVE).set(self.engines.len() as f64);
        tracing::info!("space {safe_name} loaded");
        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::NewReservation;
    use crate::model::*;
    use chrono::NaiveDate;
    use std::fs;

    fn test_data_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("callabo_test_tenant").join(name);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn stay() -> NewReservation {
        let start = NaiveDate::from_ymd_opt(2025, 8, 1).unwrap();
        NewReservation {
            owner_id: None,
            start_date: start,
            end_date: NaiveDate::from_ymd_opt(2025, 8, 3).unwrap(),
            start_time: None,
            end_time: None,
            category: Category::ReferredGuest,
            counterpart_name: "Ben".into(),
            counterpart_contact: "ben@example.com".into(),
            amount: 100,
            nights: 2,
            status: Status::Confirmed,
            notes: None,
        }
    }

    #[tokio::test]
    async fn space_isolation() {
        let dir = test_data_dir("isolation");
        let tm = TenantManager::new(dir, 1000);

        let eng_a = tm.get_or_create("lake_house").unwrap();
        let eng_b = tm.get_or_create("city_flat").unwrap();

        eng_a.insert_reservation(stay(), None).await.unwrap();

        // Same dates are still free in the other space.
        eng_b.insert_reservation(stay(), None).await.unwrap();
        assert!(eng_a.insert_reservation(stay(), None).await.is_err());
    }

    #[tokio::test]
    async fn space_lazy_creation() {
        let dir = test_data_dir("lazy");
        let tm = TenantManager::new(dir.clone(), 1000);

        let entries: Vec<_> = fs::read_dir(&dir).unwrap().collect();
        assert!(entries.is_empty());

        let _eng = tm.get_or_create("cabin").unwrap();
        assert!(dir.join("cabin.wal").exists());
    }

    #[tokio::test]
    async fn same_engine_returned() {
        let dir = test_data_dir("same_eng");
        let tm = TenantManager::new(dir, 1000);

        let eng1 = tm.get_or_create("foo").unwrap();
        let eng2 = tm.get_or_create("foo").unwrap();
        assert!(Arc::ptr_eq(&eng1, &eng2));

        // Names that sanitise to the same stem share a WAL, so they share an engine.
        let eng3 = tm.get_or_create("f/o/o").unwrap();
        assert!(Arc::ptr_eq(&eng1, &eng3));
    }

    #[tokio::test]
    async fn space_name_sanitized() {
        let dir = test_data_dir("sanitize");
        let tm = TenantManager::new(dir.clone(), 1000);

        let _eng = tm.get_or_create("../evil").unwrap();
        assert!(dir.join("evil.wal").exists());

        let result = tm.get_or_create("../..");
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn space_name_too_long() {
        let dir = test_data_dir("name_too_long");
        let tm = TenantManager::new(dir, 1000);

        let long_name = "x".repeat(MAX_TENANT_NAME_LEN + 1);
        let err = tm.get_or_create(&long_name).err().unwrap();
        assert!(err.to_string().contains("space name too long"));
    }

    #[tokio::test]
    async fn space_count_limit() {
        let dir = test_data_dir("count_limit");
        let tm = TenantManager::new(dir, 1000);

        for i in 0..MAX_TENANTS {
            tm.get_or_create(&format!("s{i}")).unwrap();
        }
        let err = tm.get_or_create("one_more").err().unwrap();
        assert!(err.to_string().contains("too many spaces"));
    }

    #[tokio::test]
    async fn engine_survives_reload() {
        let dir = test_data_dir("reload");
        {
            let tm = TenantManager::new(dir.clone(), 1000);
            let eng = tm.get_or_create("cabin").unwrap();
            eng.insert_reservation(stay(), None).await.unwrap();
        }
        let tm = TenantManager::new(dir, 1000);
        let eng = tm.get_or_create("cabin").unwrap();
        assert_eq!(eng.list_reservations(&ReservationFilter::default()).await.len(), 1);
    }
}
