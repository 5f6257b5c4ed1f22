use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Days, NaiveDate};

use callabo::clock::FixedClock;
use callabo::config::PolicyConfig;
use callabo::error::BookingError;
use callabo::identity::{StaticIdentity, Subject};
use callabo::model::{DateRange, ReservationFilter};
use callabo::notify::LogDispatcher;
use callabo::policy::BookingRequest;
use callabo::service::BookingService;
use callabo::tenant::TenantManager;

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 1, 1).unwrap()
}

fn day(offset: u64) -> NaiveDate {
    base_date().checked_add_days(Days::new(offset)).unwrap()
}

fn request(start: NaiveDate, nights: u64) -> BookingRequest {
    BookingRequest {
        start_date: Some(start),
        end_date: Some(start.checked_add_days(Days::new(nights)).unwrap()),
        counterpart_name: Some("Bench Guest".into()),
        counterpart_contact: Some("bench@example.com".into()),
        category: Some("paying-client".into()),
        ..Default::default()
    }
}

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    if latencies.is_empty() {
        println!("  {label}: no samples");
        return;
    }
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.2}ms, p50={:.2}ms, p95={:.2}ms, p99={:.2}ms, max={:.2}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies.last().unwrap().as_secs_f64() * 1000.0,
    );
}

fn service(tenants: &TenantManager, space: &str) -> Arc<BookingService> {
    let engine = tenants.get_or_create(space).expect("space");
    Arc::new(BookingService::new(
        engine,
        Arc::new(LogDispatcher),
        Arc::new(FixedClock(NaiveDate::from_ymd_opt(2029, 12, 1).unwrap())),
        PolicyConfig::default(),
    ))
}

fn guest() -> StaticIdentity {
    StaticIdentity::subject(Subject::new("bench").with_email("bench@example.com"))
}

async fn phase1_sequential(svc: &BookingService) {
    let n = 2000;
    let mut latencies = Vec::with_capacity(n);
    let start = Instant::now();
    for i in 0..n as u64 {
        let t = Instant::now();
        svc.create_booking(&guest(), &request(day(i), 1)).await.unwrap();
        latencies.push(t.elapsed());
    }
    let elapsed = start.elapsed();
    println!(
        "  {n} bookings in {:.2}s = {:.0} ops/sec",
        elapsed.as_secs_f64(),
        n as f64 / elapsed.as_secs_f64()
    );
    print_latency("create_booking", &mut latencies);
}

async fn phase2_concurrent_disjoint(svc: Arc<BookingService>) {
    let n_tasks = 10u64;
    let n_per_task = 200u64;

    let start = Instant::now();
    let mut handles = Vec::new();
    for t in 0..n_tasks {
        let svc = svc.clone();
        handles.push(tokio::spawn(async move {
            for j in 0..n_per_task {
                let offset = t * n_per_task + j;
                svc.create_booking(&guest(), &request(day(offset), 1)).await.unwrap();
            }
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    let elapsed = start.elapsed();
    let total = n_tasks * n_per_task;
    let ops = total as f64 / elapsed.as_secs_f64();
    println!(
        "  {n_tasks} tasks x {n_per_task} bookings = {total} total in {:.2}s = {ops:.0} ops/sec",
        elapsed.as_secs_f64()
    );
}

async fn phase3_contended(svc: Arc<BookingService>) {
    let n_slots = 100u64;
    let n_contenders = 8;

    let start = Instant::now();
    let mut handles = Vec::new();
    for slot in 0..n_slots {
        for _ in 0..n_contenders {
            let svc = svc.clone();
            handles.push(tokio::spawn(async move {
                svc.create_booking(&guest(), &request(day(slot * 3), 2)).await
            }));
        }
    }

    let mut won = 0;
    let mut lost = 0;
    for h in handles {
        match h.await.unwrap() {
            Ok(_) => won += 1,
            Err(BookingError::Conflict(_)) => lost += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    println!(
        "  {n_slots} slots x {n_contenders} contenders in {:.2}s: {won} won, {lost} conflicts",
        start.elapsed().as_secs_f64()
    );
    assert_eq!(won, n_slots, "every slot must be booked exactly once");
}

async fn phase4_read_under_load(svc: Arc<BookingService>) {
    let writer_svc = svc.clone();
    let writer = tokio::spawn(async move {
        for i in 0..1000u64 {
            let _ = writer_svc.create_booking(&guest(), &request(day(5000 + i), 1)).await;
        }
    });

    let mut calendar = Vec::new();
    let mut listing = Vec::new();
    let window = DateRange::new(day(5000), day(5100));
    let filter = ReservationFilter { window: Some(window), ..Default::default() };
    while !writer.is_finished() {
        let t = Instant::now();
        svc.month_availability(2043, 9).await.unwrap();
        calendar.push(t.elapsed());

        let t = Instant::now();
        svc.list_bookings(&filter).await.unwrap();
        listing.push(t.elapsed());
    }
    writer.await.unwrap();

    print_latency("month_availability", &mut calendar);
    print_latency("list_bookings (100-day window)", &mut listing);
}

#[tokio::main]
async fn main() {
    let data_dir: PathBuf = std::env::temp_dir().join(format!("callabo_bench_{}", ulid::Ulid::new()));
    std::fs::create_dir_all(&data_dir).unwrap();
    let tenants = TenantManager::new(data_dir.clone(), 100_000);

    println!("=== callabo stress benchmark ===");
    println!("data_dir: {}\n", data_dir.display());

    // Each phase uses its own space to avoid interference

    println!("[phase 1] sequential booking throughput");
    phase1_sequential(&service(&tenants, "seq")).await;

    println!("\n[phase 2] concurrent booking throughput, disjoint days");
    phase2_concurrent_disjoint(service(&tenants, "disjoint")).await;

    println!("\n[phase 3] contended slots");
    phase3_contended(service(&tenants, "contended")).await;

    println!("\n[phase 4] read latency under write load");
    phase4_read_under_load(service(&tenants, "reads")).await;

    let _ = std::fs::remove_dir_all(&data_dir);
    println!("\n=== benchmark complete ===");
}
