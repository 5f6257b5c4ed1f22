use crate::model::*;

// ── Availability ──────────────────────────────────────────────────

/// One entry per day of `window`: free or not, and who holds it.
pub fn day_calendar(reservations: &[Reservation], window: &DateRange) -> Vec<DayAvailability> {
    let active: Vec<&Reservation> = reservations
        .iter()
        .filter(|r| r.is_active() && r.occupied().overlaps(window))
        .collect();

    window
        .start
        .iter_days()
        .take_while(|d| *d < window.end)
        .map(|date| {
            let reservation_ids: Vec<_> = active
                .iter()
                .filter(|r| r.occupied().contains_date(date))
                .map(|r| r.id)
                .collect();
            DayAvailability {
                date,
                available: reservation_ids.is_empty(),
                reservation_ids,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use ulid::Ulid;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn r(start: &str, end: &str) -> DateRange {
        DateRange::new(d(start), d(end))
    }

    fn reservation(start: &str, end: &str, status: Status) -> Reservation {
        let now = Utc::now();
        Reservation {
            id: Ulid::new(),
            owner_id: None,
            start_date: d(start),
            end_date: d(end),
            start_time: None,
            end_time: None,
            category: Category::PayingClient,
            counterpart_name: "Guest".into(),
            counterpart_contact: "guest@example.com".into(),
            amount: 0,
            nights: 1,
            status,
            notes: None,
            quota_nights: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn calendar_ignores_cancelled() {
        let reservations = vec![
            reservation("2025-08-02", "2025-08-04", Status::Confirmed),
            reservation("2025-08-05", "2025-08-07", Status::Cancelled),
            reservation("2025-08-08", "2025-08-08", Status::Pending),
        ];
        let cal = day_calendar(&reservations, &r("2025-08-01", "2025-08-10"));
        let busy: Vec<NaiveDate> = cal.iter().filter(|c| !c.available).map(|c| c.date).collect();
        assert_eq!(busy, vec![d("2025-08-02"), d("2025-08-03"), d("2025-08-08")]);
    }

    #[test]
    fn calendar_marks_each_day() {
        let stay = reservation("2025-08-02", "2025-08-04", Status::Confirmed);
        let stay_id = stay.id;
        let reservations = vec![stay];
        let cal = day_calendar(&reservations, &r("2025-08-01", "2025-08-05"));
        assert_eq!(cal.len(), 4);
        assert!(cal[0].available);
        assert_eq!(cal[1].reservation_ids, vec![stay_id]);
        assert!(!cal[2].available);
        // Checkout day is free.
        assert!(cal[3].available);
        assert_eq!(cal[3].date, d("2025-08-04"));
    }

    #[test]
    fn calendar_same_day_booking_blocks_its_day() {
        let reservations = vec![reservation("2025-08-30", "2025-08-30", Status::Confirmed)];
        let cal = day_calendar(&reservations, &r("2025-08-29", "2025-09-01"));
        let avail: Vec<bool> = cal.iter().map(|c| c.available).collect();
        assert_eq!(avail, vec![true, false, true]);
    }
}
