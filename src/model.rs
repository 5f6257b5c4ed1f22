use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Days, Months, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Half-open date interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        debug_assert!(start <= end, "DateRange start must not be after end");
        Self { start, end }
    }

    /// The range covering exactly one calendar day.
    pub fn day(date: NaiveDate) -> Self {
        Self::new(date, next_day(date))
    }

    /// Every day of a calendar month. `None` for an invalid month.
    pub fn month(year: i32, month: u32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)?;
        let end = start.checked_add_months(Months::new(1))?;
        Some(Self::new(start, end))
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_date(&self, d: NaiveDate) -> bool {
        self.start <= d && d < self.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

pub(crate) fn next_day(d: NaiveDate) -> NaiveDate {
    d.checked_add_days(Days::new(1)).unwrap_or(NaiveDate::MAX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    /// Free stay for a co-owner's own use.
    OwnerPersonal,
    /// Discounted stay for a guest an owner referred.
    ReferredGuest,
    /// Full-rate commercial stay.
    PayingClient,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::OwnerPersonal => "owner-personal",
            Category::ReferredGuest => "referred-guest",
            Category::PayingClient => "paying-client",
        }
    }

    /// Human label used in outgoing notifications.
    pub fn label(&self) -> &'static str {
        match self {
            Category::OwnerPersonal => "Personal Use",
            Category::ReferredGuest => "Friends & Family",
            Category::PayingClient => "Paying Client",
        }
    }
}

impl FromStr for Category {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner-personal" => Ok(Category::OwnerPersonal),
            "referred-guest" => Ok(Category::ReferredGuest),
            "paying-client" => Ok(Category::PayingClient),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Confirmed,
    Cancelled,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Confirmed => "confirmed",
            Status::Cancelled => "cancelled",
        }
    }

    /// `pending → confirmed`, `pending → cancelled`, `confirmed → cancelled`.
    pub fn can_transition_to(&self, next: Status) -> bool {
        matches!(
            (self, next),
            (Status::Pending, Status::Confirmed)
                | (Status::Pending, Status::Cancelled)
                | (Status::Confirmed, Status::Cancelled)
        )
    }
}

impl FromStr for Status {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Status::Pending),
            "confirmed" => Ok(Status::Confirmed),
            "cancelled" => Ok(Status::Cancelled),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Ulid,
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
    /// Nights charged against the owner's quota when this was written.
    pub quota_nights: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    /// Days this reservation blocks. A same-day booking still holds its day.
    pub fn occupied(&self) -> DateRange {
        let end = self.end_date.max(next_day(self.start_date));
        DateRange::new(self.start_date, end)
    }

    pub fn is_active(&self) -> bool {
        self.status != Status::Cancelled
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub id: Ulid,
    /// Subject id issued by the identity provider.
    pub subject: Option<String>,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub nights_used: u32,
    pub quota_period_start: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What other members see of an owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Member {
    pub id: Ulid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

impl From<&Owner> for Member {
    fn from(owner: &Owner) -> Self {
        Self {
            id: owner.id,
            name: owner.name.clone(),
            email: owner.email.clone(),
            phone: owner.phone.clone(),
        }
    }
}

/// A direct message between two owners of a space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Ulid,
    pub from_owner: Ulid,
    pub to_owner: Ulid,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn involves(&self, owner_id: Ulid) -> bool {
        self.from_owner == owner_id || self.to_owner == owner_id
    }

    /// Whether this message belongs to the conversation between `a` and `b`.
    pub fn between(&self, a: Ulid, b: Ulid) -> bool {
        (self.from_owner == a && self.to_owner == b) || (self.from_owner == b && self.to_owner == a)
    }
}

/// The event types, flat with no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    ReservationCreated {
        reservation: Reservation,
    },
    ReservationStatusChanged {
        id: Ulid,
        status: Status,
        at: DateTime<Utc>,
    },
    OwnerCreated {
        owner: Owner,
    },
    OwnerUpdated {
        owner: Owner,
    },
    QuotaCharged {
        owner_id: Ulid,
        nights: u32,
    },
    QuotaRefunded {
        owner_id: Ulid,
        nights: u32,
    },
    QuotaReset {
        owner_id: Ulid,
        period_start: NaiveDate,
        at: DateTime<Utc>,
    },
    MessageSent {
        message: Message,
    },
    MessageRead {
        id: Ulid,
        at: DateTime<Utc>,
    },
}

// ── Query types ──────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationFilter {
    pub owner_id: Option<Ulid>,
    pub status: Option<Status>,
    /// Only reservations whose occupied range overlaps this window.
    pub window: Option<DateRange>,
}

impl ReservationFilter {
    pub fn matches(&self, r: &Reservation) -> bool {
        if let Some(owner) = self.owner_id
            && r.owner_id != Some(owner) {
                return false;
            }
        if let Some(status) = self.status
            && r.status != status {
                return false;
            }
        if let Some(window) = &self.window
            && !r.occupied().overlaps(window) {
                return false;
            }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayAvailability {
    pub date: NaiveDate,
    pub available: bool,
    pub reservation_ids: Vec<Ulid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaSummary {
    pub nights_used: u32,
    pub nights_remaining: u32,
    pub period_start: NaiveDate,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
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
            amount: 100,
            nights: 1,
            status,
            notes: None,
            quota_nights: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn range_overlap_is_half_open() {
        let a = DateRange::new(d("2025-08-01"), d("2025-08-05"));
        let b = DateRange::new(d("2025-08-04"), d("2025-08-06"));
        let c = DateRange::new(d("2025-08-05"), d("2025-08-07"));
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c)); // checkout day is free for the next check-in
        assert_eq!(a.days(), 4);
    }

    #[test]
    fn same_day_reservation_occupies_its_day() {
        let r = reservation("2025-08-30", "2025-08-30", Status::Confirmed);
        assert_eq!(r.occupied(), DateRange::day(d("2025-08-30")));
        let request = DateRange::new(d("2025-08-30"), d("2025-08-31"));
        assert!(r.occupied().overlaps(&request));
    }

    #[test]
    fn multi_day_occupied_is_stored_range() {
        let r = reservation("2025-08-01", "2025-08-03", Status::Confirmed);
        assert_eq!(r.occupied(), DateRange::new(d("2025-08-01"), d("2025-08-03")));
        assert!(!r.occupied().contains_date(d("2025-08-03")));
    }

    #[test]
    fn month_range() {
        let feb = DateRange::month(2024, 2).unwrap();
        assert_eq!(feb, DateRange::new(d("2024-02-01"), d("2024-03-01")));
        assert_eq!(feb.days(), 29);
        assert_eq!(DateRange::month(2025, 12).unwrap().end, d("2026-01-01"));
        assert!(DateRange::month(2025, 13).is_none());
        assert!(DateRange::month(2025, 0).is_none());
    }

    #[test]
    fn status_transitions() {
        assert!(Status::Pending.can_transition_to(Status::Confirmed));
        assert!(Status::Pending.can_transition_to(Status::Cancelled));
        assert!(Status::Confirmed.can_transition_to(Status::Cancelled));
        assert!(!Status::Confirmed.can_transition_to(Status::Pending));
        assert!(!Status::Cancelled.can_transition_to(Status::Confirmed));
        assert!(!Status::Cancelled.can_transition_to(Status::Pending));
        assert!(!Status::Confirmed.can_transition_to(Status::Confirmed));
    }

    #[test]
    fn category_parse_and_labels() {
        assert_eq!("owner-personal".parse::<Category>(), Ok(Category::OwnerPersonal));
        assert_eq!("referred-guest".parse::<Category>(), Ok(Category::ReferredGuest));
        assert_eq!("paying-client".parse::<Category>(), Ok(Category::PayingClient));
        assert!("investor".parse::<Category>().is_err());
        assert_eq!(Category::ReferredGuest.label(), "Friends & Family");
    }

    #[test]
    fn category_serde_uses_kebab_case() {
        let json = serde_json::to_string(&Category::OwnerPersonal).unwrap();
        assert_eq!(json, "\"owner-personal\"");
    }

    #[test]
    fn filter_matches() {
        let mut r = reservation("2025-08-10", "2025-08-12", Status::Confirmed);
        let owner = Ulid::new();
        r.owner_id = Some(owner);

        assert!(ReservationFilter::default().matches(&r));
        assert!(ReservationFilter { owner_id: Some(owner), ..Default::default() }.matches(&r));
        assert!(!ReservationFilter { owner_id: Some(Ulid::new()), ..Default::default() }.matches(&r));
        assert!(!ReservationFilter { status: Some(Status::Pending), ..Default::default() }.matches(&r));

        let window = DateRange::new(d("2025-08-12"), d("2025-08-20"));
        assert!(!ReservationFilter { window: Some(window), ..Default::default() }.matches(&r));
        let window = DateRange::new(d("2025-08-11"), d("2025-08-20"));
        assert!(ReservationFilter { window: Some(window), ..Default::default() }.matches(&r));
    }

    #[test]
    fn message_conversation_membership() {
        let (a, b, c) = (Ulid::new(), Ulid::new(), Ulid::new());
        let m = Message {
            id: Ulid::new(),
            from_owner: a,
            to_owner: b,
            body: "hi".into(),
            created_at: Utc::now(),
            read_at: None,
        };
        assert!(m.involves(a) && m.involves(b) && !m.involves(c));
        assert!(m.between(b, a));
        assert!(!m.between(a, c));
    }

    #[test]
    fn event_serialization_roundtrip() {
        let event = Event::ReservationCreated {
            reservation: reservation("2025-08-10", "2025-08-12", Status::Pending),
        };
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: Event = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
    }
}
