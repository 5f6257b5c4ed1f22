use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::limits::*;
use crate::model::{next_day, Category, DateRange};

/// A reservation request as it arrives from a caller. Every field is optional
/// so that missing input is reported by the validator, not by the decoder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub counterpart_name: Option<String>,
    pub counterpart_contact: Option<String>,
    pub category: Option<String>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidatedRequest {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub category: Category,
    pub counterpart_name: String,
    pub counterpart_contact: String,
    pub notes: Option<String>,
    pub nights: u32,
}

impl ValidatedRequest {
    pub fn is_same_day(&self) -> bool {
        self.start_date == self.end_date
    }

    /// The days this request would block once written.
    pub fn requested_range(&self) -> DateRange {
        DateRange::new(self.start_date, self.end_date.max(next_day(self.start_date)))
    }
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn check_len(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    if value.chars().count() > max {
        return Err(ValidationError::FieldTooLong { field, max });
    }
    Ok(())
}

/// Check a request against the structural booking rules, in order:
/// required fields, no past start date, same-day time slot rule, date order.
/// Pure: depends only on `input` and `today`.
pub fn validate_request(
    input: &BookingRequest,
    today: NaiveDate,
) -> Result<ValidatedRequest, ValidationError> {
    let name = present(&input.counterpart_name);
    let contact = present(&input.counterpart_contact);
    let category = present(&input.category);

    let mut missing = Vec::new();
    if input.start_date.is_none() {
        missing.push("start_date");
    }
    if input.end_date.is_none() {
        missing.push("end_date");
    }
    if name.is_none() {
        missing.push("counterpart_name");
    }
    if contact.is_none() {
        missing.push("counterpart_contact");
    }
    if category.is_none() {
        missing.push("category");
    }
    let (Some(start_date), Some(end_date), Some(name), Some(contact), Some(category)) =
        (input.start_date, input.end_date, name, contact, category)
    else {
        return Err(ValidationError::MissingFields(missing));
    };

    let category: Category = category
        .parse()
        .map_err(|()| ValidationError::UnknownCategory(category.to_string()))?;

    if start_date < today {
        return Err(ValidationError::PastDate { start: start_date, today });
    }

    if start_date == end_date {
        let (Some(start_time), Some(end_time)) = (input.start_time, input.end_time) else {
            return Err(ValidationError::SameDayRequiresTimes);
        };
        if start_time >= end_time {
            return Err(ValidationError::InvalidTimeRange);
        }
    } else if end_date < start_date {
        return Err(ValidationError::InvertedRange);
    }

    let days = (end_date - start_date).num_days();
    if days > MAX_STAY_NIGHTS {
        return Err(ValidationError::RangeTooLong { nights: days, max: MAX_STAY_NIGHTS });
    }
    // Same-day bookings still count as one night.
    let nights = days.max(1) as u32;

    check_len("counterpart_name", name, MAX_NAME_LEN)?;
    check_len("counterpart_contact", contact, MAX_CONTACT_LEN)?;
    let notes = present(&input.notes).map(str::to_string);
    if let Some(n) = &notes {
        check_len("notes", n, MAX_NOTES_LEN)?;
    }

    Ok(ValidatedRequest {
        start_date,
        end_date,
        start_time: input.start_time,
        end_time: input.end_time,
        category,
        counterpart_name: name.to_string(),
        counterpart_contact: contact.to_string(),
        notes,
        nights,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn t(s: &str) -> NaiveTime {
        s.parse().unwrap()
    }

    fn request(start: &str, end: &str, category: &str) -> BookingRequest {
        BookingRequest {
            start_date: Some(d(start)),
            end_date: Some(d(end)),
            counterpart_name: Some("Dana".into()),
            counterpart_contact: Some("dana@example.com".into()),
            category: Some(category.into()),
            ..Default::default()
        }
    }

    const TODAY: &str = "2025-08-01";

    #[test]
    fn accepts_one_night_personal_stay() {
        let v = validate_request(&request("2025-08-12", "2025-08-13", "owner-personal"), d(TODAY)).unwrap();
        assert_eq!(v.nights, 1);
        assert_eq!(v.category, Category::OwnerPersonal);
        assert_eq!(v.requested_range(), DateRange::new(d("2025-08-12"), d("2025-08-13")));
    }

    #[test]
    fn reports_every_missing_field() {
        let err = validate_request(&BookingRequest::default(), d(TODAY)).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingFields(vec![
                "start_date",
                "end_date",
                "counterpart_name",
                "counterpart_contact",
                "category"
            ])
        );
    }

    #[test]
    fn blank_strings_count_as_missing() {
        let mut req = request("2025-08-12", "2025-08-13", "paying-client");
        req.counterpart_name = Some("   ".into());
        let err = validate_request(&req, d(TODAY)).unwrap_err();
        assert_eq!(err, ValidationError::MissingFields(vec!["counterpart_name"]));
    }

    #[test]
    fn unknown_category() {
        let err = validate_request(&request("2025-08-12", "2025-08-13", "investor"), d(TODAY)).unwrap_err();
        assert_eq!(err, ValidationError::UnknownCategory("investor".into()));
    }

    #[test]
    fn past_start_date_rejected_for_every_category() {
        for cat in ["owner-personal", "referred-guest", "paying-client"] {
            let err = validate_request(&request("2025-07-31", "2025-08-02", cat), d(TODAY)).unwrap_err();
            assert!(matches!(err, ValidationError::PastDate { .. }), "{cat}: {err:?}");
        }
    }

    #[test]
    fn today_is_not_past() {
        assert!(validate_request(&request(TODAY, "2025-08-02", "paying-client"), d(TODAY)).is_ok());
    }

    #[test]
    fn same_day_without_times_rejected() {
        let err = validate_request(&request("2025-08-16", "2025-08-16", "referred-guest"), d(TODAY)).unwrap_err();
        assert_eq!(err, ValidationError::SameDayRequiresTimes);

        let mut req = request("2025-08-16", "2025-08-16", "referred-guest");
        req.start_time = Some(t("10:00"));
        let err = validate_request(&req, d(TODAY)).unwrap_err();
        assert_eq!(err, ValidationError::SameDayRequiresTimes);
    }

    #[test]
    fn same_day_with_times_is_one_night() {
        let mut req = request("2025-08-16", "2025-08-16", "referred-guest");
        req.start_time = Some(t("10:00"));
        req.end_time = Some(t("14:00"));
        let v = validate_request(&req, d(TODAY)).unwrap();
        assert!(v.is_same_day());
        assert_eq!(v.nights, 1);
        assert_eq!(v.requested_range(), DateRange::day(d("2025-08-16")));
    }

    #[test]
    fn same_day_times_must_be_ordered() {
        let mut req = request("2025-08-16", "2025-08-16", "paying-client");
        req.start_time = Some(t("14:00"));
        req.end_time = Some(t("14:00"));
        let err = validate_request(&req, d(TODAY)).unwrap_err();
        assert_eq!(err, ValidationError::InvalidTimeRange);
    }

    #[test]
    fn inverted_range_rejected() {
        let err = validate_request(&request("2025-08-10", "2025-08-08", "paying-client"), d(TODAY)).unwrap_err();
        assert_eq!(err, ValidationError::InvertedRange);
    }

    #[test]
    fn nights_counts_days_between() {
        let v = validate_request(&request("2025-08-01", "2025-08-05", "owner-personal"), d(TODAY)).unwrap();
        assert_eq!(v.nights, 4);
    }

    #[test]
    fn overlong_range_rejected() {
        let err = validate_request(&request("2025-08-01", "2027-08-01", "paying-client"), d(TODAY)).unwrap_err();
        assert!(matches!(err, ValidationError::RangeTooLong { .. }));
    }

    #[test]
    fn fields_are_trimmed_and_length_checked() {
        let mut req = request("2025-08-12", "2025-08-13", "paying-client");
        req.counterpart_name = Some("  Dana  ".into());
        req.notes = Some("   ".into());
        let v = validate_request(&req, d(TODAY)).unwrap();
        assert_eq!(v.counterpart_name, "Dana");
        assert_eq!(v.notes, None);

        req.notes = Some("x".repeat(MAX_NOTES_LEN + 1));
        let err = validate_request(&req, d(TODAY)).unwrap_err();
        assert_eq!(err, ValidationError::FieldTooLong { field: "notes", max: MAX_NOTES_LEN });
    }
}
