use ulid::Ulid;

use crate::model::*;

use super::SpaceState;

/// Ids of active reservations whose occupied days overlap `range`.
/// Cancelled reservations never conflict.
pub(crate) fn conflicting_ids(state: &SpaceState, range: &DateRange) -> Vec<Ulid> {
    state
        .overlapping(range)
        .filter(|r| r.is_active())
        .map(|r| r.id)
        .collect()
}

pub(crate) fn check_no_conflict(state: &SpaceState, range: &DateRange) -> Result<(), super::StoreError> {
    let ids = conflicting_ids(state, range);
    if ids.is_empty() {
        Ok(())
    } else {
        Err(super::StoreError::Conflict(ids))
    }
}
