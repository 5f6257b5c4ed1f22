use ulid::Ulid;

use crate::model::*;

use super::availability::day_calendar;
use super::conflict::conflicting_ids;
use super::Engine;

impl Engine {
    pub async fn conflicts(&self, range: &DateRange) -> Vec<Ulid> {
        let guard = self.state.read().await;
        conflicting_ids(&guard, range)
    }

    pub async fn get_reservation(&self, id: &Ulid) -> Option<Reservation> {
        self.state.read().await.reservation(id).cloned()
    }

    /// Matching reservations ordered by start date.
    pub async fn list_reservations(&self, filter: &ReservationFilter) -> Vec<Reservation> {
        let guard = self.state.read().await;
        match &filter.window {
            Some(window) => guard
                .overlapping(window)
                .filter(|r| filter.matches(r))
                .cloned()
                .collect(),
            None => guard
                .reservations
                .iter()
                .filter(|r| filter.matches(r))
                .cloned()
                .collect(),
        }
    }

    pub async fn calendar(&self, window: &DateRange) -> Vec<DayAvailability> {
        let guard = self.state.read().await;
        let candidates: Vec<Reservation> = guard.overlapping(window).cloned().collect();
        day_calendar(&candidates, window)
    }

    pub async fn get_owner(&self, id: &Ulid) -> Option<Owner> {
        self.state.read().await.owners.get(id).cloned()
    }

    pub async fn find_owner_by_subject(&self, subject: &str) -> Option<Owner> {
        self.state.read().await.owner_by_subject(subject).cloned()
    }

    pub async fn find_owner_by_email(&self, email: &str) -> Option<Owner> {
        self.state.read().await.owner_by_email(email).cloned()
    }

    /// Every owner of the space, by name.
    pub async fn list_owners(&self) -> Vec<Owner> {
        let guard = self.state.read().await;
        let mut owners: Vec<Owner> = guard.owners.values().cloned().collect();
        owners.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        owners
    }

    /// Messages sent or received by `owner_id`, oldest first. With `with`,
    /// only the conversation between the two.
    pub async fn list_messages(&self, owner_id: Ulid, with: Option<Ulid>) -> Vec<Message> {
        let guard = self.state.read().await;
        guard
            .messages
            .iter()
            .filter(|m| match with {
                Some(other) => m.between(owner_id, other),
                None => m.involves(owner_id),
            })
            .cloned()
            .collect()
    }
}
