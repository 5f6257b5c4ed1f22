use serde::Serialize;

use crate::config::PricingConfig;
use crate::error::PolicyError;
use crate::model::Category;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Quote {
    pub amount: u64,
    pub nights: u32,
}

/// Price a stay and apply the category's own limits.
///
/// Owner-personal stays are free but capped at `max_personal_nights`;
/// the other categories are billed per night at their configured rate.
pub fn price_and_enforce(
    category: Category,
    nights: u32,
    pricing: &PricingConfig,
) -> Result<Quote, PolicyError> {
    let rate = match category {
        Category::OwnerPersonal => {
            if nights > pricing.max_personal_nights {
                return Err(PolicyError::StayTooLong {
                    requested: nights,
                    max: pricing.max_personal_nights,
                });
            }
            0
        }
        Category::ReferredGuest => pricing.rate_friend,
        Category::PayingClient => pricing.rate_guest,
    };
    let amount = rate
        .checked_mul(u64::from(nights))
        .ok_or(PolicyError::AmountOverflow)?;
    Ok(Quote { amount, nights })
}
