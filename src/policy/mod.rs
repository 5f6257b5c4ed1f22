//! Pure booking rules: request validation, pricing and quota accounting.
//! Nothing here touches the store.

mod pricing;
pub mod quota;
mod validate;

pub use pricing::{price_and_enforce, Quote};
pub use validate::{validate_request, BookingRequest, ValidatedRequest};
