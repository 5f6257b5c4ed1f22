pub const MAX_NAME_LEN: usize = 200;
pub const MAX_CONTACT_LEN: usize = 320;
pub const MAX_NOTES_LEN: usize = 4_000;
pub const MAX_EMAIL_LEN: usize = 320;
pub const MAX_PHONE_LEN: usize = 32;
pub const MAX_MESSAGE_LEN: usize = 4_000;

/// Longest stay any single request may ask for, regardless of category.
pub const MAX_STAY_NIGHTS: i64 = 366;

pub const MAX_RESERVATIONS_PER_SPACE: usize = 100_000;
pub const MAX_OWNERS_PER_SPACE: usize = 10_000;
pub const MAX_MESSAGES_PER_SPACE: usize = 100_000;

pub const MAX_TENANTS: usize = 1_000;
pub const MAX_TENANT_NAME_LEN: usize = 128;
