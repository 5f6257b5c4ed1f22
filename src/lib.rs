pub mod api;
pub mod clock;
pub mod compactor;
pub mod config;
pub mod engine;
pub mod error;
pub mod identity;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod policy;
pub mod service;
pub mod store;
pub mod tenant;
pub mod wal;
