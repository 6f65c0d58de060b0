//! Product store backends for the server.
//!
//! The in-memory store lives in `labelscout-core`; this module adds the
//! PostgreSQL backend used when `DATABASE_URL` is set.

pub mod postgres;

pub use postgres::PostgresProductStore;
