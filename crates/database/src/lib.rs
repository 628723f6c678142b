//! # Snapshot Store Crate
//!
//! This crate is the system's window onto the time-series store that holds the
//! periodic leaderboard captures. It only ever reads.
//!
//! ## Architectural Principles
//!
//! - **Adapter:** All SQL lives here. The rest of the workspace talks to the
//!   store exclusively through the [`SnapshotStore`] trait.
//! - **Asynchronous & Pooled:** The PostgreSQL implementation uses a `PgPool`
//!   so any number of requests can read concurrently.
//! - **Swappable:** [`InMemorySnapshotStore`] implements the same trait for tests
//!   and offline runs.
//!
//! ## Public API
//!
//! - `connect`: establishes the database connection pool.
//! - `run_migrations`: applies the schema under `./migrations`.
//! - `SnapshotStore`: the read contract consumed by the engine.
//! - `DbRepository`: the PostgreSQL implementation.
//! - `InMemorySnapshotStore`: the in-memory implementation.
//! - `DbError`: the specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod connection;
pub mod error;
pub mod memory;
pub mod repository;
pub mod store;

// Re-export the key components to create a clean, public-facing API.
pub use connection::{connect, run_migrations};
pub use error::DbError;
pub use memory::{CapturedCounts, InMemorySnapshotStore};
pub use repository::DbRepository;
pub use store::SnapshotStore;
