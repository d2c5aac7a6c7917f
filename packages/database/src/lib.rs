#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! `DuckDB` defect store and report reconciliation for the pothole map.
//!
//! [`store::DefectStore`] owns a small pool of connections to one `DuckDB`
//! database. [`candidates`] runs the bounding-box pre-filter,
//! [`reconcile`] attaches each incoming report to an existing canonical
//! defect or creates one inside a single transaction, and [`defects`]
//! serves reads and moderation patches.

pub mod candidates;
pub mod defects;
pub mod paths;
pub mod reconcile;
pub mod reporters;
pub mod store;
mod time;

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// `DuckDB` query error.
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    /// Filesystem error while preparing the database directory.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },

    /// A defect chosen as a match disappeared before it could be updated.
    #[error("Defect {defect_id} vanished during reconciliation")]
    StaleCandidate {
        /// The defect that was expected to exist.
        defect_id: String,
    },

    /// A pooled connection's mutex was poisoned by a panicking holder.
    #[error("Connection pool mutex poisoned")]
    PoolPoisoned,
}
