//! `stocktake-recon` — barcode scan vs. system inventory reconciliation engine.
//!
//! Pure engine crate: receives raw sheet rows, returns result rows and totals.
//! No CLI or file IO dependencies.

pub mod allocator;
pub mod barcode;
pub mod classify;
pub mod config;
pub mod duplicates;
pub mod engine;
pub mod error;
pub mod header;
pub mod index;
pub mod live;
pub mod model;
pub mod reference;
pub mod report;

pub use config::ReconConfig;
pub use engine::{run, run_on, ReconSession};
pub use error::{ReconError, ScanIssue, Severity};
pub use live::{Condition, LiveOutcome, LiveSession};
pub use model::{rows_from_csv, Cell, ReconInput, ReconReport, ResultRow};
pub use reference::ReferenceData;
