//! Backup snapshots and CSV export.

mod csv;
mod snapshot;

pub use csv::*;
pub use snapshot::*;
