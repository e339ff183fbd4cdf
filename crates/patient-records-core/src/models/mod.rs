//! Domain models for the patient records system.

mod index;
mod patient;
mod validation;

pub use index::*;
pub use patient::*;
pub use validation::*;
