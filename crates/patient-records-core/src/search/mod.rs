//! Name normalization and matching used by the patient index.
//!
//! The same [`normalize`] runs on stored names and on query terms, so an
//! entry can never be missed because the two sides were canonicalized
//! differently.

mod normalizer;
mod suggest;

pub use normalizer::*;
pub use suggest::*;
