//!
//! URL pattern matching and the ordered route and filter tables built on it.
//!
mod pattern;
mod table;

pub use pattern::*;
pub use table::*;
