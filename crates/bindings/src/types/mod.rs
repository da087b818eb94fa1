//! Core types shared by every binding.
//!
//! - [`Identifier`] - backend-native record key
//! - [`Model`] / [`Record`] - the domain model contract and a map-backed model
//! - [`Criteria`] / [`FindOptions`] - what `find` filters and pages by
//! - [`Found`] - what `find` returns

mod criteria;
mod found;
mod identifier;
mod model;

pub use criteria::{Criteria, FindOptions, OrderBy, SortDirection};
pub use found::Found;
pub use identifier::Identifier;
pub use model::{FieldMap, Model, RECORD_IDENTIFIER_FIELD, Record};
