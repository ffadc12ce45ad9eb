//! Orascope Core - shared abstractions for the Oracle schema-context server
//!
//! This crate provides the fundamental types that all other orascope crates
//! depend on. It defines:
//!
//! - `OrascopeError` - the error taxonomy with stable wire codes
//! - `StatementKind` - the statement-kind gate for SQL tool families
//! - Catalog record types (`TableRecord`, `PlsqlObject`, ...)
//! - `CatalogReader` - the typed catalog read interface between the
//!   connector and the schema cache

mod error;
mod ident;
mod introspect;
mod record;
mod statement;

pub use error::*;
pub use ident::*;
pub use introspect::*;
pub use record::*;
pub use statement::*;
