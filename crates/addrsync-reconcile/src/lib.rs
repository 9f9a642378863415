//! addrsync-reconcile
//!
//! Address reconciliation engine.
//!
//! Given the billing and shipping address of one order, computes the field
//! writes that fill empty fields on one side from present values on the other.
//!
//! Rules:
//! - A non-empty target field is never overwritten
//! - Direction decides which side may be written
//! - Excluded (role, field) pairs are never written
//! - Fields outside the configured list are never touched
//!
//! Deterministic, pure logic. No IO. No storage calls.

mod completeness;
mod engine;
mod exclusion;
mod types;

pub use completeness::{is_address_complete, REQUIRED_FIELDS};
pub use engine::{apply, compute, needs_sync};
pub use exclusion::{ExclusionParseError, ExclusionSet};
pub use types::*;
