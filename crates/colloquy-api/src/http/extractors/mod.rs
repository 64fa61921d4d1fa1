//! Request extractors.

pub mod identity;
pub mod query;
