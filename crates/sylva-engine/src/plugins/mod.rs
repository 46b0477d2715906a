//! Built-in plugins.

pub(crate) mod analysis;
pub(crate) mod enrichment;
pub(crate) mod sources;
pub(crate) mod validation;
