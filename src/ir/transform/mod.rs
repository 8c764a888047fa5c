//! In-place transformations of the IR.

pub mod conn_namer;
pub mod flatten;
pub mod prune;
