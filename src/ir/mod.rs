//! Intermediate representation of an architecture description.
//!
//! The IR is the hand-off format between the external parser/resolver and
//! this tool: a forest of component type definitions plus exactly one
//! top-level assembly. The transform passes in this module rewrite the IR
//! in place until every instance is of primitive (non-composite) type.

pub mod analysis;
pub mod ast;
pub mod error;
pub mod transform;
