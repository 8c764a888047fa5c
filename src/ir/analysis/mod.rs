//! Analysis passes over the IR.

pub mod reference_checker;
