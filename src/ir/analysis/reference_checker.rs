//! Reference checking for architecture descriptions.
//!
//! The external resolver records every reference it could not resolve on
//! the model instead of failing at the first one. This pass turns that
//! record into a single fatal diagnostic listing every offending node with
//! its file, line, symbol and node kind, so the user sees the full picture
//! in one compile.

use anyhow::Result;

use crate::ir::ast::Model;
use crate::ir::error::IrError;

/// Fail if the model still carries unresolved references.
///
/// All entries are reported together in one error, not just the first.
pub fn check_model(model: &Model) -> Result<()> {
    if model.unresolved.is_empty() {
        return Ok(());
    }
    Err(IrError::UnresolvedReferences(model.unresolved.clone()).into())
}
