//! Error taxonomy for the IR pipeline.
//!
//! Every stage-level failure is fatal to the current invocation: the
//! pipeline aborts on the first error and no output (including cache
//! entries) is written. Unresolved references are the one place failures
//! are collected and reported together.

use thiserror::Error;

use crate::ir::ast::UnresolvedRef;

#[derive(Debug, Error)]
pub enum IrError {
    #[error("no assembly found in input specification")]
    NoAssemblyFound,

    #[error("multiple assemblies found in input specification")]
    MultipleAssembliesFound,

    #[error("multiple declaration of interface {interface} in component {component}")]
    DuplicateExportedInterface { component: String, interface: String },

    #[error(
        "attribute {attribute} is not set but is referenced by nested component instance {instance}"
    )]
    UnresolvedAttributeReference { instance: String, attribute: String },

    #[error(
        "attribute type mismatch: attribute {referer} ({referer_ty}) refers to attribute {referent} ({referent_ty})"
    )]
    AttributeTypeMismatch {
        referer: String,
        referer_ty: String,
        referent: String,
        referent_ty: String,
    },

    #[error("cache integrity violation: item {item} must never be stored under a model-keyed entry")]
    CacheIntegrityViolation { item: String },

    #[error("exported interface {interface} was never rewired to a concrete instance")]
    UnresolvedExport { interface: String },

    #[error("unresolved references in input specification:\n {}", list_refs(.0))]
    UnresolvedReferences(Vec<UnresolvedRef>),
}

fn list_refs(refs: &[UnresolvedRef]) -> String {
    refs.iter()
        .map(|r| format!("{}:{}:'{}' of type {}", r.file, r.line, r.symbol, r.kind))
        .collect::<Vec<_>>()
        .join("\n ")
}
