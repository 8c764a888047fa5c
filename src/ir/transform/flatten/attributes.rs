//! Cross-level attribute reference resolution.
//!
//! A setting inside a composite may assign an attribute of one of its
//! instances to a `Reference` naming an attribute of the enclosing
//! composite instance. When the composite's configuration is merged into
//! its parent, every such setting is resolved against the value the parent
//! configuration holds for the composite instance, with a type check when
//! both sides declare explicit attribute types.

use anyhow::Result;
use indexmap::IndexMap;

use crate::ir::ast::{ComponentType, Configuration, Instance, Setting, Value};
use crate::ir::error::IrError;

/// Resolve `setting` in place if its value is a cross-level reference.
///
/// `instance` is the composite instance being inlined, `parent_cfg` the
/// configuration of the level it is being inlined into, and
/// `nested_components` maps the (already renamed) names of the composite's
/// internal instances to their component types.
///
/// A reference that resolves to a value which is itself a `Reference` is
/// left for the next merge up the hierarchy, where the enclosing level
/// resolves it in turn; references never survive to the final model.
pub fn resolve_setting(
    setting: &mut Setting,
    instance: &Instance,
    instance_type: &ComponentType,
    parent_cfg: &Configuration,
    nested_components: &IndexMap<String, &ComponentType>,
) -> Result<()> {
    let symbol = match &setting.value {
        Value::Reference { symbol } => symbol.clone(),
        _ => return Ok(()),
    };

    let parent_value = parent_cfg.lookup(&instance.name, &symbol).cloned().ok_or(
        IrError::UnresolvedAttributeReference {
            instance: setting.instance.clone(),
            attribute: symbol.clone(),
        },
    )?;

    // Type-check referer against referent when both attribute declarations
    // carry explicit types.
    let referer = nested_components
        .get(setting.instance.as_str())
        .and_then(|ct| ct.attribute(&setting.attribute));
    let referent = instance_type.attribute(&symbol);
    if let (Some(referer), Some(referent)) = (referer, referent) {
        if let (Some(referer_ty), Some(referent_ty)) = (&referer.ty, &referent.ty) {
            if referer_ty != referent_ty {
                return Err(IrError::AttributeTypeMismatch {
                    referer: setting.attribute.clone(),
                    referer_ty: referer_ty.clone(),
                    referent: symbol,
                    referent_ty: referent_ty.clone(),
                }
                .into());
            }
        }
    }

    setting.value = parent_value;
    Ok(())
}
