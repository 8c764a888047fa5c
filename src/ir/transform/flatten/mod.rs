//! Hierarchical assembly resolution.
//!
//! This module flattens a hierarchical architecture description into a
//! single-level assembly of primitive component instances. A composite
//! component type carries an internal assembly of its own; every instance
//! of such a type is eliminated by inlining a deep copy of that assembly
//! into the enclosing level. The process involves:
//!
//! - Recursing into each copy first, so nesting of arbitrary depth is
//!   collapsed bottom-up.
//! - Prefixing every instance, address space, connection and group name in
//!   the copy with the instance's own name, so separate instantiations of
//!   one composite type never collide.
//! - Resolving cross-level attribute references against the parent
//!   configuration as each level's settings are merged upward.
//! - Rewiring parent connections that target an exported interface of the
//!   composite to the concrete internal endpoint that implements it.
//!
//! # Submodules
//! - `attributes`: cross-level attribute reference resolution
//!
//! # Dependencies
//! - `anyhow::Result`: for error handling.
//! - `indexmap::IndexMap`: to keep merge order deterministic.

mod attributes;

pub use attributes::resolve_setting;

use anyhow::{bail, Result};
use indexmap::{IndexMap, IndexSet};
use log::debug;

use crate::ir::analysis::reference_checker::check_model;
use crate::ir::ast::{
    ComponentType, Composition, Configuration, Connection, Endpoint, Instance, Model,
};
use crate::ir::error::IrError;
use crate::ir::transform::prune::prune_empty_components;

/// Flatten the model in place until every remaining instance is of
/// primitive type.
///
/// The model must contain exactly one assembly and no unresolved
/// references. On success the assembly's instances all refer to component
/// types without an internal assembly, no connection endpoint is an export
/// boundary, and inert component types (no interfaces, no control role)
/// have been pruned together with their instances.
pub fn flatten(model: &mut Model) -> Result<()> {
    check_model(model)?;
    model.assembly()?;

    let mut assembly = model.assemblies.swap_remove(0);
    resolve_hierarchy(
        &mut assembly.composition,
        &mut assembly.configuration,
        &model.components,
    )?;
    check_fully_rewired(&assembly.composition)?;
    model.assemblies.push(assembly);

    strip_exported_interfaces(&mut model.components);
    check_instances_primitive(model)?;
    prune_empty_components(model)?;
    Ok(())
}

/// Recursively eliminate composite instances from one assembly level.
///
/// Instances spliced in by a merge land at the end of the instance list
/// already fully resolved, so a single in-order sweep suffices.
fn resolve_hierarchy(
    composition: &mut Composition,
    configuration: &mut Configuration,
    components: &IndexMap<String, ComponentType>,
) -> Result<()> {
    let mut idx = 0;
    while idx < composition.instances.len() {
        let instance = composition.instances[idx].clone();
        let Some(component_type) = components.get(&instance.component) else {
            bail!(
                "instance '{}' refers to unknown component type '{}'",
                instance.name,
                instance.component
            );
        };
        if !component_type.has_internal_assembly() {
            idx += 1;
            continue;
        }

        debug!(
            "inlining composite instance '{}' of type '{}'",
            instance.name, component_type.name
        );

        // Deep-clone the internal assembly; the component type's own copy
        // must stay untouched for future instantiation sites.
        let mut inner = component_type.composition.clone().unwrap_or_default();
        let mut inner_cfg = component_type.configuration.clone().unwrap_or_default();

        resolve_hierarchy(&mut inner, &mut inner_cfg, components)?;
        prefix_children(&instance.name, &mut inner, &mut inner_cfg);
        merge_assembly(
            composition,
            configuration,
            inner,
            inner_cfg,
            &instance,
            component_type,
            components,
        )?;

        // The composite instance itself never survives flattening.
        composition.instances.remove(idx);
    }
    Ok(())
}

/// Prepend `prefix` to every name in one inlined assembly level: instance
/// names, address-space labels, connection names and endpoints, group
/// names and setting instance names. Prefixes compose transitively across
/// nesting levels.
fn prefix_children(prefix: &str, composition: &mut Composition, configuration: &mut Configuration) {
    for i in &mut composition.instances {
        i.name = format!("{}_{}", prefix, i.name);
        i.address_space = format!("{}_{}", prefix, i.address_space);
    }
    for c in &mut composition.connections {
        c.name = format!("{}_{}", prefix, c.name);
        prefix_endpoint(prefix, &mut c.from);
        prefix_endpoint(prefix, &mut c.to);
    }
    for g in &mut composition.groups {
        g.name = format!("{}_{}", prefix, g.name);
    }
    for s in &mut configuration.settings {
        s.instance = format!("{}_{}", prefix, s.instance);
    }
}

fn prefix_endpoint(prefix: &str, endpoint: &mut Endpoint) {
    if let Endpoint::Concrete { instance, .. } = endpoint {
        *instance = format!("{}_{}", prefix, instance);
    }
}

/// Splice a resolved, renamed internal assembly into its parent level.
///
/// `instance` is the composite instance in `dest` whose type's assembly
/// `src` is; every connection in `dest` that reaches `instance` through an
/// exported interface is rewired to the concrete internal endpoint that
/// implements the export.
fn merge_assembly(
    dest: &mut Composition,
    dest_cfg: &mut Configuration,
    src: Composition,
    src_cfg: Configuration,
    instance: &Instance,
    instance_type: &ComponentType,
    components: &IndexMap<String, ComponentType>,
) -> Result<()> {
    // Exported-interface map, built (and checked for duplicate exports)
    // before anything is merged.
    let mut exports: IndexMap<String, Endpoint> = IndexMap::new();
    let mut internal: Vec<Connection> = Vec::new();
    for c in src.connections {
        let mut exported = false;
        if c.from.is_exported() {
            register_export(&mut exports, &instance_type.name, &c.from, &c.to)?;
            exported = true;
        }
        if c.to.is_exported() {
            register_export(&mut exports, &instance_type.name, &c.to, &c.from)?;
            exported = true;
        }
        if !exported {
            internal.push(c);
        }
    }

    // Rewire parent connections that touch the composite instance through
    // an exported interface. Several parent connections may fan out
    // through one export; each adopts the same concrete endpoint.
    for c in &mut dest.connections {
        let from_interface = c.from.touches(&instance.name).map(str::to_string);
        if let Some(interface) = from_interface {
            if let Some(endpoint) = exports.get(&interface) {
                c.from = endpoint.clone();
            }
        }
        let to_interface = c.to.touches(&instance.name).map(str::to_string);
        if let Some(interface) = to_interface {
            if let Some(endpoint) = exports.get(&interface) {
                c.to = endpoint.clone();
            }
        }
    }

    // Resolve cross-level attribute references against the parent
    // configuration, then merge the settings upward.
    let nested_components: IndexMap<String, &ComponentType> = src
        .instances
        .iter()
        .filter_map(|i| components.get(&i.component).map(|ct| (i.name.clone(), ct)))
        .collect();
    for mut s in src_cfg.settings {
        attributes::resolve_setting(&mut s, instance, instance_type, dest_cfg, &nested_components)?;
        dest_cfg.settings.push(s);
    }

    dest.instances.extend(src.instances);
    dest.groups.extend(src.groups);
    dest.connections.extend(internal);
    Ok(())
}

fn register_export(
    exports: &mut IndexMap<String, Endpoint>,
    component: &str,
    exported: &Endpoint,
    concrete: &Endpoint,
) -> Result<()> {
    let interface = exported.interface();
    if exports.contains_key(interface) {
        return Err(IrError::DuplicateExportedInterface {
            component: component.to_string(),
            interface: interface.to_string(),
        }
        .into());
    }
    exports.insert(interface.to_string(), concrete.clone());
    Ok(())
}

/// Remove exported interfaces from composite component type definitions.
/// Those interfaces are implemented by sub-instances, so no code may be
/// generated for them against the composite itself.
fn strip_exported_interfaces(components: &mut IndexMap<String, ComponentType>) {
    for component_type in components.values_mut() {
        let exported: IndexSet<String> = match &component_type.composition {
            Some(composition) => composition
                .connections
                .iter()
                .flat_map(|c| [&c.from, &c.to])
                .filter_map(|e| match e {
                    Endpoint::Exported { interface } => Some(interface.clone()),
                    Endpoint::Concrete { .. } => None,
                })
                .collect(),
            None => continue,
        };
        if exported.is_empty() {
            continue;
        }
        let name = component_type.name.clone();
        component_type.interfaces.retain(|i| {
            if exported.contains(&i.name) {
                debug!(
                    "stripping exported {} interface '{}' from component '{}'",
                    i.kind, i.name, name
                );
                false
            } else {
                true
            }
        });
    }
}

/// Every export boundary must have been rewired to a concrete endpoint by
/// the time its enclosing level finished flattening.
fn check_fully_rewired(composition: &Composition) -> Result<()> {
    for c in &composition.connections {
        for endpoint in [&c.from, &c.to] {
            if let Endpoint::Exported { interface } = endpoint {
                return Err(IrError::UnresolvedExport {
                    interface: interface.clone(),
                }
                .into());
            }
        }
    }
    Ok(())
}

/// Post-condition of `flatten`: no instance may be of a type that still
/// carries a non-empty internal assembly.
fn check_instances_primitive(model: &Model) -> Result<()> {
    let assembly = model.assembly()?;
    for i in &assembly.composition.instances {
        if let Some(component_type) = model.components.get(&i.component) {
            if component_type.has_internal_assembly() {
                bail!(
                    "instance '{}' still refers to composite component type '{}' after flattening",
                    i.name,
                    i.component
                );
            }
        }
    }
    Ok(())
}
