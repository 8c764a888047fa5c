//! Removal of inert component types after flattening.
//!
//! Export rewiring can leave a component type with no interfaces at all,
//! typically a composite that existed only to re-export interfaces of its
//! sub-instances. Such types generate no code and allocate no resources,
//! so they are dropped from the model along with every instance of them.

use anyhow::Result;
use indexmap::IndexSet;
use log::debug;

use crate::ir::ast::Model;

/// Remove every prunable component type, then every instance of a pruned
/// type. A type is prunable iff its control flag is unset and it declares
/// no interfaces. Instance removal is keyed by membership in the just
/// computed prunable set, so types must go first.
pub fn prune_empty_components(model: &mut Model) -> Result<()> {
    let prunable: IndexSet<String> = model
        .components
        .values()
        .filter(|ct| !ct.control && ct.interfaces.is_empty())
        .map(|ct| ct.name.clone())
        .collect();
    if prunable.is_empty() {
        return Ok(());
    }
    debug!("pruning {} inert component type(s)", prunable.len());

    model.components.retain(|name, _| !prunable.contains(name));

    let assembly = model.assembly_mut()?;
    assembly
        .composition
        .instances
        .retain(|i| !prunable.contains(&i.component));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ast::{
        Assembly, ComponentType, Composition, Instance, InterfaceDecl, InterfaceKind,
    };

    fn component(name: &str, control: bool, interfaces: Vec<InterfaceDecl>) -> ComponentType {
        ComponentType {
            name: name.to_string(),
            control,
            hardware: false,
            interfaces,
            attributes: vec![],
            composition: None,
            configuration: None,
        }
    }

    fn instance(name: &str, component: &str) -> Instance {
        Instance {
            name: name.to_string(),
            component: component.to_string(),
            address_space: name.to_string(),
        }
    }

    fn model_with(components: Vec<ComponentType>, instances: Vec<Instance>) -> Model {
        let mut model = Model::default();
        for ct in components {
            model.components.insert(ct.name.clone(), ct);
        }
        model.assemblies.push(Assembly {
            composition: Composition {
                instances,
                connections: vec![],
                groups: vec![],
            },
            configuration: Default::default(),
        });
        model
    }

    #[test]
    fn test_interface_less_type_and_instance_removed() {
        let mut model = model_with(
            vec![component("Empty", false, vec![])],
            vec![instance("e", "Empty")],
        );
        prune_empty_components(&mut model).unwrap();
        assert!(!model.components.contains_key("Empty"));
        assert!(model.assemblies[0].composition.instances.is_empty());
    }

    #[test]
    fn test_control_component_retained() {
        let mut model = model_with(
            vec![component("Driver", true, vec![])],
            vec![instance("d", "Driver")],
        );
        prune_empty_components(&mut model).unwrap();
        assert!(model.components.contains_key("Driver"));
        assert_eq!(model.assemblies[0].composition.instances.len(), 1);
    }

    #[test]
    fn test_interface_bearing_component_retained() {
        let provides = InterfaceDecl {
            name: "svc".to_string(),
            kind: InterfaceKind::Provides,
        };
        let mut model = model_with(
            vec![
                component("Server", false, vec![provides]),
                component("Empty", false, vec![]),
            ],
            vec![instance("s", "Server"), instance("e", "Empty")],
        );
        prune_empty_components(&mut model).unwrap();
        assert!(model.components.contains_key("Server"));
        assert!(!model.components.contains_key("Empty"));
        let names: Vec<&str> = model.assemblies[0]
            .composition
            .instances
            .iter()
            .map(|i| i.name.as_str())
            .collect();
        assert_eq!(names, vec!["s"]);
    }
}
