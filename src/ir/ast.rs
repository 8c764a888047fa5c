//! AST node types for the architecture description IR.
//!
//! These mirror what the external parser hands over after import and
//! reference resolution: component type definitions, instances of them,
//! point-to-point connections, and configuration settings. Endpoints are a
//! closed sum so that the export boundary of a composite component is a
//! distinct variant rather than a sentinel instance name, and all
//! cross-references between nodes are by name, compared by value.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::ir::error::IrError;

/// The kind of an interface declaration on a component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceKind {
    Provides,
    Uses,
    Emits,
    Consumes,
    Dataport,
}

impl std::fmt::Display for InterfaceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            InterfaceKind::Provides => "provides",
            InterfaceKind::Uses => "uses",
            InterfaceKind::Emits => "emits",
            InterfaceKind::Consumes => "consumes",
            InterfaceKind::Dataport => "dataport",
        };
        f.write_str(s)
    }
}

/// A single interface declared by a component type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceDecl {
    pub name: String,
    pub kind: InterfaceKind,
}

/// An attribute declared by a component type. The type annotation is
/// optional; when absent, cross-level references to this attribute skip
/// type checking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    #[serde(default)]
    pub ty: Option<String>,
}

/// A component type definition. Composite types carry an internal
/// composition (and optionally a configuration); primitive types carry
/// neither.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentType {
    pub name: String,
    /// Control components are always retained, even when interface-less.
    #[serde(default)]
    pub control: bool,
    /// Hardware-backed types stay in the graph but are excluded from code
    /// generation downstream.
    #[serde(default)]
    pub hardware: bool,
    #[serde(default)]
    pub interfaces: Vec<InterfaceDecl>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default)]
    pub composition: Option<Composition>,
    #[serde(default)]
    pub configuration: Option<Configuration>,
}

impl ComponentType {
    /// Whether this type has an internal assembly that flattening must
    /// inline at every instantiation site.
    pub fn has_internal_assembly(&self) -> bool {
        self.composition.as_ref().is_some_and(|c| !c.is_empty())
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// A named instantiation of a component type. The `address_space` label
/// groups instances sharing one protection domain downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub name: String,
    pub component: String,
    pub address_space: String,
}

/// One side of a connection. `Exported` marks the side that exits through
/// a composite's export boundary; flattening rewires every such endpoint
/// to a concrete one before the enclosing level completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Endpoint {
    Concrete { instance: String, interface: String },
    Exported { interface: String },
}

impl Endpoint {
    pub fn interface(&self) -> &str {
        match self {
            Endpoint::Concrete { interface, .. } | Endpoint::Exported { interface } => interface,
        }
    }

    pub fn is_exported(&self) -> bool {
        matches!(self, Endpoint::Exported { .. })
    }

    /// The interface on this endpoint if it concretely touches `instance`.
    pub fn touches(&self, instance: &str) -> Option<&str> {
        match self {
            Endpoint::Concrete {
                instance: i,
                interface,
            } if i == instance => Some(interface),
            _ => None,
        }
    }
}

/// A point-to-point connection between two endpoints, carrying the name of
/// its connector type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub name: String,
    pub connector: String,
    pub from: Endpoint,
    pub to: Endpoint,
}

/// An address-space clustering hint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
}

/// The instances, connections and groups of one assembly level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Composition {
    #[serde(default)]
    pub instances: Vec<Instance>,
    #[serde(default)]
    pub connections: Vec<Connection>,
    #[serde(default)]
    pub groups: Vec<Group>,
}

impl Composition {
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty() && self.connections.is_empty() && self.groups.is_empty()
    }

    pub fn instance(&self, name: &str) -> Option<&Instance> {
        self.instances.iter().find(|i| i.name == name)
    }
}

/// An attribute value. `Reference` names an attribute of the enclosing
/// composite instance and is resolved to a literal when that level of the
/// hierarchy is merged into its parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Reference { symbol: String },
}

/// An assignment of an attribute value on a named instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setting {
    pub instance: String,
    pub attribute: String,
    pub value: Value,
}

/// An ordered sequence of settings. The `(instance, attribute) -> value`
/// view is derived on access, so it can never be read stale after a
/// structural edit to `settings`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub settings: Vec<Setting>,
}

impl Configuration {
    /// Look up the effective value for `(instance, attribute)`. Later
    /// settings override earlier ones.
    pub fn lookup(&self, instance: &str, attribute: &str) -> Option<&Value> {
        self.settings
            .iter()
            .rev()
            .find(|s| s.instance == instance && s.attribute == attribute)
            .map(|s| &s.value)
    }

    /// Derived mapping over the full settings sequence, recomputed on
    /// every access.
    pub fn mapping(&self) -> IndexMap<(&str, &str), &Value> {
        let mut map = IndexMap::new();
        for s in &self.settings {
            map.insert((s.instance.as_str(), s.attribute.as_str()), &s.value);
        }
        map
    }
}

/// The top-level composition + configuration pair. Exactly one must exist
/// in a well-formed model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Assembly {
    pub composition: Composition,
    #[serde(default)]
    pub configuration: Configuration,
}

/// A reference the external resolver failed to resolve, carried on the
/// model so all of them can be reported together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnresolvedRef {
    pub file: String,
    pub line: u32,
    pub symbol: String,
    pub kind: String,
}

/// The full model handed over by the external parser/resolver: the forest
/// of component type definitions plus the top-level assembly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Model {
    #[serde(default)]
    pub components: IndexMap<String, ComponentType>,
    #[serde(default)]
    pub assemblies: Vec<Assembly>,
    #[serde(default)]
    pub unresolved: Vec<UnresolvedRef>,
}

impl Model {
    pub fn assembly(&self) -> Result<&Assembly, IrError> {
        match self.assemblies.as_slice() {
            [a] => Ok(a),
            [] => Err(IrError::NoAssemblyFound),
            _ => Err(IrError::MultipleAssembliesFound),
        }
    }

    pub fn assembly_mut(&mut self) -> Result<&mut Assembly, IrError> {
        match self.assemblies.as_mut_slice() {
            [a] => Ok(a),
            [] => Err(IrError::NoAssemblyFound),
            _ => Err(IrError::MultipleAssembliesFound),
        }
    }
}
