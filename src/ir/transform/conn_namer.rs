//! Deterministic canonical naming of connections.
//!
//! Two declared connection entries describe the same logical wire exactly
//! when they share an `(instance, interface)` pair on at least one side.
//! Downstream capability allocation depends on every invocation of the
//! tool agreeing on connection names and their order, so names are minted
//! from a running index local to one call over one flattened composition,
//! never from process-global state.

use anyhow::Result;
use indexmap::IndexMap;

use crate::ir::ast::{Composition, Endpoint};
use crate::ir::error::IrError;

/// Assign each logical connection its canonical name, in declaration
/// order.
///
/// If neither endpoint of a connection has been seen, a fresh name is
/// minted from the connection's declaration index and bound to both
/// endpoints. If one endpoint is already bound, the other adopts its name;
/// this means any number of connections fanning out from one endpoint all
/// share the first-bound canonical name.
///
/// Only flattened compositions may be named; an export-boundary endpoint
/// here means flattening failed to rewire it.
pub fn assign_connection_names(composition: &mut Composition) -> Result<()> {
    let mut canonical: IndexMap<(String, String), String> = IndexMap::new();
    for (id, c) in composition.connections.iter_mut().enumerate() {
        let from = endpoint_key(&c.from)?;
        let to = endpoint_key(&c.to)?;
        match (canonical.get(&from).cloned(), canonical.get(&to).cloned()) {
            (None, None) => {
                let name = format!("conn{}", id);
                c.name = name.clone();
                canonical.insert(from, name.clone());
                canonical.insert(to, name);
            }
            (Some(name), None) => {
                c.name = name.clone();
                canonical.insert(to, name);
            }
            (None, Some(name)) => {
                c.name = name.clone();
                canonical.insert(from, name);
            }
            (Some(name), Some(_)) => {
                c.name = name;
            }
        }
    }
    Ok(())
}

fn endpoint_key(endpoint: &Endpoint) -> Result<(String, String)> {
    match endpoint {
        Endpoint::Concrete {
            instance,
            interface,
        } => Ok((instance.clone(), interface.clone())),
        Endpoint::Exported { interface } => Err(IrError::UnresolvedExport {
            interface: interface.clone(),
        }
        .into()),
    }
}
