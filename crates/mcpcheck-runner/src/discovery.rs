//! Capability discovery.
//!
//! Servers often implement only part of the protocol, so the three listing
//! methods are queried independently. A class the server does not implement
//! becomes an empty list and is noted in
//! [`CapabilityCatalog::unsupported`]; any other error aborts discovery.

use mcpcheck_client::ProtocolClient;
use mcpcheck_core::catalog::{CapabilityCatalog, CapabilityClass};
use mcpcheck_core::error::Result;
use tracing::debug;

/// Fetch the capability catalog from a connected client.
pub async fn discover<C: ProtocolClient>(client: &mut C) -> Result<CapabilityCatalog> {
    let mut catalog = CapabilityCatalog::default();

    catalog.tools = tolerate(CapabilityClass::Tools, client.list_tools().await, &mut catalog.unsupported)?;
    catalog.resources = tolerate(
        CapabilityClass::Resources,
        client.list_resources().await,
        &mut catalog.unsupported,
    )?;
    catalog.prompts = tolerate(
        CapabilityClass::Prompts,
        client.list_prompts().await,
        &mut catalog.unsupported,
    )?;

    debug!(
        tools = catalog.tools.len(),
        resources = catalog.resources.len(),
        prompts = catalog.prompts.len(),
        unsupported = ?catalog.unsupported,
        "Discovered capabilities"
    );
    Ok(catalog)
}

fn tolerate<T>(
    class: CapabilityClass,
    listed: Result<Vec<T>>,
    unsupported: &mut Vec<CapabilityClass>,
) -> Result<Vec<T>> {
    match listed {
        Ok(items) => Ok(items),
        Err(e) if e.is_not_implemented() => {
            debug!(method = class.list_method(), "Capability class not implemented");
            unsupported.push(class);
            Ok(Vec::new())
        }
        Err(e) => Err(e),
    }
}
