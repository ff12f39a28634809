use serde_json::Value;

use crate::metadata::{MetadataDocument, NETWORK_CONFIG, NETWORK_INTERFACES};

pub mod eni;

/// The network configuration carried by a metadata document.
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkConfig {
    None,
    /// Value of `network-config`, passed through as-is
    Structured(Value),
    /// Value of `network-interfaces`, /etc/network/interfaces syntax
    LegacyInterfacesText(String),
}

fn legacy_interfaces(doc: &MetadataDocument) -> NetworkConfig {
    // Only a string can be written out as an interfaces file
    match doc.get(NETWORK_INTERFACES) {
        Some(Value::String(text)) => NetworkConfig::LegacyInterfacesText(text.clone()),
        _ => NetworkConfig::None,
    }
}

/// What, if anything, has to be brought up directly from legacy
/// interfaces text. When the structured form is present and the distro
/// can handle it, nothing is.
pub fn resolve(doc: &MetadataDocument, eni_conversion_available: bool) -> NetworkConfig {
    if eni_conversion_available && doc.contains_key(NETWORK_CONFIG) {
        return NetworkConfig::None;
    }
    legacy_interfaces(doc)
}

/// The network configuration to report to the consumer.
pub fn network_config_value(doc: &MetadataDocument) -> NetworkConfig {
    match doc.get(NETWORK_CONFIG) {
        Some(value) => NetworkConfig::Structured(value.clone()),
        None => legacy_interfaces(doc),
    }
}
