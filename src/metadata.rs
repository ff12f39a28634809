use serde_json::{Map, Value};
use std::ops::Deref;
use tracing::debug;

use crate::errors::Error;
use crate::ovf::OvfProperties;

pub const INSTANCE_ID: &str = "instance-id";
pub const NETWORK_CONFIG: &str = "network-config";
pub const NETWORK_INTERFACES: &str = "network-interfaces";

/// The unified metadata for one acquisition run. Keys other than the ones
/// above pass through untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataDocument(Map<String, Value>);

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl MetadataDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `guestinfo.cloudinit.metadata`. Anything but a JSON object is
    /// a decode error.
    pub fn from_json(text: &str) -> Result<Self, Error> {
        match serde_json::from_str(text)? {
            Value::Object(map) => Ok(MetadataDocument(map)),
            other => Err(Error::MetadataNotObject(json_type(&other).to_string())),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

impl Deref for MetadataDocument {
    type Target = Map<String, Value>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Map<String, Value>> for MetadataDocument {
    fn from(map: Map<String, Value>) -> Self {
        MetadataDocument(map)
    }
}

/// Overlay OVF properties on top of `base`. Colliding keys take the OVF
/// value; positions of existing keys are kept.
pub fn merge(base: MetadataDocument, overlay: OvfProperties) -> MetadataDocument {
    let mut merged = base;
    for property in overlay {
        let replaced = merged.insert(property.key.clone(), Value::String(property.value));
        if replaced.is_some() {
            debug!("metadata: ovf property {} overrides metadata value", property.key);
        } else {
            debug!("metadata: ovf property {} added", property.key);
        }
    }
    merged
}
