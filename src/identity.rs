use serde_json::Value;
use std::path::Path;
use tracing::debug;

use crate::errors::Error;
use crate::metadata::{INSTANCE_ID, MetadataDocument};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceIdentity(String);

impl InstanceIdentity {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for InstanceIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn from_metadata(doc: &MetadataDocument) -> Option<String> {
    let id = match doc.get(INSTANCE_ID)? {
        Value::Null => return None,
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    (!id.is_empty()).then_some(id)
}

/// `instance-id` from the metadata, or else the platform UUID that VMware
/// puts into the DMI tables.
pub fn resolve(doc: &MetadataDocument, fallback: &Path) -> Result<InstanceIdentity, Error> {
    if let Some(id) = from_metadata(doc) {
        return Ok(InstanceIdentity(id));
    }

    debug!("identity: no instance-id in metadata, reading {}", fallback.display());
    let contents = std::fs::read_to_string(fallback)
        .map_err(|e| Error::IdentityUnavailable(fallback.to_path_buf(), e.to_string()))?;
    let id = contents.trim_end();
    if id.is_empty() {
        return Err(Error::IdentityUnavailable(
            fallback.to_path_buf(),
            "file is empty".into(),
        ));
    }
    Ok(InstanceIdentity(id.to_string()))
}
