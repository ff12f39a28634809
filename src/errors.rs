use std::path::PathBuf;

use crate::ovf::OvfError;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    // Guest channel
    #[error("No vmware-rpctool found (PATH is {0})")]
    ChannelUnavailable(String),
    #[error("vmware-rpctool exited with {0}")]
    CommunicationError(i32),
    #[error("Failed to run {0:?}: {1}")]
    Spawn(PathBuf, std::io::Error),
    #[error("guestinfo.{0} is not valid UTF-8")]
    InvalidUtf8(String),
    #[error("Timed out waiting for operation: {0}")]
    Timeout(String),

    // Metadata
    #[error("Failed to decode json: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Failed to serialize json: {0}")]
    Serialize(serde_json::Error),
    #[error("Metadata is not a JSON object, got {0}")]
    MetadataNotObject(String),
    #[error("Failed to parse ovf: {0}")]
    Parse(#[from] OvfError),

    // Identity
    #[error("Unable to read instance id from {0:?}: {1}")]
    IdentityUnavailable(PathBuf, String),

    // Distro collaborators
    #[error("Command {0:?} failed: {1}")]
    CommandError(Vec<String>, String),
    #[error("Failed to write {0:?}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("Failed to convert network-interfaces: {0}")]
    EniConversion(String),

    // Configuration
    #[error("Failed to read configuration {0:?}: {1}")]
    ConfigRead(PathBuf, std::io::Error),

    // Misc libs
    #[error("YAML error {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Error parsing value: {0}")]
    ParseHumanize(#[from] humanize_rs::ParseError),
    #[error("Error parsing CIDR: {0}")]
    ParseNetwork(#[from] ipnet::AddrParseError),
    #[error("Failed to set up tracing: {0}")]
    Tracing(#[from] tracing::subscriber::SetGlobalDefaultError),
}

impl Error {
    /// Malformed JSON metadata, as opposed to a channel or parse failure.
    pub fn is_decode_error(&self) -> bool {
        matches!(self, Error::Decode(_) | Error::MetadataNotObject(_))
    }
}
