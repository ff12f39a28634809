use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::errors::Error;

mod rpctool;

pub use rpctool::{RPCTOOL, RpcTool};

pub const USERDATA_KEY: &str = "cloudinit.userdata";
pub const METADATA_KEY: &str = "cloudinit.metadata";
pub const OVF_KEY: &str = "ovfEnv";

/// Outcome of a single guestinfo lookup. `Absent` is the normal answer for
/// an unset key; `CommunicationError` means the channel itself broke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelResult {
    Value(String),
    Absent,
    CommunicationError(i32),
}

impl ChannelResult {
    /// Collapse to an optional value, turning a broken channel into an error.
    pub fn into_value(self) -> Result<Option<String>, Error> {
        match self {
            ChannelResult::Value(value) => Ok(Some(value)),
            ChannelResult::Absent => Ok(None),
            ChannelResult::CommunicationError(code) => Err(Error::CommunicationError(code)),
        }
    }
}

/// Request/response access to the hypervisor's guestinfo key/value store.
///
/// `Err` is reserved for failures that are not part of the channel
/// protocol itself, like the helper failing to launch.
#[async_trait]
pub trait GuestChannel: Send + Sync {
    async fn fetch(&self, key: &str) -> Result<ChannelResult, Error>;
}

/// A channel answering from a fixed table. Keys that are not in the table
/// are `Absent`.
#[derive(Debug, Default)]
pub struct MemoryChannel {
    entries: HashMap<String, ChannelResult>,
    requested: Mutex<Vec<String>>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries
            .insert(key.into(), ChannelResult::Value(value.into()));
        self
    }

    pub fn with_result(mut self, key: impl Into<String>, result: ChannelResult) -> Self {
        self.entries.insert(key.into(), result);
        self
    }

    /// Keys fetched so far, in request order.
    pub fn requested(&self) -> Vec<String> {
        self.requested
            .lock()
            .map(|keys| keys.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl GuestChannel for MemoryChannel {
    async fn fetch(&self, key: &str) -> Result<ChannelResult, Error> {
        if let Ok(mut requested) = self.requested.lock() {
            requested.push(key.to_string());
        }
        Ok(self
            .entries
            .get(key)
            .cloned()
            .unwrap_or(ChannelResult::Absent))
    }
}
