use async_trait::async_trait;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, instrument};

use super::{ChannelResult, GuestChannel};
use crate::errors::Error;
use crate::utils::SearchPath;

pub const RPCTOOL: &str = "vmware-rpctool";

/// Guestinfo access through the open-vm-tools `vmware-rpctool` helper.
#[derive(Debug, Clone)]
pub struct RpcTool {
    path: PathBuf,
    timeout: Option<Duration>,
}

impl RpcTool {
    pub fn new(path: impl Into<PathBuf>, timeout: Option<Duration>) -> Self {
        RpcTool {
            path: path.into(),
            timeout,
        }
    }

    /// `None` when the helper is nowhere on the search path, meaning this
    /// is not a VMware guest.
    pub fn locate(search_path: &SearchPath, timeout: Option<Duration>) -> Option<Self> {
        match search_path.find(RPCTOOL) {
            Some(path) => {
                debug!("rpctool: using {}", path.display());
                Some(RpcTool::new(path, timeout))
            }
            None => {
                info!("No {} found (PATH is {})", RPCTOOL, search_path);
                None
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(signal)) => 128 + signal,
        (None, None) => -1,
    }
}

/// 0 carries the value, 1 means the key is not set, anything else is a
/// channel failure.
pub(crate) fn interpret(key: &str, code: i32, stdout: Vec<u8>) -> Result<ChannelResult, Error> {
    match code {
        0 => String::from_utf8(stdout)
            .map(ChannelResult::Value)
            .map_err(|_| Error::InvalidUtf8(key.to_string())),
        1 => {
            info!("{} found no guestinfo.{}", RPCTOOL, key);
            Ok(ChannelResult::Absent)
        }
        code => Ok(ChannelResult::CommunicationError(code)),
    }
}

#[async_trait]
impl GuestChannel for RpcTool {
    #[instrument(skip(self))]
    async fn fetch(&self, key: &str) -> Result<ChannelResult, Error> {
        let request = format!("info-get guestinfo.{}", key);
        debug!("Running {} '{}'", self.path.display(), request);

        let mut command = Command::new(&self.path);
        command
            .arg(&request)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, command.output())
                .await
                .map_err(|_| Error::Timeout(format!("{} '{}'", RPCTOOL, request)))?,
            None => command.output().await,
        }
        .map_err(|e| Error::Spawn(self.path.clone(), e))?;

        if !output.stderr.is_empty() {
            debug!(
                "{} stderr: {}",
                RPCTOOL,
                String::from_utf8_lossy(&output.stderr).trim_end()
            );
        }

        interpret(key, exit_code(output.status), output.stdout)
    }
}
