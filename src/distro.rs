use async_trait::async_trait;
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use crate::errors::Error;
use crate::network::eni;

/// Distro capabilities the datasource hands its network results to.
#[async_trait]
pub trait Distro: Send + Sync {
    /// Bring up the network from /etc/network/interfaces syntax.
    async fn apply_network(&self, interfaces: &str) -> Result<(), Error>;

    fn eni_conversion_available(&self) -> bool {
        true
    }

    fn convert_eni(&self, interfaces: &str) -> Result<Value, Error> {
        eni::convert(interfaces)
    }
}

/// Debian style ifupdown: write the interfaces file, then `ifup --all`.
#[derive(Debug, Clone)]
pub struct Ifupdown {
    interfaces_file: PathBuf,
    bringup_command: Vec<String>,
}

impl Ifupdown {
    pub fn new(interfaces_file: impl Into<PathBuf>, bringup_command: Vec<String>) -> Self {
        Ifupdown {
            interfaces_file: interfaces_file.into(),
            bringup_command,
        }
    }
}

fn write_file(path: &Path, contents: &str) -> Result<(), Error> {
    let failed = |e: std::io::Error| Error::WriteFailed(path.to_path_buf(), e);
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir).map_err(failed)?;
    file.write_all(contents.as_bytes()).map_err(failed)?;
    file.as_file().sync_all().map_err(failed)?;
    file.persist(path).map_err(|e| failed(e.error))?;
    Ok(())
}

async fn command(args: &[String]) -> Result<(), Error> {
    let Some((executable, rest)) = args.split_first() else {
        return Err(Error::CommandError(Vec::new(), "empty command".into()));
    };
    debug!("Running {:?}", args);
    let output = Command::new(executable)
        .args(rest)
        .output()
        .await
        .map_err(|e| Error::CommandError(args.to_vec(), e.to_string()))?;

    if !output.status.success() {
        return Err(Error::CommandError(
            args.to_vec(),
            String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
        ));
    }
    if !output.stdout.is_empty() || !output.stderr.is_empty() {
        warn!(
            "{} had stderr: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim_end()
        );
    }
    Ok(())
}

#[async_trait]
impl Distro for Ifupdown {
    #[instrument(skip(self, interfaces))]
    async fn apply_network(&self, interfaces: &str) -> Result<(), Error> {
        write_file(&self.interfaces_file, interfaces)?;
        info!("Wrote {}", self.interfaces_file.display());
        command(&self.bringup_command).await
    }
}
