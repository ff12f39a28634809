//! The guestinfo acquisition pipeline.
//!
//! A run checks for the helper, then walks `FetchUserdata ->
//! FetchMetadataJson -> DecodeJson -> FetchOvf -> ParseAndMergeOvf`
//! strictly in order. A missing helper or missing user data skips the
//! datasource; everything else that goes wrong fails the run. Nothing is
//! retried.

use serde_json::Value;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

use crate::config::DATASOURCE_NAME;
use crate::distro::Distro;
use crate::errors::Error;
use crate::guestinfo::{GuestChannel, METADATA_KEY, OVF_KEY, USERDATA_KEY};
use crate::identity::{self, InstanceIdentity};
use crate::metadata::{self, MetadataDocument};
use crate::network::{self, NetworkConfig};
use crate::ovf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    FetchUserdata,
    FetchMetadataJson,
    DecodeJson,
    FetchOvf,
    ParseAndMergeOvf,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::FetchUserdata => "fetch userdata",
            Stage::FetchMetadataJson => "fetch metadata",
            Stage::DecodeJson => "decode metadata",
            Stage::FetchOvf => "fetch ovf environment",
            Stage::ParseAndMergeOvf => "parse ovf environment",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    ChannelUnavailable,
    NoUserdata,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::ChannelUnavailable => f.write_str("vmware-rpctool is not available"),
            SkipReason::NoUserdata => f.write_str("guestinfo.cloudinit.userdata is not set"),
        }
    }
}

#[derive(Debug)]
pub enum Outcome {
    Done(Acquired),
    /// Not a VMware guest with cloud-init data; no data available
    Skipped(SkipReason),
    /// Not logged by the pipeline; reporting is up to the consumer
    Failed { stage: Stage, error: Error },
}

impl Outcome {
    pub fn acquired(&self) -> Option<&Acquired> {
        match self {
            Outcome::Done(acquired) => Some(acquired),
            _ => None,
        }
    }

    pub fn into_result(self) -> Result<Option<Acquired>, Error> {
        match self {
            Outcome::Done(acquired) => Ok(Some(acquired)),
            Outcome::Skipped(_) => Ok(None),
            Outcome::Failed { error, .. } => Err(error),
        }
    }
}

/// Result of a successful run, owned by the consumer from here on.
#[derive(Debug, Clone, PartialEq)]
pub struct Acquired {
    metadata: MetadataDocument,
    userdata_raw: String,
}

impl Acquired {
    pub fn metadata(&self) -> &MetadataDocument {
        &self.metadata
    }

    pub fn userdata_raw(&self) -> &str {
        &self.userdata_raw
    }

    pub fn network_config(&self) -> NetworkConfig {
        network::network_config_value(&self.metadata)
    }

    /// Structured network configuration for the consumer, converting
    /// legacy interfaces text when the distro is able to.
    pub fn reported_network_config(&self, distro: &dyn Distro) -> Result<Option<Value>, Error> {
        match self.network_config() {
            NetworkConfig::Structured(value) => Ok(Some(value)),
            NetworkConfig::LegacyInterfacesText(text) if distro.eni_conversion_available() => {
                distro.convert_eni(&text).map(Some)
            }
            _ => Ok(None),
        }
    }

    pub fn instance_id(&self, fallback: &Path) -> Result<InstanceIdentity, Error> {
        identity::resolve(&self.metadata, fallback)
    }

    /// Apply `network-interfaces` through the distro unless the structured
    /// form takes over. Failures are logged here and not propagated.
    pub async fn bring_up_network(&self, distro: &dyn Distro) -> bool {
        match network::resolve(&self.metadata, distro.eni_conversion_available()) {
            NetworkConfig::LegacyInterfacesText(text) => match distro.apply_network(&text).await {
                Ok(()) => true,
                Err(e) => {
                    warn!("Failed to bring up network-interfaces: {}", e);
                    false
                }
            },
            _ => {
                if self.metadata.contains_key(metadata::NETWORK_CONFIG) {
                    info!("Skipped setting network-interfaces");
                }
                false
            }
        }
    }
}

fn failed(stage: Stage, error: Error) -> Outcome {
    Outcome::Failed { stage, error }
}

async fn fetch<C>(channel: &C, stage: Stage, key: &str) -> Result<Option<String>, Outcome>
where
    C: GuestChannel + ?Sized,
{
    channel
        .fetch(key)
        .await
        .and_then(|result| result.into_value())
        .map_err(|e| failed(stage, e))
}

/// Run the pipeline once. `channel` is `None` when no helper was found.
#[instrument(skip(channel), fields(datasource = DATASOURCE_NAME))]
pub async fn acquire<C>(channel: Option<&C>) -> Outcome
where
    C: GuestChannel + ?Sized,
{
    let Some(channel) = channel else {
        return Outcome::Skipped(SkipReason::ChannelUnavailable);
    };

    let userdata_raw = match fetch(channel, Stage::FetchUserdata, USERDATA_KEY).await {
        Ok(Some(userdata)) => userdata,
        Ok(None) => {
            info!("No guestinfo.{}, skipping datasource", USERDATA_KEY);
            return Outcome::Skipped(SkipReason::NoUserdata);
        }
        Err(outcome) => return outcome,
    };

    let mut metadata = match fetch(channel, Stage::FetchMetadataJson, METADATA_KEY).await {
        Ok(Some(text)) => match MetadataDocument::from_json(&text) {
            Ok(doc) => doc,
            Err(e) => {
                debug!("undecodable metadata: {:?}", text);
                return Outcome::Failed {
                    stage: Stage::DecodeJson,
                    error: e,
                };
            }
        },
        Ok(None) => MetadataDocument::new(),
        Err(outcome) => return outcome,
    };

    match fetch(channel, Stage::FetchOvf, OVF_KEY).await {
        Ok(Some(text)) => match ovf::parse(&text) {
            Ok(properties) => metadata = metadata::merge(metadata, properties),
            Err(e) => {
                debug!("unparsable ovf environment: {:?}", text);
                return Outcome::Failed {
                    stage: Stage::ParseAndMergeOvf,
                    error: e.into(),
                };
            }
        },
        Ok(None) => {}
        Err(outcome) => return outcome,
    }

    info!("acquired metadata with {} keys", metadata.len());
    Outcome::Done(Acquired {
        metadata,
        userdata_raw,
    })
}
