//! VMware guestinfo datasource: provisioning configuration read through
//! `vmware-rpctool`, reconciled from `cloudinit.metadata` (JSON) and
//! `ovfEnv` (OVF environment XML).

pub mod config;
pub mod datasource;
pub mod distro;
pub mod errors;
pub mod guestinfo;
pub mod identity;
pub mod logging;
pub mod metadata;
pub mod network;
pub mod ovf;
pub mod utils;

pub use crate::errors::Error;
