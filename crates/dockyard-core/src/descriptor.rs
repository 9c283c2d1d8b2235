//! Container descriptor as handed over by the container manager

use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Everything the template needs to know about one container
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerDescriptor {
    /// Opaque container identifier
    pub id: String,

    pub config: ContainerConfig,

    #[serde(default)]
    pub network_settings: NetworkSettings,

    pub mountpoint: Mountpoint,

    /// Init binary bind-mounted over the container's `/sbin/init`
    pub sys_init_path: PathBuf,
}

/// User-supplied container settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ContainerConfig {
    pub hostname: Option<String>,

    /// Memory limit in bytes, 0 for none
    pub memory: i64,

    /// Negative disables the swap limit
    pub memory_swap: i64,
}

/// Address assigned on the bridge
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NetworkSettings {
    pub ip_address: String,
    pub ip_prefix_len: u8,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Mountpoint {
    /// Container root filesystem on the host
    pub root: PathBuf,
}

impl ContainerDescriptor {
    /// Parse a descriptor from its JSON form
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Hostname inside the container, falling back to the container id
    #[must_use]
    pub fn hostname(&self) -> &str {
        match self.config.hostname.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.id,
        }
    }
}
