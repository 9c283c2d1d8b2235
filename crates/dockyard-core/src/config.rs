//! Host configuration

use crate::{DockyardError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Bridge the containers' veth pairs are attached to
pub const DEFAULT_BRIDGE: &str = "lxcbr0";

/// Capabilities dropped from every container
pub const DEFAULT_CAP_DROP: &[&str] = &[
    "audit_control",
    "audit_write",
    "mac_admin",
    "mac_override",
    "mknod",
    "setfcap",
    "setpcap",
    "sys_admin",
    "sys_boot",
    "sys_module",
    "sys_nice",
    "sys_pacct",
    "sys_rawio",
    "sys_resource",
    "sys_time",
    "sys_tty_config",
];

/// Host-side paths and names used during startup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostConfig {
    /// Host resolver file
    pub resolv_conf_path: PathBuf,

    /// Directory holding the rewritten resolver file
    pub state_dir: PathBuf,

    /// File name of the rewritten resolver file inside `state_dir`
    pub resolv_conf_name: String,

    /// Bridge the containers' veth pairs attach to (`lxc.network.link`).
    /// Its network address also replaces loopback nameservers.
    pub bridge: String,

    /// When the running executable lives here, we are the container's init
    pub init_path: PathBuf,

    /// Options baked into the compiled template
    pub template: TemplateOptions,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            resolv_conf_path: PathBuf::from("/etc/resolv.conf"),
            state_dir: default_state_dir(),
            resolv_conf_name: "resolv.conf".into(),
            bridge: DEFAULT_BRIDGE.into(),
            init_path: PathBuf::from("/sbin/init"),
            template: TemplateOptions::default(),
        }
    }
}

impl HostConfig {
    /// Create a new config builder
    #[must_use]
    pub fn builder() -> HostConfigBuilder {
        HostConfigBuilder::default()
    }

    /// Load a JSON config file; missing fields take their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            DockyardError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            DockyardError::Config(format!("failed to parse {}: {e}", path.display()))
        })
    }

    /// Path of the rewritten resolver file
    #[must_use]
    pub fn state_resolv_conf(&self) -> PathBuf {
        self.state_dir.join(&self.resolv_conf_name)
    }
}

/// Static parts of the LXC template
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TemplateOptions {
    /// `lxc.network.mtu`
    pub mtu: u32,
    /// `lxc.network.name`
    pub interface_name: String,
    /// `lxc.pts`
    pub pts_max: u32,
    /// `lxc.tty`
    pub tty_count: u32,
    /// `lxc.cap.drop`, lowercase names without the `cap_` prefix
    pub cap_drop: Vec<String>,
}

impl Default for TemplateOptions {
    fn default() -> Self {
        Self {
            mtu: 1500,
            interface_name: "eth0".into(),
            pts_max: 1024,
            tty_count: 1,
            cap_drop: DEFAULT_CAP_DROP.iter().map(|&c| c.to_owned()).collect(),
        }
    }
}

/// Builder for HostConfig
#[derive(Debug, Default)]
pub struct HostConfigBuilder {
    config: HostConfig,
}

impl HostConfigBuilder {
    #[must_use]
    pub fn resolv_conf_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.resolv_conf_path = path.into();
        self
    }

    #[must_use]
    pub fn state_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.state_dir = path.into();
        self
    }

    #[must_use]
    pub fn resolv_conf_name(mut self, name: impl Into<String>) -> Self {
        self.config.resolv_conf_name = name.into();
        self
    }

    #[must_use]
    pub fn bridge(mut self, name: impl Into<String>) -> Self {
        self.config.bridge = name.into();
        self
    }

    #[must_use]
    pub fn init_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.init_path = path.into();
        self
    }

    #[must_use]
    pub fn template(mut self, options: TemplateOptions) -> Self {
        self.config.template = options;
        self
    }

    #[must_use]
    pub fn build(self) -> HostConfig {
        self.config
    }
}

/// Get default state directory from DOCKYARD_STATE_DIR env var or system default
///
/// Returns:
/// - `$DOCKYARD_STATE_DIR` if set (for development)
/// - `/var/lib/dockyard` otherwise (production)
pub fn default_state_dir() -> PathBuf {
    std::env::var("DOCKYARD_STATE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/var/lib/dockyard"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_bridge() {
        let config = HostConfig::builder().bridge("docker0").build();
        assert_eq!(config.bridge, "docker0");
    }

    #[test]
    fn state_resolv_conf_joins_dir_and_name() {
        let config = HostConfig::builder()
            .state_dir("/tmp/state")
            .resolv_conf_name("dns.conf")
            .build();
        assert_eq!(config.state_resolv_conf(), PathBuf::from("/tmp/state/dns.conf"));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: HostConfig =
            serde_json::from_str(r#"{"bridge": "br0", "template": {"mtu": 9000}}"#)
                .expect("parse");
        assert_eq!(config.bridge, "br0");
        assert_eq!(config.template.mtu, 9000);
        assert_eq!(config.template.pts_max, 1024);
        assert_eq!(config.resolv_conf_path, PathBuf::from("/etc/resolv.conf"));
        assert_eq!(config.template.cap_drop.len(), DEFAULT_CAP_DROP.len());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("dockyard.json");
        std::fs::write(&path, r#"{"bridge_iface": "docker0"}"#).expect("write");
        let err = HostConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, DockyardError::Config(_)));

        std::fs::write(&path, r#"{"template": {"bridge": "docker0"}}"#).expect("write");
        assert!(HostConfig::from_file(&path).is_err());
    }

    #[test]
    fn from_file_reports_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = HostConfig::from_file(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, DockyardError::Config(_)));
    }
}
