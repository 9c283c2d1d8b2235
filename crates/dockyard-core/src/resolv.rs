//! Host resolv.conf reconciliation
//!
//! Nameservers on 127.0.0.0/8 (dnsmasq, systemd-resolved stubs) are not
//! reachable from inside a container's network namespace. At startup the
//! host file is scanned once; loopback entries are replaced by the bridge
//! network address and the result is persisted under the state directory.
//! Containers get whichever file comes out of this, bind-mounted read-only.

use crate::{DockyardError, HostConfig, Result};
use ipnetwork::Ipv4Network;
use nix::sys::socket::SockaddrStorage;
use regex::bytes::{NoExpand, Regex};
use std::fs::{DirBuilder, OpenOptions, Permissions};
use std::io::Write;
use std::net::Ipv4Addr;
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

/// Loopback-looking nameserver addresses.
///
/// The dot is unescaped, so any "127" followed by three groups of up to
/// three digits preceded by one arbitrary byte matches.
pub const LOOPBACK_PATTERN: &str = r"127(.[0-9]{0,3}){3}";

const STATE_DIR_MODE: u32 = 0o700;
const STATE_FILE_MODE: u32 = 0o644;

/// Source of the bridge network used to replace loopback nameservers
pub trait BridgeNetwork {
    /// First IPv4 network assigned to `iface`
    fn bridge_network(&self, iface: &str) -> Result<Ipv4Network>;
}

/// Looks the bridge up among the host's interfaces
#[derive(Debug, Clone, Copy, Default)]
pub struct HostInterfaces;

impl BridgeNetwork for HostInterfaces {
    fn bridge_network(&self, iface: &str) -> Result<Ipv4Network> {
        let mut seen = false;

        for ifaddr in nix::ifaddrs::getifaddrs()? {
            if ifaddr.interface_name != iface {
                continue;
            }
            seen = true;

            let Some(addr) = ifaddr.address.as_ref().and_then(SockaddrStorage::as_sockaddr_in)
            else {
                continue;
            };
            let prefix = match ifaddr.netmask.as_ref().and_then(SockaddrStorage::as_sockaddr_in) {
                Some(mask) => ipnetwork::ipv4_mask_to_prefix(mask.ip())?,
                None => 32,
            };

            let network = Ipv4Network::new(addr.ip(), prefix)?;
            tracing::debug!(iface, %network, "bridge address found");
            return Ok(network);
        }

        if seen {
            Err(DockyardError::NoIpv4Address(iface.to_owned()))
        } else {
            Err(DockyardError::InterfaceNotFound(iface.to_owned()))
        }
    }
}

/// A fixed network, for hosts where the bridge is configured elsewhere
impl BridgeNetwork for Ipv4Network {
    fn bridge_network(&self, _iface: &str) -> Result<Ipv4Network> {
        Ok(*self)
    }
}

/// The resolver file containers bind-mount.
///
/// Produced once by [`reconcile`] and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvConf {
    path: PathBuf,
    rewritten: bool,
}

impl ResolvConf {
    /// Use `path` as is, without reconciliation
    #[must_use]
    pub fn unchanged(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            rewritten: false,
        }
    }

    /// File to bind-mount as the container's `/etc/resolv.conf`
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the host file had loopback entries and a copy was written
    #[must_use]
    pub const fn is_rewritten(&self) -> bool {
        self.rewritten
    }
}

/// Outcome of scanning a resolver file for loopback nameservers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopbackRewrite {
    /// Number of loopback-looking addresses found
    pub matches: usize,
    /// Rewritten content, `None` when it equals the input
    pub content: Option<Vec<u8>>,
}

/// Replace loopback nameservers in `content` with `replacement`
pub fn rewrite_loopback(content: &[u8], replacement: Ipv4Addr) -> Result<LoopbackRewrite> {
    let pattern = Regex::new(LOOPBACK_PATTERN)?;
    let matches = pattern.find_iter(content).count();
    let text = replacement.to_string();
    let rewritten = pattern.replace_all(content, NoExpand(text.as_bytes()));

    let content = (rewritten.as_ref() != content).then(|| rewritten.into_owned());
    Ok(LoopbackRewrite { matches, content })
}

/// Reconcile the host resolver file against the bridge network.
///
/// Reads `config.resolv_conf_path`, and if it names loopback nameservers,
/// writes a rewritten copy to `config.state_resolv_conf()`. The returned
/// [`ResolvConf`] points at whichever file containers should see.
pub fn reconcile(config: &HostConfig, bridge: &impl BridgeNetwork) -> Result<ResolvConf> {
    let host_path = &config.resolv_conf_path;
    let content = std::fs::read(host_path).map_err(|source| DockyardError::ResolvConfRead {
        path: host_path.clone(),
        source,
    })?;

    let network = bridge.bridge_network(&config.bridge)?;

    let LoopbackRewrite { matches, content } = rewrite_loopback(&content, network.network())?;
    let Some(rewritten) = content else {
        tracing::info!(path = ?host_path, matches, rewritten = false, "using host resolv.conf");
        return Ok(ResolvConf::unchanged(host_path.clone()));
    };

    ensure_state_dir(&config.state_dir)?;
    let path = config.state_resolv_conf();
    write_state_file(&path, &rewritten)?;

    tracing::info!(
        path = ?path,
        nameserver = %network.network(),
        matches,
        rewritten = true,
        "loopback nameservers replaced"
    );

    Ok(ResolvConf {
        path,
        rewritten: true,
    })
}

fn ensure_state_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }

    tracing::debug!(?dir, "creating state directory");
    DirBuilder::new()
        .recursive(true)
        .mode(STATE_DIR_MODE)
        .create(dir)
        .map_err(|source| DockyardError::StateDir {
            path: dir.to_path_buf(),
            source,
        })
}

fn write_state_file(path: &Path, content: &[u8]) -> Result<()> {
    let map_err = |source| DockyardError::StateWrite {
        path: path.to_path_buf(),
        source,
    };

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(STATE_FILE_MODE)
        .open(path)
        .map_err(map_err)?;
    file.write_all(content).map_err(map_err)?;

    // umask may have masked bits off at creation
    std::fs::set_permissions(path, Permissions::from_mode(STATE_FILE_MODE)).map_err(map_err)
}
