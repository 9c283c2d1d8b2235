//! Error types for dockyard-core
//!
//! Every variant is a startup failure. Nothing here is retried: the caller
//! is expected to stop rather than start containers with a partial setup.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DockyardError {
    #[error("unable to read resolv.conf at {}: {source}", path.display())]
    ResolvConfRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid nameserver pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("network interface {0} not found")]
    InterfaceNotFound(String),

    #[error("network interface {0} has no IPv4 address")]
    NoIpv4Address(String),

    #[error("invalid interface address: {0}")]
    AddressParse(#[from] ipnetwork::IpNetworkError),

    #[error("nix error: {0}")]
    Nix(#[from] nix::Error),

    #[error("unable to create state directory {}: {source}", path.display())]
    StateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unable to write {}: {source}", path.display())]
    StateWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("template error: {0}")]
    Template(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid container descriptor: {0}")]
    Descriptor(#[from] serde_json::Error),
}
