//! # dockyard-core
//!
//! Host-side LXC configuration for containers.
//!
//! This crate provides the pieces the container start path needs before it
//! hands a container over to `lxc-start`:
//! - `resolv` - one-time reconciliation of the host's `/etc/resolv.conf`
//! - `template` - compiled LXC template rendered per container
//! - `directive` - typed configuration directives and their text form
//! - `limits` - derived cgroup memory values
//! - `startup` - runs the one-time setup and owns its results

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod descriptor;
pub mod directive;
pub mod error;
pub mod limits;
pub mod resolv;
pub mod startup;
pub mod template;

pub use config::HostConfig;
pub use descriptor::ContainerDescriptor;
pub use directive::LxcConfig;
pub use error::DockyardError;
pub use resolv::ResolvConf;
pub use startup::Startup;
pub use template::LxcTemplate;

/// Crate-level result type
pub type Result<T> = std::result::Result<T, DockyardError>;
