//! One-time host setup
//!
//! Runs resolv.conf reconciliation and template compilation exactly once,
//! before any container is configured. Both results are immutable
//! afterwards; [`Startup`] owns them and is shared by reference.

use crate::resolv::{self, BridgeNetwork};
use crate::{ContainerDescriptor, HostConfig, LxcConfig, LxcTemplate, ResolvConf, Result};
use std::path::Path;

/// What this process was started as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupMode {
    /// Normal host-side process
    Host,
    /// Running as a container's init; no host setup must happen
    Init,
}

impl StartupMode {
    /// Compare the running executable against the container init path
    #[must_use]
    pub fn detect(init_path: &Path) -> Self {
        match std::env::current_exe() {
            Ok(exe) => Self::from_exe(&exe, init_path),
            Err(e) => {
                tracing::warn!("unable to resolve own executable: {e}");
                Self::Host
            }
        }
    }

    #[must_use]
    pub fn from_exe(exe: &Path, init_path: &Path) -> Self {
        if exe == init_path {
            Self::Init
        } else {
            Self::Host
        }
    }
}

/// Results of the one-time setup
#[derive(Debug, Clone)]
pub struct Startup {
    resolv: ResolvConf,
    template: LxcTemplate,
}

impl Startup {
    /// Reconcile resolv.conf, then compile the template.
    ///
    /// Any error means containers cannot be configured correctly; callers
    /// should stop instead of retrying.
    pub fn run(config: &HostConfig, bridge: &impl BridgeNetwork) -> Result<Self> {
        tracing::info!(bridge = %config.bridge, "running host setup");

        let resolv = resolv::reconcile(config, bridge)?;
        let template = LxcTemplate::compile(&config.template, &config.bridge)?;

        Ok(Self::from_parts(resolv, template))
    }

    #[must_use]
    pub const fn from_parts(resolv: ResolvConf, template: LxcTemplate) -> Self {
        Self { resolv, template }
    }

    #[must_use]
    pub const fn resolv(&self) -> &ResolvConf {
        &self.resolv
    }

    #[must_use]
    pub const fn template(&self) -> &LxcTemplate {
        &self.template
    }

    /// Render the configuration for one container
    #[must_use]
    pub fn render(&self, desc: &ContainerDescriptor) -> LxcConfig {
        self.template.render(desc, &self.resolv)
    }
}
