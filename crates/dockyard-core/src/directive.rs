//! Typed LXC configuration
//!
//! Rendering produces an [`LxcConfig`]: titled sections of `key = value`
//! directives. Its `Display` impl is the text `lxc-start` reads.

use std::fmt;
use std::path::PathBuf;

/// LXC configuration keys emitted by the template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Utsname,
    NetworkType,
    NetworkFlags,
    NetworkLink,
    NetworkName,
    NetworkMtu,
    NetworkIpv4,
    Rootfs,
    Pts,
    Console,
    Tty,
    DevicesDeny,
    DevicesAllow,
    MountEntry,
    CapDrop,
    MemoryLimit,
    MemorySoftLimit,
    MemswLimit,
}

impl Key {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Utsname => "lxc.utsname",
            Self::NetworkType => "lxc.network.type",
            Self::NetworkFlags => "lxc.network.flags",
            Self::NetworkLink => "lxc.network.link",
            Self::NetworkName => "lxc.network.name",
            Self::NetworkMtu => "lxc.network.mtu",
            Self::NetworkIpv4 => "lxc.network.ipv4",
            Self::Rootfs => "lxc.rootfs",
            Self::Pts => "lxc.pts",
            Self::Console => "lxc.console",
            Self::Tty => "lxc.tty",
            Self::DevicesDeny => "lxc.cgroup.devices.deny",
            Self::DevicesAllow => "lxc.cgroup.devices.allow",
            Self::MountEntry => "lxc.mount.entry",
            Self::CapDrop => "lxc.cap.drop",
            Self::MemoryLimit => "lxc.cgroup.memory.limit_in_bytes",
            Self::MemorySoftLimit => "lxc.cgroup.memory.soft_limit_in_bytes",
            Self::MemswLimit => "lxc.cgroup.memory.memsw.limit_in_bytes",
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Device cgroup rule, e.g. `c 1:3 rwm`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceRule {
    pub major: u32,
    /// `None` matches every minor number
    pub minor: Option<u32>,
}

impl DeviceRule {
    #[must_use]
    pub const fn char(major: u32, minor: u32) -> Self {
        Self {
            major,
            minor: Some(minor),
        }
    }

    #[must_use]
    pub const fn char_any(major: u32) -> Self {
        Self { major, minor: None }
    }
}

impl fmt::Display for DeviceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.minor {
            Some(minor) => write!(f, "c {}:{minor} rwm", self.major),
            None => write!(f, "c {}:* rwm", self.major),
        }
    }
}

/// fstab-style mount entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub source: PathBuf,
    pub target: PathBuf,
    pub fstype: &'static str,
    pub options: &'static str,
}

impl MountEntry {
    /// Read-only bind mount
    #[must_use]
    pub fn bind_ro(source: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            fstype: "none",
            options: "bind,ro",
        }
    }
}

impl fmt::Display for MountEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} 0 0",
            self.source.display(),
            self.target.display(),
            self.fstype,
            self.options
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Number(i64),
    Device(DeviceRule),
    Mount(MountEntry),
    Capabilities(Vec<caps::Capability>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Number(n) => write!(f, "{n}"),
            Self::Device(rule) => fmt::Display::fmt(rule, f),
            Self::Mount(entry) => fmt::Display::fmt(entry, f),
            Self::Capabilities(caps) => {
                for (i, cap) in caps.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    f.write_str(&capability_name(*cap))?;
                }
                Ok(())
            }
        }
    }
}

/// LXC spelling of a capability: `CAP_SYS_ADMIN` becomes `sys_admin`
#[must_use]
pub fn capability_name(cap: caps::Capability) -> String {
    let name = cap.to_string();
    name.strip_prefix("CAP_").unwrap_or(&name).to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub key: Key,
    pub value: Value,
}

impl Directive {
    #[must_use]
    pub fn text(key: Key, value: impl Into<String>) -> Self {
        Self {
            key,
            value: Value::Text(value.into()),
        }
    }

    #[must_use]
    pub const fn number(key: Key, value: i64) -> Self {
        Self {
            key,
            value: Value::Number(value),
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.key, self.value)
    }
}

/// Directives under a `# title` comment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub title: &'static str,
    pub directives: Vec<Directive>,
}

impl Section {
    #[must_use]
    pub const fn new(title: &'static str, directives: Vec<Directive>) -> Self {
        Self { title, directives }
    }
}

/// Rendered configuration for one container
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LxcConfig {
    pub sections: Vec<Section>,
}

impl LxcConfig {
    /// All directives in document order
    pub fn directives(&self) -> impl Iterator<Item = &Directive> {
        self.sections.iter().flat_map(|s| s.directives.iter())
    }

    /// Values set for `key`, in document order
    pub fn values(&self, key: Key) -> impl Iterator<Item = &Value> {
        self.directives()
            .filter(move |d| d.key == key)
            .map(|d| &d.value)
    }

    /// First value set for `key`
    #[must_use]
    pub fn get(&self, key: Key) -> Option<&Value> {
        self.values(key).next()
    }

    #[must_use]
    pub fn section(&self, title: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.title == title)
    }
}

impl fmt::Display for LxcConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, section) in self.sections.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            writeln!(f, "# {}", section.title)?;
            for directive in &section.directives {
                writeln!(f, "{directive}")?;
            }
        }
        Ok(())
    }
}
