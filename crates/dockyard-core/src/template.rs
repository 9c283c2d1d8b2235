//! Compiled LXC template
//!
//! [`LxcTemplate::compile`] validates the host options and builds every
//! section that does not depend on the container. [`LxcTemplate::render`]
//! adds the per-container sections; it has no side effects, so a compiled
//! template can be shared across threads and rendered concurrently.

use crate::config::TemplateOptions;
use crate::directive::{DeviceRule, Directive, Key, LxcConfig, MountEntry, Section, Value};
use crate::limits::effective_swap_limit;
use crate::{ContainerDescriptor, DockyardError, ResolvConf, Result};

/// Devices containers may open: null, zero, consoles, random sources,
/// the pts range, ptmx and tuntap.
const ALLOWED_DEVICES: &[DeviceRule] = &[
    DeviceRule::char(1, 3),
    DeviceRule::char(1, 5),
    DeviceRule::char(5, 1),
    DeviceRule::char(5, 0),
    DeviceRule::char(4, 0),
    DeviceRule::char(4, 1),
    DeviceRule::char(1, 9),
    DeviceRule::char(1, 8),
    DeviceRule::char_any(136),
    DeviceRule::char(5, 2),
    DeviceRule::char(10, 200),
];

#[derive(Debug, Clone)]
pub struct LxcTemplate {
    terminals: Section,
    devices: Section,
    network: Vec<Directive>,
    capabilities: Section,
}

impl LxcTemplate {
    /// Validate `options` and prepare the static sections for `bridge`
    pub fn compile(options: &TemplateOptions, bridge: &str) -> Result<Self> {
        if bridge.is_empty() || bridge.contains(char::is_whitespace) {
            return Err(DockyardError::Template(format!("invalid bridge name {bridge:?}")));
        }
        if options.interface_name.is_empty()
            || options.interface_name.contains(char::is_whitespace)
        {
            return Err(DockyardError::Template(format!(
                "invalid interface name {:?}",
                options.interface_name
            )));
        }
        if options.mtu == 0 {
            return Err(DockyardError::Template("mtu must be non-zero".into()));
        }

        let caps = options
            .cap_drop
            .iter()
            .map(String::as_str)
            .map(parse_capability)
            .collect::<Result<Vec<_>>>()?;

        let terminals = Section::new(
            "terminals",
            vec![
                Directive::number(Key::Pts, options.pts_max.into()),
                Directive::text(Key::Console, "none"),
                Directive::number(Key::Tty, options.tty_count.into()),
            ],
        );

        let devices = Section::new(
            "devices",
            std::iter::once(Directive::text(Key::DevicesDeny, "a"))
                .chain(ALLOWED_DEVICES.iter().map(|&rule| Directive {
                    key: Key::DevicesAllow,
                    value: Value::Device(rule),
                }))
                .collect(),
        );

        let network = vec![
            Directive::text(Key::NetworkType, "veth"),
            Directive::text(Key::NetworkFlags, "up"),
            Directive::text(Key::NetworkLink, bridge),
            Directive::text(Key::NetworkName, options.interface_name.as_str()),
            Directive::number(Key::NetworkMtu, options.mtu.into()),
        ];

        tracing::info!(
            bridge,
            devices = ALLOWED_DEVICES.len(),
            capabilities = caps.len(),
            "lxc template compiled"
        );

        Ok(Self {
            terminals,
            devices,
            network,
            capabilities: Section::new(
                "capabilities",
                vec![Directive {
                    key: Key::CapDrop,
                    value: Value::Capabilities(caps),
                }],
            ),
        })
    }

    /// Render the configuration for one container
    #[must_use]
    pub fn render(&self, desc: &ContainerDescriptor, resolv: &ResolvConf) -> LxcConfig {
        tracing::debug!(id = %desc.id, "rendering lxc config");

        let root = &desc.mountpoint.root;
        let net = &desc.network_settings;

        let mut network = self.network.clone();
        network.push(Directive::text(
            Key::NetworkIpv4,
            format!("{}/{}", net.ip_address, net.ip_prefix_len),
        ));

        let mounts = [
            MountEntry {
                source: "proc".into(),
                target: root.join("proc"),
                fstype: "proc",
                options: "nosuid,nodev,noexec",
            },
            MountEntry {
                source: "sysfs".into(),
                target: root.join("sys"),
                fstype: "sysfs",
                options: "nosuid,nodev,noexec",
            },
            MountEntry {
                source: "devpts".into(),
                target: root.join("dev/pts"),
                fstype: "devpts",
                options: "newinstance,ptmxmode=0666,nosuid,noexec",
            },
            MountEntry::bind_ro(&desc.sys_init_path, root.join("sbin/init")),
            MountEntry::bind_ro(resolv.path(), root.join("etc/resolv.conf")),
        ];

        let mut sections = vec![
            Section::new(
                "hostname",
                vec![Directive::text(Key::Utsname, desc.hostname())],
            ),
            self.terminals.clone(),
            self.devices.clone(),
            Section::new("network configuration", network),
            Section::new(
                "root filesystem",
                vec![Directive::text(Key::Rootfs, root.display().to_string())],
            ),
            Section::new(
                "mounts",
                mounts
                    .into_iter()
                    .map(|entry| Directive {
                        key: Key::MountEntry,
                        value: Value::Mount(entry),
                    })
                    .collect(),
            ),
            self.capabilities.clone(),
        ];

        if let Some(limits) = memory_limits(desc.config.memory, desc.config.memory_swap) {
            sections.push(limits);
        }

        LxcConfig { sections }
    }
}

fn memory_limits(memory: i64, memory_swap: i64) -> Option<Section> {
    if memory <= 0 {
        return None;
    }

    let mut directives = vec![
        Directive::number(Key::MemoryLimit, memory),
        Directive::number(Key::MemorySoftLimit, memory),
    ];
    match effective_swap_limit(memory, memory_swap) {
        0 => {}
        swap => directives.push(Directive::number(Key::MemswLimit, swap)),
    }

    Some(Section::new("limits", directives))
}

fn parse_capability(name: &str) -> Result<caps::Capability> {
    let upper = name.to_uppercase();
    let full = if upper.starts_with("CAP_") {
        upper
    } else {
        format!("CAP_{upper}")
    };
    full.parse()
        .map_err(|e| DockyardError::Template(format!("unknown capability {name:?}: {e}")))
}
