//! End-to-end startup and rendering

use dockyard_core::descriptor::{ContainerConfig, Mountpoint, NetworkSettings};
use dockyard_core::directive::{Key, Value};
use dockyard_core::resolv::BridgeNetwork;
use dockyard_core::{ContainerDescriptor, DockyardError, HostConfig, Startup};
use ipnetwork::Ipv4Network;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn startup(root: &Path, resolv_content: &str) -> Startup {
    let host = root.join("resolv.conf");
    std::fs::write(&host, resolv_content).expect("write");
    let config = HostConfig::builder()
        .resolv_conf_path(host)
        .state_dir(root.join("state"))
        .build();
    let bridge: Ipv4Network = "10.0.3.1/24".parse().expect("cidr");

    Startup::run(&config, &bridge).expect("startup")
}

fn descriptor(id: &str, memory: i64) -> ContainerDescriptor {
    ContainerDescriptor {
        id: id.into(),
        config: ContainerConfig {
            hostname: None,
            memory,
            memory_swap: 0,
        },
        network_settings: NetworkSettings {
            ip_address: "10.0.3.42".into(),
            ip_prefix_len: 24,
        },
        mountpoint: Mountpoint {
            root: PathBuf::from(format!("/containers/{id}/rootfs")),
        },
        sys_init_path: PathBuf::from("/usr/bin/dockyard"),
    }
}

#[test]
fn rendered_document() {
    let dir = tempfile::tempdir().expect("tempdir");
    let startup = startup(dir.path(), "nameserver 127.0.1.1\n");
    let state = dir.path().join("state/resolv.conf");

    let text = startup.render(&descriptor("abc123", 512)).to_string();

    let expected = format!(
        "\
# hostname
lxc.utsname = abc123

# terminals
lxc.pts = 1024
lxc.console = none
lxc.tty = 1

# devices
lxc.cgroup.devices.deny = a
lxc.cgroup.devices.allow = c 1:3 rwm
lxc.cgroup.devices.allow = c 1:5 rwm
lxc.cgroup.devices.allow = c 5:1 rwm
lxc.cgroup.devices.allow = c 5:0 rwm
lxc.cgroup.devices.allow = c 4:0 rwm
lxc.cgroup.devices.allow = c 4:1 rwm
lxc.cgroup.devices.allow = c 1:9 rwm
lxc.cgroup.devices.allow = c 1:8 rwm
lxc.cgroup.devices.allow = c 136:* rwm
lxc.cgroup.devices.allow = c 5:2 rwm
lxc.cgroup.devices.allow = c 10:200 rwm

# network configuration
lxc.network.type = veth
lxc.network.flags = up
lxc.network.link = lxcbr0
lxc.network.name = eth0
lxc.network.mtu = 1500
lxc.network.ipv4 = 10.0.3.42/24

# root filesystem
lxc.rootfs = /containers/abc123/rootfs

# mounts
lxc.mount.entry = proc /containers/abc123/rootfs/proc proc nosuid,nodev,noexec 0 0
lxc.mount.entry = sysfs /containers/abc123/rootfs/sys sysfs nosuid,nodev,noexec 0 0
lxc.mount.entry = devpts /containers/abc123/rootfs/dev/pts devpts newinstance,ptmxmode=0666,nosuid,noexec 0 0
lxc.mount.entry = /usr/bin/dockyard /containers/abc123/rootfs/sbin/init none bind,ro 0 0
lxc.mount.entry = {} /containers/abc123/rootfs/etc/resolv.conf none bind,ro 0 0

# capabilities
lxc.cap.drop = audit_control audit_write mac_admin mac_override mknod setfcap setpcap sys_admin sys_boot sys_module sys_nice sys_pacct sys_rawio sys_resource sys_time sys_tty_config

# limits
lxc.cgroup.memory.limit_in_bytes = 512
lxc.cgroup.memory.soft_limit_in_bytes = 512
lxc.cgroup.memory.memsw.limit_in_bytes = 1024
",
        state.display()
    );

    assert_eq!(text, expected);
}

#[test]
fn host_resolv_conf_is_mounted_when_clean() {
    let dir = tempfile::tempdir().expect("tempdir");
    let startup = startup(dir.path(), "nameserver 9.9.9.9\n");
    let host = dir.path().join("resolv.conf");

    let config = startup.render(&descriptor("abc123", 0));
    let Some(Value::Mount(entry)) = config.values(Key::MountEntry).last() else {
        panic!("no mount entries");
    };
    assert_eq!(entry.source, host);
    assert_eq!(entry.target, PathBuf::from("/containers/abc123/rootfs/etc/resolv.conf"));
}

#[test]
fn repeated_renders_are_identical() {
    let dir = tempfile::tempdir().expect("tempdir");
    let startup = startup(dir.path(), "nameserver 127.0.1.1\n");
    let desc = descriptor("abc123", 256);

    let first = startup.render(&desc).to_string();
    for _ in 0..10 {
        assert_eq!(startup.render(&desc).to_string(), first);
    }
}

#[test]
fn concurrent_renders_match_sequential() {
    let dir = tempfile::tempdir().expect("tempdir");
    let startup = Arc::new(startup(dir.path(), "nameserver 127.0.1.1\n"));

    let ids: Vec<String> = (0..16).map(|i| format!("c{i:02}")).collect();
    let expected: Vec<String> = ids
        .iter()
        .map(|id| startup.render(&descriptor(id, 128)).to_string())
        .collect();

    let rendered: Vec<String> = std::thread::scope(|scope| {
        let handles: Vec<_> = ids
            .iter()
            .map(|id| {
                let startup = Arc::clone(&startup);
                scope.spawn(move || startup.render(&descriptor(id, 128)).to_string())
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("render thread"))
            .collect()
    });

    assert_eq!(rendered, expected);
}

#[test]
fn invalid_template_options_fail_startup() {
    let dir = tempfile::tempdir().expect("tempdir");
    let host = dir.path().join("resolv.conf");
    std::fs::write(&host, "nameserver 1.1.1.1\n").expect("write");

    let mut config = HostConfig::builder()
        .resolv_conf_path(host)
        .state_dir(dir.path().join("state"))
        .build();
    config.template.cap_drop.push("not_a_capability".into());
    let bridge: Ipv4Network = "10.0.3.1/24".parse().expect("cidr");

    assert!(Startup::run(&config, &bridge).is_err());
}

/// Answers only for one interface name
struct OnlyBridge(&'static str);

impl BridgeNetwork for OnlyBridge {
    fn bridge_network(&self, iface: &str) -> dockyard_core::Result<Ipv4Network> {
        if iface == self.0 {
            Ok("172.17.0.1/16".parse()?)
        } else {
            Err(DockyardError::InterfaceNotFound(iface.to_owned()))
        }
    }
}

#[test]
fn configured_bridge_drives_lookup_and_link() {
    let dir = tempfile::tempdir().expect("tempdir");
    let host = dir.path().join("resolv.conf");
    std::fs::write(&host, "nameserver 127.0.0.53\n").expect("write");
    let config_path = dir.path().join("dockyard.json");
    let json = serde_json::json!({
        "resolv_conf_path": host,
        "state_dir": dir.path().join("state"),
        "bridge": "docker0",
    });
    std::fs::write(&config_path, json.to_string()).expect("write config");

    let config = HostConfig::from_file(&config_path).expect("load config");
    let startup = Startup::run(&config, &OnlyBridge("docker0")).expect("startup");
    let rendered = startup.render(&descriptor("abc123", 0));

    assert_eq!(rendered.get(Key::NetworkLink), Some(&Value::Text("docker0".into())));
    let written = std::fs::read_to_string(startup.resolv().path()).expect("read");
    assert_eq!(written, "nameserver 172.17.0.0\n");
}
