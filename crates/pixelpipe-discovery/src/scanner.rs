//! Broadcast discovery and per-supply port enumeration

use std::collections::HashSet;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use anyhow::{Context, Result};
use pixelpipe_kinet::packet::{
    encode_request, BlinkScan1Reply, DiscoverReply, PacketType, ScanRecord,
};
use pixelpipe_kinet::{DeviceAddr, ProtocolVersion, KINET_PORT, MAX_PIXEL_COUNT};
use serde::{Deserialize, Serialize};
use tokio::net::UdpSocket;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::interfaces::broadcast_addresses;

/// Largest datagram a supply sends
const RECV_BUF_LEN: usize = 2048;

/// Scanner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Where to send Discover; every interface's broadcast address when unset
    pub broadcast: Option<Ipv4Addr>,
    /// UDP port supplies listen on
    pub port: u16,
    /// How long to wait for replies, per phase
    pub timeout_ms: u64,
    /// Ask each supply for its ports after discovery
    pub enumerate: bool,
    /// Pixel count used when a supply reports nothing usable
    pub default_count: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            broadcast: None,
            port: KINET_PORT,
            timeout_ms: 250,
            enumerate: true,
            default_count: pixelpipe_kinet::DEFAULT_PIXEL_COUNT,
        }
    }
}

impl ScannerConfig {
    fn window(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// One output port reported by enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortCount {
    pub port: u8,
    pub port_type: u16,
    pub lights: u16,
}

/// A supply that answered discovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredDevice {
    pub ip: Ipv4Addr,
    pub mac: String,
    pub kinet_version: u16,
    pub serial: u32,
    pub universe: u32,
    pub name: String,
    pub info: String,
    /// Empty until enumerated
    pub ports: Vec<PortCount>,
}

impl DiscoveredDevice {
    pub fn from_reply(reply: &DiscoverReply) -> Self {
        Self {
            ip: reply.ip,
            mac: reply.mac_string(),
            kinet_version: reply.kinet_version,
            serial: reply.serial,
            universe: reply.universe,
            name: reply.name.clone(),
            info: reply.info.clone(),
            ports: Vec::new(),
        }
    }

    /// Frame protocol the supply speaks; anything past 1 is treated as V2
    pub fn protocol(&self) -> ProtocolVersion {
        if self.kinet_version <= 1 {
            ProtocolVersion::V1
        } else {
            ProtocolVersion::V2
        }
    }

    /// Device addresses to drive this supply with
    ///
    /// V1 supplies have one logical output sized to the sum of their port
    /// counts. V2 supplies get one address per port with lights. Without
    /// enumeration data a single address of `default_count` pixels is used.
    /// The supply's universe is not carried over: the device-string grammar
    /// has no place for it, so frames always go out on universe 0.
    pub fn addresses(&self, default_count: usize) -> Vec<DeviceAddr> {
        let clamp = |n: usize| n.clamp(1, MAX_PIXEL_COUNT);
        let default_count = clamp(default_count);

        match self.protocol() {
            ProtocolVersion::V1 => {
                let total: usize = self.ports.iter().map(|p| p.lights as usize).sum();
                let count = if total == 0 { default_count } else { clamp(total) };
                vec![DeviceAddr::v1(self.ip, count)]
            }
            ProtocolVersion::V2 => {
                let mut addrs: Vec<DeviceAddr> = self
                    .ports
                    .iter()
                    .filter(|p| p.lights > 0 && p.port > 0)
                    .map(|p| DeviceAddr::v2(self.ip, p.port, clamp(p.lights as usize)))
                    .collect();
                if addrs.is_empty() {
                    addrs.push(DeviceAddr::v2(self.ip, 1, default_count));
                }
                addrs
            }
        }
    }
}

/// Descriptor driving every discovered supply, `None` when nothing answered
///
/// Several addresses become a list so the builder's combo options apply.
pub fn descriptor_for(devices: &[DiscoveredDevice], default_count: usize) -> Option<String> {
    let stages: Vec<String> = devices
        .iter()
        .flat_map(|d| d.addresses(default_count))
        .map(|a| format!("ck:{}", a))
        .collect();
    match stages.as_slice() {
        [] => None,
        [single] => Some(single.clone()),
        _ => Some(format!("[{}]", stages.join(", "))),
    }
}

/// Broadcast Discover and collect replies until the window closes
pub async fn discover(config: &ScannerConfig) -> Result<Vec<DiscoverReply>> {
    let socket = UdpSocket::bind("0.0.0.0:0")
        .await
        .context("Failed to bind discovery socket")?;
    socket
        .set_broadcast(true)
        .context("Failed to enable broadcast")?;

    let targets = match config.broadcast {
        Some(addr) => vec![addr],
        None => broadcast_addresses(),
    };

    let request = encode_request(PacketType::Discover, 0);
    for target in &targets {
        let dest = SocketAddr::from((*target, config.port));
        debug!(target = %dest, "Sending Discover");
        if let Err(e) = socket.send_to(&request, dest).await {
            warn!(target = %dest, error = %e, "Failed to send Discover");
        }
    }

    let deadline = Instant::now() + config.window();
    let mut buf = vec![0u8; RECV_BUF_LEN];
    let mut seen = HashSet::new();
    let mut replies = Vec::new();

    loop {
        let (len, from) = match timeout_at(deadline, socket.recv_from(&mut buf)).await {
            Err(_) => break,
            Ok(Err(e)) => {
                warn!(error = %e, "Discovery receive failed");
                break;
            }
            Ok(Ok(received)) => received,
        };

        match DiscoverReply::decode(&buf[..len]) {
            Ok(reply) => {
                if seen.insert((reply.ip, reply.mac)) {
                    info!(
                        ip = %reply.ip,
                        mac = %reply.mac_string(),
                        version = reply.kinet_version,
                        name = %reply.name,
                        "Found KiNET supply"
                    );
                    replies.push(reply);
                }
            }
            Err(e) => debug!(from = %from, error = %e, "Ignoring datagram"),
        }
    }

    Ok(replies)
}

/// Ask one supply which ports it has and how many lights are on each
///
/// Version 1 supplies answer once with four counts. Version 2 supplies
/// stream Start, Data and End records; whatever arrived before the window
/// closes is returned.
pub async fn enumerate(
    ip: Ipv4Addr,
    version: ProtocolVersion,
    config: &ScannerConfig,
) -> Result<Vec<PortCount>> {
    let socket = UdpSocket::bind("0.0.0.0:0")
        .await
        .context("Failed to bind enumeration socket")?;
    let target = SocketAddr::from((ip, config.port));

    let request = match version {
        ProtocolVersion::V1 => encode_request(PacketType::BlinkScan1, 0),
        ProtocolVersion::V2 => encode_request(PacketType::BlinkScan2, 0),
    };
    socket
        .send_to(&request, target)
        .await
        .with_context(|| format!("Failed to send BlinkScan to {}", target))?;

    let deadline = Instant::now() + config.window();
    let mut buf = vec![0u8; RECV_BUF_LEN];
    let mut ports = Vec::new();

    loop {
        let (len, from) = match timeout_at(deadline, socket.recv_from(&mut buf)).await {
            Err(_) => {
                debug!(ip = %ip, ports = ports.len(), "Enumeration window closed");
                break;
            }
            Ok(Err(e)) => {
                warn!(ip = %ip, error = %e, "Enumeration receive failed");
                break;
            }
            Ok(Ok(received)) => received,
        };
        if from.ip() != target.ip() {
            continue;
        }
        let data = &buf[..len];

        match version {
            ProtocolVersion::V1 => match BlinkScan1Reply::decode(data) {
                Ok(reply) => {
                    ports.extend(reply.counts.iter().enumerate().map(|(i, &lights)| {
                        PortCount {
                            port: i as u8 + 1,
                            port_type: 0,
                            lights,
                        }
                    }));
                    break;
                }
                Err(e) => debug!(ip = %ip, error = %e, "Ignoring datagram"),
            },
            ProtocolVersion::V2 => match ScanRecord::decode(data) {
                Ok(ScanRecord::Start) => ports.clear(),
                Ok(ScanRecord::Data {
                    port,
                    port_type,
                    lights,
                }) => ports.push(PortCount {
                    port,
                    port_type,
                    lights,
                }),
                Ok(ScanRecord::End) => break,
                Err(e) => debug!(ip = %ip, error = %e, "Ignoring datagram"),
            },
        }
    }

    Ok(ports)
}

/// Discover supplies and, when configured, enumerate each one
pub async fn scan(config: &ScannerConfig) -> Result<Vec<DiscoveredDevice>> {
    let replies = discover(config).await?;
    let mut devices: Vec<DiscoveredDevice> =
        replies.iter().map(DiscoveredDevice::from_reply).collect();

    if config.enumerate {
        for device in &mut devices {
            match enumerate(device.ip, device.protocol(), config).await {
                Ok(ports) => device.ports = ports,
                Err(e) => warn!(ip = %device.ip, error = %e, "Enumeration failed"),
            }
        }
    }

    info!(found = devices.len(), "Discovery complete");
    Ok(devices)
}

/// Run [`scan`] to completion on a single-threaded runtime
pub fn scan_blocking(config: &ScannerConfig) -> Result<Vec<DiscoveredDevice>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start discovery runtime")?;
    runtime.block_on(scan(config))
}
