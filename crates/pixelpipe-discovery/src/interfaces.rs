//! Local IPv4 interfaces and their broadcast addresses

use std::net::Ipv4Addr;

use network_interface::{NetworkInterface, NetworkInterfaceConfig};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceInfo {
    pub name: String,
    pub ip: Ipv4Addr,
    pub prefix_len: u8,
    pub broadcast: Ipv4Addr,
}

/// Broadcast address of the subnet `ip/prefix_len`
pub fn broadcast_for(ip: Ipv4Addr, prefix_len: u8) -> Ipv4Addr {
    let mask = if prefix_len == 0 {
        0
    } else {
        !0u32 << (32 - prefix_len.min(32) as u32)
    };
    Ipv4Addr::from(u32::from(ip) | !mask)
}

/// Non-loopback IPv4 interfaces
pub fn list_interfaces() -> Vec<InterfaceInfo> {
    let mut found = Vec::new();

    let interfaces = match NetworkInterface::show() {
        Ok(interfaces) => interfaces,
        Err(e) => {
            debug!(error = %e, "Could not list network interfaces");
            return found;
        }
    };

    for iface in interfaces {
        for addr in &iface.addr {
            if let network_interface::Addr::V4(v4) = addr {
                if v4.ip.is_loopback() {
                    continue;
                }
                let prefix_len = v4.netmask.map(|m| u32::from(m).count_ones() as u8).unwrap_or(24);
                let broadcast = v4
                    .broadcast
                    .unwrap_or_else(|| broadcast_for(v4.ip, prefix_len));
                found.push(InterfaceInfo {
                    name: iface.name.clone(),
                    ip: v4.ip,
                    prefix_len,
                    broadcast,
                });
            }
        }
    }

    found
}

/// Distinct broadcast addresses of every usable interface
///
/// Falls back to the limited broadcast address when nothing is found.
pub fn broadcast_addresses() -> Vec<Ipv4Addr> {
    let mut addrs: Vec<Ipv4Addr> = Vec::new();
    for iface in list_interfaces() {
        if !addrs.contains(&iface.broadcast) {
            debug!(interface = %iface.name, broadcast = %iface.broadcast, "Broadcast target");
            addrs.push(iface.broadcast);
        }
    }
    if addrs.is_empty() {
        addrs.push(Ipv4Addr::BROADCAST);
    }
    addrs
}
