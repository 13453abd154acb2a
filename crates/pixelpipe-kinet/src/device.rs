//! Device identity and the `ip[/port][(count)]` device-string grammar

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::error::KinetError;

/// Pixel count when a device string has no `(count)`
pub const DEFAULT_PIXEL_COUNT: usize = 50;

/// Largest pixel count a single device string may name
pub const MAX_PIXEL_COUNT: usize = 256;

/// Which frame packet a supply understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolVersion {
    /// One logical output, frames sent as DmxOut
    V1,
    /// Per-port addressing, frames sent as PortOut
    V2,
}

impl ProtocolVersion {
    pub fn number(self) -> u8 {
        match self {
            Self::V1 => 1,
            Self::V2 => 2,
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.number())
    }
}

/// Where one string of lights lives on the network
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceAddr {
    pub ip: Ipv4Addr,
    pub version: ProtocolVersion,
    /// Output port on the supply, 0 for V1
    pub port: u8,
    pub count: usize,
    pub universe: u32,
}

impl DeviceAddr {
    pub fn v1(ip: Ipv4Addr, count: usize) -> Self {
        Self {
            ip,
            version: ProtocolVersion::V1,
            port: 0,
            count,
            universe: 0,
        }
    }

    pub fn v2(ip: Ipv4Addr, port: u8, count: usize) -> Self {
        Self {
            ip,
            version: ProtocolVersion::V2,
            port,
            count,
            universe: 0,
        }
    }
}

impl FromStr for DeviceAddr {
    type Err = KinetError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let s = input.trim();

        let (rest, count) = match s.strip_suffix(')') {
            Some(head) => {
                let open = head
                    .rfind('(')
                    .ok_or_else(|| KinetError::invalid_device(input, "unbalanced ')'"))?;
                let count = parse_count(input, &head[open + 1..])?;
                (&head[..open], count)
            }
            None => {
                if s.contains('(') {
                    return Err(KinetError::invalid_device(input, "missing ')'"));
                }
                (s, DEFAULT_PIXEL_COUNT)
            }
        };

        let (ip, port) = match rest.split_once('/') {
            Some((ip, port)) => (ip, Some(port)),
            None => (rest, None),
        };

        let ip: Ipv4Addr = ip
            .trim()
            .parse()
            .map_err(|_| KinetError::invalid_device(input, format!("bad IPv4 address '{}'", ip)))?;

        match port {
            Some(port) => {
                let port = port
                    .trim()
                    .parse::<u8>()
                    .ok()
                    .filter(|p| *p >= 1)
                    .ok_or_else(|| {
                        KinetError::invalid_device(input, format!("bad port '{}'", port))
                    })?;
                Ok(Self::v2(ip, port, count))
            }
            None => Ok(Self::v1(ip, count)),
        }
    }
}

fn parse_count(input: &str, text: &str) -> Result<usize, KinetError> {
    text.trim()
        .parse::<usize>()
        .ok()
        .filter(|n| (1..=MAX_PIXEL_COUNT).contains(n))
        .ok_or_else(|| {
            KinetError::invalid_device(
                input,
                format!("count '{}' must be 1-{}", text, MAX_PIXEL_COUNT),
            )
        })
}

impl fmt::Display for DeviceAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.version {
            ProtocolVersion::V1 => write!(f, "{}({})", self.ip, self.count),
            ProtocolVersion::V2 => write!(f, "{}/{}({})", self.ip, self.port, self.count),
        }
    }
}
