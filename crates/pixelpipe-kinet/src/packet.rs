//! KiNET packet encoding and decoding
//!
//! ## Wire Format
//!
//! Every packet starts with the same 12-byte header, little-endian:
//!
//! ```text
//! magic    u32   0x4ADC0104
//! version  u16
//! type     u16   see PacketType
//! seqnum   u32
//! ```
//!
//! followed by a type-specific payload. Fields are written one at a time
//! with explicit widths; nothing here relies on struct layout.

use std::net::Ipv4Addr;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{KinetError, Result};

pub const KINET_MAGIC: u32 = 0x4ADC_0104;

/// UDP port every KiNET supply listens on
pub const KINET_PORT: u16 = 6038;

/// Header version written on outgoing packets
pub const KINET_VERSION: u16 = 0x0001;

pub const HEADER_LEN: usize = 12;

/// PortOut header length including the common header
pub const PORT_OUT_HEADER_LEN: usize = HEADER_LEN + 12;

/// DmxOut header length including the common header
pub const DMX_OUT_HEADER_LEN: usize = HEADER_LEN + 9;

/// DmxOut always carries a full DMX universe
pub const DMX_DATA_LEN: usize = 512;

/// Fixed part of a DiscoverReply after the header
pub const DISCOVER_REPLY_FIXED_LEN: usize = 20;

/// Longest name SetName carries, not counting the terminating NUL
pub const MAX_NAME_LEN: usize = 31;

#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    Discover = 0x0001,
    DiscoverReply = 0x0002,
    SetIp = 0x0003,
    SetUniverse = 0x0005,
    SetName = 0x0006,
    PortInfo = 0x000A,
    PortInfoReply = 0x000B,
    /// Version 1 frame push
    DmxOut = 0x0101,
    /// Version 2 frame push
    PortOut = 0x0108,
    /// Version 2 latch
    PortOutSync = 0x0109,
    BlinkScan1 = 0x0201,
    BlinkScan1Reply = 0x0202,
    BlinkScan1ChromasicReply = 0x0206,
    BlinkScan2 = 0x0207,
    BlinkScan2Reply = 0x0208,
}

impl PacketType {
    pub fn from_u16(value: u16) -> Result<Self> {
        use PacketType::*;
        Ok(match value {
            0x0001 => Discover,
            0x0002 => DiscoverReply,
            0x0003 => SetIp,
            0x0005 => SetUniverse,
            0x0006 => SetName,
            0x000A => PortInfo,
            0x000B => PortInfoReply,
            0x0101 => DmxOut,
            0x0108 => PortOut,
            0x0109 => PortOutSync,
            0x0201 => BlinkScan1,
            0x0202 => BlinkScan1Reply,
            0x0206 => BlinkScan1ChromasicReply,
            0x0207 => BlinkScan2,
            0x0208 => BlinkScan2Reply,
            other => return Err(KinetError::UnknownType(other)),
        })
    }

    pub fn to_u16(self) -> u16 {
        self as u16
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u16,
    pub kind: PacketType,
    pub seq: u32,
}

impl Header {
    pub fn new(kind: PacketType) -> Self {
        Self {
            version: KINET_VERSION,
            kind,
            seq: 0,
        }
    }

    pub fn with_seq(mut self, seq: u32) -> Self {
        self.seq = seq;
        self
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32_le(KINET_MAGIC);
        buf.put_u16_le(self.version);
        buf.put_u16_le(self.kind.to_u16());
        buf.put_u32_le(self.seq);
    }

    /// Read a header, leaving `buf` at the start of the payload
    pub fn decode(buf: &mut &[u8]) -> Result<Self> {
        ensure_len(buf, HEADER_LEN)?;
        let magic = buf.get_u32_le();
        if magic != KINET_MAGIC {
            return Err(KinetError::BadMagic(magic));
        }
        let version = buf.get_u16_le();
        let kind = PacketType::from_u16(buf.get_u16_le())?;
        let seq = buf.get_u32_le();
        Ok(Self { version, kind, seq })
    }
}

fn ensure_len(buf: &[u8], expected: usize) -> Result<()> {
    if buf.len() < expected {
        return Err(KinetError::TooShort {
            expected,
            actual: buf.len(),
        });
    }
    Ok(())
}

fn expect_kind(header: &Header, expected: PacketType) -> Result<()> {
    if header.kind != expected {
        return Err(KinetError::UnexpectedType {
            expected,
            actual: header.kind,
        });
    }
    Ok(())
}

/// Header-only request (Discover, BlinkScan1, BlinkScan2, PortInfo)
pub fn encode_request(kind: PacketType, seq: u32) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN);
    Header::new(kind).with_seq(seq).encode(&mut buf);
    buf.freeze()
}

/// Version 2 frame: PortOut header followed by exactly `rgb.len()` bytes
pub fn encode_port_out(port: u8, universe: u32, rgb: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(PORT_OUT_HEADER_LEN + rgb.len());
    Header::new(PacketType::PortOut).encode(&mut buf);
    buf.put_u32_le(universe);
    buf.put_u8(port);
    buf.put_u8(0); // pad
    buf.put_u16_le(0); // flags
    buf.put_u16_le(rgb.len() as u16);
    buf.put_u16_le(0); // start code
    buf.put_slice(rgb);
    buf.freeze()
}

/// Version 2 latch telling a supply to show what PortOut delivered
pub fn encode_port_out_sync() -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + 4);
    Header::new(PacketType::PortOutSync).encode(&mut buf);
    buf.put_u32_le(0); // pad
    buf.freeze()
}

/// Version 1 frame: DmxOut header and a 512-byte universe, zero padded
pub fn encode_dmx_out(universe: u32, rgb: &[u8]) -> Bytes {
    let data = &rgb[..rgb.len().min(DMX_DATA_LEN)];
    let mut buf = BytesMut::with_capacity(DMX_OUT_HEADER_LEN + DMX_DATA_LEN);
    Header::new(PacketType::DmxOut).encode(&mut buf);
    buf.put_u8(0); // unused (port on some firmware)
    buf.put_u8(0); // flags
    buf.put_u16_le(0); // timer
    buf.put_u32_le(universe);
    buf.put_u8(0); // start code
    buf.put_slice(data);
    buf.put_bytes(0, DMX_DATA_LEN - data.len());
    buf.freeze()
}

pub fn encode_set_universe(universe: u32) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + 4);
    Header::new(PacketType::SetUniverse).encode(&mut buf);
    buf.put_u32_le(universe);
    buf.freeze()
}

/// Name is truncated to [`MAX_NAME_LEN`] bytes and NUL padded to 32
pub fn encode_set_name(name: &str) -> Bytes {
    let bytes = &name.as_bytes()[..name.len().min(MAX_NAME_LEN)];
    let mut buf = BytesMut::with_capacity(HEADER_LEN + MAX_NAME_LEN + 1);
    Header::new(PacketType::SetName).encode(&mut buf);
    buf.put_slice(bytes);
    buf.put_bytes(0, MAX_NAME_LEN + 1 - bytes.len());
    buf.freeze()
}

/// Assign `ip` to the supply with hardware address `mac`
pub fn encode_set_ip(mac: [u8; 6], ip: Ipv4Addr) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + 10);
    Header::new(PacketType::SetIp).encode(&mut buf);
    buf.put_slice(&mac);
    buf.put_slice(&ip.octets());
    buf.freeze()
}

/// Answer to a broadcast Discover
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoverReply {
    pub ip: Ipv4Addr,
    pub mac: [u8; 6],
    pub kinet_version: u16,
    pub serial: u32,
    pub universe: u32,
    /// Multi-line firmware/info blob
    pub info: String,
    pub name: String,
}

impl DiscoverReply {
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut buf = data;
        let header = Header::decode(&mut buf)?;
        expect_kind(&header, PacketType::DiscoverReply)?;
        ensure_len(buf, DISCOVER_REPLY_FIXED_LEN)?;

        let mut octets = [0u8; 4];
        buf.copy_to_slice(&mut octets);
        let mut mac = [0u8; 6];
        buf.copy_to_slice(&mut mac);
        let kinet_version = buf.get_u16_le();
        let serial = buf.get_u32_le();
        let universe = buf.get_u32_le();

        let mut strings = buf.split(|b| *b == 0);
        let info = strings.next().map(lossy).unwrap_or_default();
        let name = strings.next().map(lossy).unwrap_or_default();

        Ok(Self {
            ip: Ipv4Addr::from(octets),
            mac,
            kinet_version,
            serial,
            universe,
            info,
            name,
        })
    }

    /// Encode, as a supply would; used for loopback tests and simulators
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(
            HEADER_LEN + DISCOVER_REPLY_FIXED_LEN + self.info.len() + self.name.len() + 2,
        );
        Header::new(PacketType::DiscoverReply).encode(&mut buf);
        buf.put_slice(&self.ip.octets());
        buf.put_slice(&self.mac);
        buf.put_u16_le(self.kinet_version);
        buf.put_u32_le(self.serial);
        buf.put_u32_le(self.universe);
        buf.put_slice(self.info.as_bytes());
        buf.put_u8(0);
        buf.put_slice(self.name.as_bytes());
        buf.put_u8(0);
        buf.freeze()
    }

    pub fn mac_string(&self) -> String {
        self.mac
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(":")
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Version 1 enumeration answer: light counts on the four fixed ports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlinkScan1Reply {
    /// Reply came back as the Chromasic variant
    pub chromasic: bool,
    pub counts: [u16; 4],
}

impl BlinkScan1Reply {
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut buf = data;
        let header = Header::decode(&mut buf)?;
        let chromasic = match header.kind {
            PacketType::BlinkScan1Reply => false,
            PacketType::BlinkScan1ChromasicReply => true,
            other => {
                return Err(KinetError::UnexpectedType {
                    expected: PacketType::BlinkScan1Reply,
                    actual: other,
                })
            }
        };
        ensure_len(buf, 8)?;
        let mut counts = [0u16; 4];
        for count in &mut counts {
            *count = buf.get_u16_le();
        }
        Ok(Self { chromasic, counts })
    }

    pub fn encode(&self) -> Bytes {
        let kind = if self.chromasic {
            PacketType::BlinkScan1ChromasicReply
        } else {
            PacketType::BlinkScan1Reply
        };
        let mut buf = BytesMut::with_capacity(HEADER_LEN + 8);
        Header::new(kind).encode(&mut buf);
        for count in self.counts {
            buf.put_u16_le(count);
        }
        buf.freeze()
    }
}

/// One record of a version 2 enumeration answer
///
/// A supply answers BlinkScan2 with a Start record, one Data record per
/// port, and an End record, each in its own datagram:
///
/// ```text
/// record     u8    0 start, 1 data, 2 end
/// port       u8
/// port_type  u16
/// lights     u16
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanRecord {
    Start,
    Data { port: u8, port_type: u16, lights: u16 },
    End,
}

impl ScanRecord {
    pub const LEN: usize = 6;

    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut buf = data;
        let header = Header::decode(&mut buf)?;
        expect_kind(&header, PacketType::BlinkScan2Reply)?;
        ensure_len(buf, Self::LEN)?;
        let record = buf.get_u8();
        let port = buf.get_u8();
        let port_type = buf.get_u16_le();
        let lights = buf.get_u16_le();
        match record {
            0 => Ok(Self::Start),
            1 => Ok(Self::Data {
                port,
                port_type,
                lights,
            }),
            2 => Ok(Self::End),
            other => Err(KinetError::BadRecord(other)),
        }
    }

    pub fn encode(&self) -> Bytes {
        let (record, port, port_type, lights) = match *self {
            Self::Start => (0, 0, 0, 0),
            Self::Data {
                port,
                port_type,
                lights,
            } => (1, port, port_type, lights),
            Self::End => (2, 0, 0, 0),
        };
        let mut buf = BytesMut::with_capacity(HEADER_LEN + Self::LEN);
        Header::new(PacketType::BlinkScan2Reply).encode(&mut buf);
        buf.put_u8(record);
        buf.put_u8(port);
        buf.put_u16_le(port_type);
        buf.put_u16_le(lights);
        buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_encoding() {
        let packet = encode_request(PacketType::Discover, 7);
        assert_eq!(
            packet.as_ref(),
            &[0x04, 0x01, 0xDC, 0x4A, 0x01, 0x00, 0x01, 0x00, 0x07, 0x00, 0x00, 0x00]
        );
        let mut buf = packet.as_ref();
        let header = Header::decode(&mut buf).unwrap();
        assert_eq!(header.kind, PacketType::Discover);
        assert_eq!(header.seq, 7);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_port_out_layout() {
        let rgb = vec![0xAB; 150];
        let packet = encode_port_out(1, 0, &rgb);
        assert_eq!(packet.len(), 24 + 150);
        assert_eq!(
            &packet[..24],
            &[
                0x04, 0x01, 0xDC, 0x4A, // magic
                0x01, 0x00, // version
                0x08, 0x01, // type
                0x00, 0x00, 0x00, 0x00, // seqnum
                0x00, 0x00, 0x00, 0x00, // universe
                0x01, // port
                0x00, // pad
                0x00, 0x00, // flags
                0x96, 0x00, // len
                0x00, 0x00, // start code
            ]
        );
        assert!(packet[24..].iter().all(|b| *b == 0xAB));
    }

    #[test]
    fn test_dmx_out_is_padded() {
        let packet = encode_dmx_out(3, &[1, 2, 3]);
        assert_eq!(packet.len(), DMX_OUT_HEADER_LEN + DMX_DATA_LEN);
        assert_eq!(&packet[6..8], &[0x01, 0x01]);
        assert_eq!(&packet[16..20], &[3, 0, 0, 0]);
        assert_eq!(packet[20], 0);
        assert_eq!(&packet[21..24], &[1, 2, 3]);
        assert!(packet[24..].iter().all(|b| *b == 0));

        let oversized = encode_dmx_out(0, &[9; 600]);
        assert_eq!(oversized.len(), DMX_OUT_HEADER_LEN + DMX_DATA_LEN);
    }

    #[test]
    fn test_unknown_type_and_bad_magic() {
        let mut bytes = encode_request(PacketType::Discover, 0).to_vec();
        bytes[6] = 0x77;
        assert!(matches!(
            Header::decode(&mut bytes.as_slice()),
            Err(KinetError::UnknownType(0x0077))
        ));
        bytes[0] = 0;
        assert!(matches!(
            Header::decode(&mut bytes.as_slice()),
            Err(KinetError::BadMagic(_))
        ));
        assert!(matches!(
            Header::decode(&mut &bytes[..5]),
            Err(KinetError::TooShort { .. })
        ));
    }

    #[test]
    fn test_decode_discover_reply_from_bytes() {
        let mut bytes = vec![
            0x04, 0x01, 0xDC, 0x4A, 0x01, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];
        bytes.extend_from_slice(&[10, 0, 0, 5]); // ip
        bytes.extend_from_slice(&[0x00, 0x0a, 0xc5, 0x01, 0x02, 0x03]); // mac
        bytes.extend_from_slice(&[0x02, 0x00]); // kinet version
        bytes.extend_from_slice(&[0x39, 0x30, 0x00, 0x00]); // serial
        bytes.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]); // universe
        bytes.extend_from_slice(b"PDS-150e\nrev 3\0stage-left\0");

        let reply = DiscoverReply::decode(&bytes).unwrap();
        assert_eq!(reply.ip, Ipv4Addr::new(10, 0, 0, 5));
        assert_eq!(reply.mac_string(), "00:0a:c5:01:02:03");
        assert_eq!(reply.kinet_version, 2);
        assert_eq!(reply.serial, 12345);
        assert_eq!(reply.info, "PDS-150e\nrev 3");
        assert_eq!(reply.name, "stage-left");
        assert_eq!(DiscoverReply::decode(&reply.encode()).unwrap(), reply);
    }

    #[test]
    fn test_discover_reply_without_strings() {
        let reply = DiscoverReply {
            ip: Ipv4Addr::new(192, 168, 1, 20),
            mac: [1, 2, 3, 4, 5, 6],
            kinet_version: 1,
            serial: 1,
            universe: 0,
            info: String::new(),
            name: String::new(),
        };
        let bytes = reply.encode();
        let fixed = &bytes[..HEADER_LEN + DISCOVER_REPLY_FIXED_LEN];
        let decoded = DiscoverReply::decode(fixed).unwrap();
        assert_eq!(decoded.name, "");

        assert!(matches!(
            DiscoverReply::decode(&bytes[..HEADER_LEN + 10]),
            Err(KinetError::TooShort { .. })
        ));
        assert!(matches!(
            DiscoverReply::decode(&encode_request(PacketType::Discover, 0)),
            Err(KinetError::UnexpectedType { .. })
        ));
    }

    #[test]
    fn test_blink_scan1_reply() {
        let mut bytes = vec![
            0x04, 0x01, 0xDC, 0x4A, 0x01, 0x00, 0x06, 0x02, 0x00, 0x00, 0x00, 0x00,
        ];
        bytes.extend_from_slice(&[50, 0, 25, 0, 0, 0, 0, 1]);
        let reply = BlinkScan1Reply::decode(&bytes).unwrap();
        assert!(reply.chromasic);
        assert_eq!(reply.counts, [50, 25, 0, 256]);
    }

    #[test]
    fn test_scan_records() {
        let data = ScanRecord::Data {
            port: 3,
            port_type: 1,
            lights: 100,
        };
        let bytes = data.encode();
        assert_eq!(&bytes[HEADER_LEN..], &[1, 3, 1, 0, 100, 0]);
        assert_eq!(ScanRecord::decode(&bytes).unwrap(), data);
        assert_eq!(
            ScanRecord::decode(&ScanRecord::End.encode()).unwrap(),
            ScanRecord::End
        );

        let mut bad = ScanRecord::Start.encode().to_vec();
        bad[HEADER_LEN] = 9;
        assert!(matches!(
            ScanRecord::decode(&bad),
            Err(KinetError::BadRecord(9))
        ));
    }

    #[test]
    fn test_set_name_and_universe() {
        let packet = encode_set_name("a-very-long-name-that-will-not-fit-in-32");
        assert_eq!(packet.len(), HEADER_LEN + 32);
        assert_eq!(packet[HEADER_LEN + 31], 0);

        let packet = encode_set_universe(0x0102_0304);
        assert_eq!(&packet[HEADER_LEN..], &[4, 3, 2, 1]);

        let packet = encode_set_ip([1, 2, 3, 4, 5, 6], Ipv4Addr::new(10, 0, 0, 9));
        assert_eq!(&packet[HEADER_LEN..], &[1, 2, 3, 4, 5, 6, 10, 0, 0, 9]);
    }
}
