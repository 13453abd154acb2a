//! The `ck` device: one string of lights on a KiNET supply

use bytes::Bytes;
use pixelpipe_core::{Error, FrameBuffer, PixelStore, Result, RgbColor};
use tracing::warn;

use crate::device::{DeviceAddr, ProtocolVersion};
use crate::error::KinetError;
use crate::packet::{self, KINET_PORT};
use crate::transport::UdpLink;

/// Leaf node that ships its pixels to a supply on every flush
///
/// V1 addresses get a single DmxOut datagram, V2 addresses a PortOut
/// datagram, optionally followed by PortOutSync.
#[derive(Debug)]
pub struct CkDevice {
    addr: DeviceAddr,
    pixels: PixelStore,
    link: UdpLink,
    sync: bool,
    last_error: Option<String>,
}

impl CkDevice {
    pub fn new(addr: DeviceAddr) -> Self {
        Self::with_udp_port(addr, KINET_PORT)
    }

    /// Send to a port other than 6038, for simulators and loopback tests
    pub fn with_udp_port(addr: DeviceAddr, udp_port: u16) -> Self {
        Self {
            pixels: PixelStore::new(addr.count),
            link: UdpLink::new(addr.ip, udp_port),
            addr,
            sync: false,
            last_error: None,
        }
    }

    pub fn addr(&self) -> &DeviceAddr {
        &self.addr
    }

    /// Follow each V2 frame with a PortOutSync latch
    pub fn set_sync(&mut self, sync: bool) {
        self.sync = sync;
    }

    /// The datagram the next flush will send
    pub fn frame_packet(&self) -> Bytes {
        let rgb = self.pixels.to_rgb_bytes();
        match self.addr.version {
            ProtocolVersion::V1 => packet::encode_dmx_out(self.addr.universe, &rgb),
            ProtocolVersion::V2 => packet::encode_port_out(self.addr.port, self.addr.universe, &rgb),
        }
    }

    fn transmit(&mut self) -> std::result::Result<(), KinetError> {
        let frame = self.frame_packet();
        self.link.send(&frame)?;
        if self.sync && self.addr.version == ProtocolVersion::V2 {
            self.link.send(&packet::encode_port_out_sync())?;
        }
        Ok(())
    }

    /// `ck:addr`; list several devices as `[ck:a, ck:b]`
    pub(crate) fn from_args(args: &[String]) -> Result<Box<dyn FrameBuffer>> {
        let [arg] = args else {
            return Err(Error::bad_args(
                "ck",
                format!("expected one device address, got {}", args.len()),
            ));
        };
        let addr: DeviceAddr = arg
            .parse()
            .map_err(|e: KinetError| Error::bad_args("ck", e.to_string()))?;
        Ok(Box::new(Self::new(addr)))
    }
}

impl FrameBuffer for CkDevice {
    fn count(&self) -> usize {
        self.pixels.len()
    }

    fn get(&self, index: usize) -> RgbColor {
        self.pixels.get(index)
    }

    fn set(&mut self, index: usize, color: RgbColor) {
        self.pixels.set(index, color);
    }

    fn flush(&mut self) -> Result<()> {
        match self.transmit() {
            Ok(()) => {
                self.last_error = None;
                Ok(())
            }
            Err(e) => {
                warn!(device = %self.addr, error = %e, "KiNET send failed");
                let message = format!("{}: {}", self.addr, e);
                self.last_error = Some(message.clone());
                Err(Error::Device(message))
            }
        }
    }

    fn describe(&self) -> String {
        format!("ck:{}", self.addr)
    }

    fn last_error(&self) -> Option<String> {
        self.last_error.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{Header, PacketType, DMX_DATA_LEN, DMX_OUT_HEADER_LEN, PORT_OUT_HEADER_LEN};
    use pixelpipe_core::filters::{MapFilter, MapRule, Reverse};
    use pixelpipe_core::{BuildOptions, NullDevice, BLACK, GREEN, RED};
    use std::net::{Ipv4Addr, UdpSocket};
    use std::time::{Duration, Instant};

    fn receiver() -> (UdpSocket, u16) {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let port = socket.local_addr().unwrap().port();
        (socket, port)
    }

    fn recv(socket: &UdpSocket) -> Vec<u8> {
        let mut buf = [0u8; 1500];
        let (len, _) = socket.recv_from(&mut buf).unwrap();
        buf[..len].to_vec()
    }

    #[test]
    fn test_v2_flush_sends_port_out() {
        let (socket, port) = receiver();
        let addr = DeviceAddr::v2(Ipv4Addr::LOCALHOST, 3, 4);
        let mut device = CkDevice::with_udp_port(addr, port);
        device.set(1, RED);
        device.flush().unwrap();

        let packet = recv(&socket);
        assert_eq!(packet.len(), PORT_OUT_HEADER_LEN + 12);
        let header = Header::decode(&mut packet.as_slice()).unwrap();
        assert_eq!(header.kind, PacketType::PortOut);
        assert_eq!(packet[16], 3);
        assert_eq!(&packet[20..22], &[12, 0]);
        assert_eq!(&packet[24..30], &[0, 0, 0, 255, 0, 0]);
        assert!(!device.has_error());
    }

    #[test]
    fn test_v2_sync_follows_frame() {
        let (socket, port) = receiver();
        let mut device = CkDevice::with_udp_port(DeviceAddr::v2(Ipv4Addr::LOCALHOST, 1, 2), port);
        device.set_sync(true);
        device.flush().unwrap();

        let first = Header::decode(&mut recv(&socket).as_slice()).unwrap();
        let second = Header::decode(&mut recv(&socket).as_slice()).unwrap();
        assert_eq!(first.kind, PacketType::PortOut);
        assert_eq!(second.kind, PacketType::PortOutSync);
    }

    #[test]
    fn test_v1_flush_sends_padded_dmx() {
        let (socket, port) = receiver();
        let mut device = CkDevice::with_udp_port(DeviceAddr::v1(Ipv4Addr::LOCALHOST, 2), port);
        device.set_all(GREEN);
        device.flush().unwrap();

        let packet = recv(&socket);
        assert_eq!(packet.len(), DMX_OUT_HEADER_LEN + DMX_DATA_LEN);
        assert_eq!(&packet[6..8], &[0x01, 0x01]);
        assert_eq!(&packet[21..27], &[0, 255, 0, 0, 255, 0]);
        assert!(packet[27..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_send_failure_is_recorded() {
        // No SO_BROADCAST on the frame socket, so the send is refused
        let addr: DeviceAddr = "255.255.255.255/1(4)".parse().unwrap();
        let mut device = CkDevice::new(addr);
        let err = device.flush().unwrap_err();
        assert!(matches!(err, Error::Device(_)));
        assert!(device.has_error());
        assert!(device.last_error().unwrap().starts_with("255.255.255.255/1(4)"));
    }

    #[test]
    fn test_describe_and_args() {
        crate::register();
        let tree = pixelpipe_core::build("ck:10.0.0.5/2(25)").unwrap();
        assert_eq!(tree.count(), 25);
        assert_eq!(tree.describe(), "ck:10.0.0.5/2(25)");

        let tree = pixelpipe_core::build("[ck:10.0.0.5(10), ck:10.0.0.6/1(5)]").unwrap();
        assert_eq!(tree.count(), 15);
        assert_eq!(tree.describe(), "[ck:10.0.0.5(10), ck:10.0.0.6/1(5)]");
        let again = pixelpipe_core::build(&tree.describe()).unwrap();
        assert_eq!(again.describe(), tree.describe());

        assert!(matches!(
            pixelpipe_core::build("ck:10.0.0.5(10), 10.0.0.6/1(5)"),
            Err(Error::BadArgs { .. })
        ));
        assert!(pixelpipe_core::build("ck:10.0.0.5(300)").is_err());
        assert!(pixelpipe_core::build("ck").is_err());
    }

    #[test]
    fn test_ck_list_uses_configured_spacing() {
        crate::register();
        let spacing = Duration::from_millis(150);
        let options = BuildOptions {
            write_spacing: spacing,
        };
        let mut tree =
            pixelpipe_core::build_with("[ck:127.0.0.1/1(2), ck:127.0.0.1/2(2)]", &options).unwrap();
        assert_eq!(tree.describe(), "[ck:127.0.0.1/1(2), ck:127.0.0.1/2(2)]");

        // Nothing listens on 6038 here; failed sends still pace the combo
        let started = Instant::now();
        let _ = tree.flush();
        assert!(started.elapsed() >= spacing);

        let mut quick = pixelpipe_core::build_with(
            "[ck:127.0.0.1/1(2), ck:127.0.0.1/2(2)]",
            &BuildOptions {
                write_spacing: Duration::ZERO,
            },
        )
        .unwrap();
        let started = Instant::now();
        let _ = quick.flush();
        assert!(started.elapsed() < spacing);
    }

    #[test]
    fn test_end_to_end_random_flip() {
        let (socket, port) = receiver();
        let device = CkDevice::with_udp_port(DeviceAddr::v2(Ipv4Addr::LOCALHOST, 1, 10), port);
        let mut tree = MapFilter::new(
            MapRule::Random { seed: 7 },
            Box::new(Reverse::new(Box::new(device))),
        )
        .unwrap();
        assert_eq!(tree.count(), 10);
        assert_eq!(tree.describe(), "random:7|flip|ck:127.0.0.1/1(10)");
        tree.set(0, RED);
        tree.flush().unwrap();

        let shuffle = MapFilter::new(MapRule::Random { seed: 7 }, Box::new(NullDevice::new(10))).unwrap();
        let physical = 9 - shuffle.map()[0];

        let packet = recv(&socket);
        let pixels = &packet[PORT_OUT_HEADER_LEN..];
        assert_eq!(pixels.len(), 30);
        for i in 0..10 {
            let rgb = &pixels[i * 3..i * 3 + 3];
            if i == physical {
                assert_eq!(rgb, RED.to_u8());
            } else {
                assert_eq!(rgb, BLACK.to_u8());
            }
        }
    }
}
