//! KiNET support for pixelpipe
//!
//! Packet codec, device-string grammar and the `ck` device node that pushes
//! frames to ColorKinetics power/data supplies over UDP. Discovery lives in
//! `pixelpipe-discovery`; this crate has no async code.

pub mod device;
pub mod error;
pub mod output;
pub mod packet;
pub mod transport;

use std::sync::Once;

use pixelpipe_core::registry::{self, Factory};

pub use device::{DeviceAddr, ProtocolVersion, DEFAULT_PIXEL_COUNT, MAX_PIXEL_COUNT};
pub use error::{KinetError, Result};
pub use output::CkDevice;
pub use packet::{PacketType, KINET_PORT};

/// Register the `ck` device type
///
/// Safe to call more than once; only the first call registers.
pub fn register() {
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        registry::register(
            "ck",
            Factory::Device(CkDevice::from_args),
            "ip[/port][(count)]",
            "ColorKinetics supply over KiNET; list several as [ck:a, ck:b]",
        );
    });
}
