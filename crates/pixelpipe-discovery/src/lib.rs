//! pixelpipe discovery - Finding KiNET supplies on the local network
//!
//! - Broadcast Discover and a time-bounded drain of DiscoverReply packets
//! - BlinkScan enumeration of each supply's ports and light counts
//! - Turning the results into a ready-to-use `ck:` descriptor

pub mod interfaces;
pub mod scanner;

pub use interfaces::{broadcast_addresses, list_interfaces, InterfaceInfo};
pub use scanner::{
    descriptor_for, discover, enumerate, scan, scan_blocking, DiscoveredDevice, PortCount,
    ScannerConfig,
};
