//! Link-layer header handling
//!
//! Every TX slot starts with a synthetic Ethernet II header: broadcast
//! destination, this side's address as source, IPv4 ethertype. The header is
//! prepended unconditionally; the payload handed to the transport is whatever
//! the upper layer supplied, including any header of its own.

use core::fmt;

/// 48-bit MAC address, displayed as `XX:XX:XX:XX:XX:XX`
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Locally administered unicast address `02:00:` followed by `id`
    /// (big-endian)
    pub const fn local(id: u32) -> Self {
        let id = id.to_be_bytes();
        Self([0x02, 0x00, id[0], id[1], id[2], id[3]])
    }

    /// FF:FF:FF:FF:FF:FF
    pub const fn broadcast() -> Self {
        Self([0xFF; 6])
    }

    pub fn is_broadcast(&self) -> bool {
        self.0 == [0xFF; 6]
    }

    pub const fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

/// dest MAC (6) + src MAC (6) + ethertype (2)
pub const HEADER_LEN: usize = 14;

/// Ethernet II frame view
///
/// - Destination MAC (6 bytes)
/// - Source MAC (6 bytes)
/// - EtherType (2 bytes, big-endian)
/// - Payload
pub struct EthernetFrame<'a> {
    pub dest_mac: MacAddress,
    pub src_mac: MacAddress,
    pub ethertype: u16,
    pub payload: &'a [u8],
}

impl<'a> EthernetFrame<'a> {
    pub const HEADER_SIZE: usize = HEADER_LEN;

    pub fn new(dest_mac: MacAddress, src_mac: MacAddress, ethertype: u16, payload: &'a [u8]) -> Self {
        Self {
            dest_mac,
            src_mac,
            ethertype,
            payload,
        }
    }

    /// Frame as written into a TX slot: broadcast destination, IPv4 ethertype
    pub fn synthetic(src_mac: MacAddress, payload: &'a [u8]) -> Self {
        Self::new(MacAddress::broadcast(), src_mac, ETHERTYPE_IPV4, payload)
    }

    /// Split raw bytes into header fields and payload
    ///
    /// Returns None if the buffer is shorter than a header.
    pub fn parse(buffer: &'a [u8]) -> Option<Self> {
        if buffer.len() < Self::HEADER_SIZE {
            return None;
        }

        let mut dest = [0u8; 6];
        dest.copy_from_slice(&buffer[0..6]);

        let mut src = [0u8; 6];
        src.copy_from_slice(&buffer[6..12]);

        Some(Self {
            dest_mac: MacAddress(dest),
            src_mac: MacAddress(src),
            ethertype: u16::from_be_bytes([buffer[12], buffer[13]]),
            payload: &buffer[Self::HEADER_SIZE..],
        })
    }

    /// Serialized header bytes
    pub fn header(&self) -> [u8; HEADER_LEN] {
        let mut hdr = [0u8; HEADER_LEN];
        hdr[0..6].copy_from_slice(&self.dest_mac.0);
        hdr[6..12].copy_from_slice(&self.src_mac.0);
        hdr[12..14].copy_from_slice(&self.ethertype.to_be_bytes());
        hdr
    }

    /// Header plus payload length
    pub fn size(&self) -> usize {
        Self::HEADER_SIZE + self.payload.len()
    }
}

/// The only ethertype the transport writes
pub const ETHERTYPE_IPV4: u16 = 0x0800;

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn broadcast_address() {
        assert!(MacAddress::broadcast().is_broadcast());
        assert!(!MacAddress::new([0x02, 0, 0, 0, 0, 1]).is_broadcast());
    }

    #[test]
    fn local_addresses_are_unicast_and_distinct() {
        let host = MacAddress::local(1);
        let remote = MacAddress::local(2);

        assert_eq!(host.0, [0x02, 0, 0, 0, 0, 0x01]);
        assert_ne!(host, remote);
        assert_eq!(host.0[0] & 0x01, 0);
        assert_eq!(MacAddress::local(0x0A0B_0C0D).0, [0x02, 0, 0x0A, 0x0B, 0x0C, 0x0D]);
    }

    #[test]
    fn test_mac_address_display() {
        let mac = MacAddress::new([0x02, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E]);
        assert_eq!(mac.to_string(), "02:0A:0B:0C:0D:0E");
    }

    #[test]
    fn test_synthetic_header_layout() {
        let src = MacAddress::new([0x02, 0x00, 0x00, 0xAA, 0xBB, 0xCC]);
        let frame = EthernetFrame::synthetic(src, b"payload");
        let hdr = frame.header();

        assert_eq!(&hdr[0..6], &[0xFF; 6]);
        assert_eq!(&hdr[6..12], src.as_bytes());
        assert_eq!(&hdr[12..14], &[0x08, 0x00]);
        assert_eq!(frame.size(), 14 + 7);
    }

    #[test]
    fn test_parse_recovers_header_fields() {
        let src = MacAddress::new([0x02, 0x01, 0x02, 0x03, 0x04, 0x05]);
        let frame = EthernetFrame::new(MacAddress::broadcast(), src, 0x86DD, &[]);

        let mut buffer = [0u8; 20];
        buffer[..14].copy_from_slice(&frame.header());
        buffer[14..].copy_from_slice(b"Hello!");

        let parsed = EthernetFrame::parse(&buffer).unwrap();
        assert_eq!(parsed.dest_mac, MacAddress::broadcast());
        assert_eq!(parsed.src_mac, src);
        assert_eq!(parsed.ethertype, 0x86DD);
        assert_eq!(parsed.payload, b"Hello!");
    }

    #[test]
    fn test_parse_too_short() {
        assert!(EthernetFrame::parse(&[0u8; 13]).is_none());
    }
}
