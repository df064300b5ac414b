//! Socket Buffer (sk_buff) - owned frame buffer
//!
//! A received frame is copied out of its shared-memory slot into an `SkBuff`
//! before the slot is handed back to the peer, so the buffer's lifetime is
//! independent of the ring. Outbound, an `SkBuff` is one of the ownership
//! handles the pending-transmit table can hold until the peer consumes the
//! slot.
//!
//! # Layout
//!
//! ```text
//! ┌───────────────────────────────────────────┐
//! │ [Link Hdr][Payload .......................]│
//! │  ^         ^                              ^│
//! │  head      data (after pull_header(14))   tail
//! └───────────────────────────────────────────┘
//! ```
//!
//! Offsets are used instead of pointers; `as_bytes()` always returns the whole
//! frame, `data()` the current layer.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

use crate::net::ethernet::{EthernetFrame, MacAddress};

/// sk_buff header offsets into the data buffer
#[derive(Debug, Clone, Copy, Default)]
struct SkBuffHeaders {
    head: usize,
    data: usize,
    tail: usize,
    mac_header: Option<usize>,
}

/// Metadata filled in when the link header is parsed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacketMetadata {
    pub ethertype: Option<u16>,
    pub src_mac: Option<MacAddress>,
    pub dst_mac: Option<MacAddress>,
    /// Ring slot the frame was copied from (receive path only)
    pub slot: Option<u16>,
}

/// Errors that can occur during sk_buff operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkBuffError {
    /// Heap allocation failed (out of memory)
    AllocationFailed,

    /// Not enough data to pull header
    InsufficientData,
}

impl fmt::Display for SkBuffError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllocationFailed => write!(f, "heap allocation failed"),
            Self::InsufficientData => write!(f, "insufficient data to pull header"),
        }
    }
}

/// Owned packet buffer plus layer offsets
pub struct SkBuff {
    data: Box<[u8]>,
    headers: SkBuffHeaders,
    metadata: PacketMetadata,
}

impl SkBuff {
    /// Allocate a zeroed buffer of `len` bytes and let `fill` populate it
    ///
    /// The allocation is fallible: heap exhaustion is reported as
    /// `AllocationFailed` rather than aborting, so an interrupt-path caller
    /// can drop the frame and carry on.
    pub fn try_with_len<F>(len: usize, fill: F) -> Result<Self, SkBuffError>
    where
        F: FnOnce(&mut [u8]),
    {
        let mut buf = Vec::new();
        buf.try_reserve_exact(len)
            .map_err(|_| SkBuffError::AllocationFailed)?;
        buf.resize(len, 0);
        fill(&mut buf);
        Ok(Self::from_vec(buf))
    }

    /// Take ownership of an already built frame
    pub fn from_vec(frame: Vec<u8>) -> Self {
        let data = frame.into_boxed_slice();
        let len = data.len();
        Self {
            data,
            headers: SkBuffHeaders {
                head: 0,
                data: 0,
                tail: len,
                mac_header: None,
            },
            metadata: PacketMetadata::default(),
        }
    }

    /// Copy `frame` into a new buffer
    pub fn from_slice(frame: &[u8]) -> Result<Self, SkBuffError> {
        Self::try_with_len(frame.len(), |buf| buf.copy_from_slice(frame))
    }

    /// Parse the link header, record it in the metadata and step past it
    ///
    /// Frames shorter than a header are left untouched.
    pub fn link_header_trans(&mut self) -> Option<u16> {
        let (ethertype, src_mac, dst_mac) = {
            let frame = EthernetFrame::parse(self.data())?;
            (frame.ethertype, frame.src_mac, frame.dest_mac)
        };

        self.metadata.ethertype = Some(ethertype);
        self.metadata.src_mac = Some(src_mac);
        self.metadata.dst_mac = Some(dst_mac);
        self.headers.mac_header = Some(self.headers.data);
        self.pull_header(EthernetFrame::HEADER_SIZE).ok()?;
        Some(ethertype)
    }

    /// Current layer's data
    pub fn data(&self) -> &[u8] {
        &self.data[self.headers.data..self.headers.tail]
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data[self.headers.data..self.headers.tail]
    }

    /// Move the data offset forward by `size` bytes
    pub fn pull_header(&mut self, size: usize) -> Result<(), SkBuffError> {
        if self.headers.data + size > self.headers.tail {
            return Err(SkBuffError::InsufficientData);
        }

        self.headers.data += size;
        Ok(())
    }

    pub fn mac_header(&self) -> Option<usize> {
        self.headers.mac_header
    }

    pub fn metadata(&self) -> &PacketMetadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut PacketMetadata {
        &mut self.metadata
    }

    /// Total frame length (all headers + payload)
    pub fn len(&self) -> usize {
        self.headers.tail - self.headers.head
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whole frame, from head to tail
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[self.headers.head..self.headers.tail]
    }
}

impl fmt::Debug for SkBuff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SkBuff")
            .field("len", &self.len())
            .field("data_ptr", &self.headers.data)
            .field("mac_header", &self.headers.mac_header)
            .field("ethertype", &self.metadata.ethertype)
            .field("slot", &self.metadata.slot)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::ethernet::ETHERTYPE_IPV4;
    use alloc::vec;

    #[test]
    fn test_skbuff_allocation() {
        let skb = SkBuff::try_with_len(64, |buf| buf[0] = 0xAB).expect("allocation failed");

        assert_eq!(skb.len(), 64);
        assert_eq!(skb.data().len(), 64);
        assert_eq!(skb.as_bytes()[0], 0xAB);
        assert!(!skb.is_empty());
    }

    #[test]
    fn test_pull_header_insufficient_data() {
        let mut skb = SkBuff::from_slice(&[0u8; 10]).unwrap();

        assert_eq!(skb.pull_header(20), Err(SkBuffError::InsufficientData));
        assert_eq!(skb.data().len(), 10);
    }

    #[test]
    fn test_link_header_trans() {
        let src = MacAddress::new([0x02, 0, 0, 0, 0, 0x42]);
        let mut frame = vec![0u8; 14];
        frame[..14].copy_from_slice(&EthernetFrame::synthetic(src, &[]).header());
        frame.extend_from_slice(b"ip packet");

        let mut skb = SkBuff::from_vec(frame);
        assert_eq!(skb.link_header_trans(), Some(ETHERTYPE_IPV4));

        assert_eq!(skb.mac_header(), Some(0));
        assert_eq!(skb.data(), b"ip packet");
        assert_eq!(skb.len(), 14 + 9);
        assert_eq!(skb.metadata().src_mac, Some(src));
        assert_eq!(skb.metadata().dst_mac, Some(MacAddress::broadcast()));
    }

    #[test]
    fn test_link_header_trans_runt_frame() {
        let mut skb = SkBuff::from_slice(&[1, 2, 3]).unwrap();

        assert_eq!(skb.link_header_trans(), None);
        assert_eq!(skb.mac_header(), None);
        assert_eq!(skb.data(), &[1, 2, 3]);
    }
}
