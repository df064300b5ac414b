//! Mailbox notification word
//!
//! ```text
//!  31            16 15             0
//! ┌────────────────┬────────────────┐
//! │  frame length  │   slot index   │
//! └────────────────┴────────────────┘
//! ```
//!
//! A notification is a hint. The control-area indices are authoritative, so
//! a lost word only delays discovery.

const LENGTH_SHIFT: u32 = 16;
const INDEX_MASK: u32 = 0x0000_FFFF;

/// Decoded notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MboxMessage {
    /// Bytes in the slot, link header included
    pub length: u16,
    pub index: u16,
}

impl MboxMessage {
    pub const fn new(length: u16, index: u16) -> Self {
        Self { length, index }
    }

    pub const fn pack(self) -> u32 {
        ((self.length as u32) << LENGTH_SHIFT) | self.index as u32
    }

    pub const fn unpack(word: u32) -> Self {
        Self {
            length: (word >> LENGTH_SHIFT) as u16,
            index: (word & INDEX_MASK) as u16,
        }
    }
}

impl From<u32> for MboxMessage {
    fn from(word: u32) -> Self {
        Self::unpack(word)
    }
}

impl From<MboxMessage> for u32 {
    fn from(msg: MboxMessage) -> Self {
        msg.pack()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_in_upper_half() {
        assert_eq!(MboxMessage::new(1518, 5).pack(), (1518 << 16) | 5);
        assert_eq!(MboxMessage::new(0xFFFF, 0xFFFF).pack(), 0xFFFF_FFFF);
    }

    #[test]
    fn unpack_splits_halves() {
        let msg = MboxMessage::unpack(0x0072_0003);
        assert_eq!(msg.length, 0x72);
        assert_eq!(msg.index, 3);
        assert_eq!(MboxMessage::from(0u32), MboxMessage::new(0, 0));
    }
}
