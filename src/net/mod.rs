//! Link-layer frame and packet buffer types shared by the transport

pub mod ethernet;
pub mod skbuff;

pub use ethernet::{ETHERTYPE_IPV4, EthernetFrame, MacAddress};
pub use skbuff::{SkBuff, SkBuffError};
