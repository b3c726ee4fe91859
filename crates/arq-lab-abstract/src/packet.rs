use serde::{Deserialize, Serialize};

/// Number of payload bytes carried by every packet and message.
pub const PAYLOAD_LEN: usize = 20;

/// Value used to fill header fields that carry no meaning (e.g. `acknum` on data packets).
pub const NOT_IN_USE: i32 = -1;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Packet {
    /// Sequence number of a data packet
    pub seqnum: i32,
    /// Sequence number being acknowledged (acks only)
    pub acknum: i32,
    /// Integrity value over seqnum, acknum and payload.
    /// The channel may damage any field, including this one.
    pub checksum: i32,
    pub payload: [u8; PAYLOAD_LEN],
}

impl Packet {
    pub fn new(seqnum: i32, acknum: i32, payload: [u8; PAYLOAD_LEN]) -> Self {
        Self {
            seqnum,
            acknum,
            checksum: 0,
            payload,
        }
    }

    /// Data packet carrying an application message.
    pub fn data(seqnum: i32, message: &Message) -> Self {
        Self::new(seqnum, NOT_IN_USE, message.data)
    }

    /// Pure ACK packet. The payload is filled with ASCII '0'.
    pub fn ack(acknum: i32) -> Self {
        Self::new(0, acknum, [b'0'; PAYLOAD_LEN])
    }

    pub fn with_checksum(mut self, checksum: i32) -> Self {
        self.checksum = checksum;
        self
    }
}

/// Application-layer unit handed to the sender. One message maps to exactly one packet.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub data: [u8; PAYLOAD_LEN],
}

impl Message {
    pub fn new(data: [u8; PAYLOAD_LEN]) -> Self {
        Self { data }
    }

    /// Build a message from arbitrary bytes, truncating or zero-padding to `PAYLOAD_LEN`.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut data = [0u8; PAYLOAD_LEN];
        let len = bytes.len().min(PAYLOAD_LEN);
        data[..len].copy_from_slice(&bytes[..len]);
        Self { data }
    }

    /// Message made of `PAYLOAD_LEN` copies of one byte, as produced by the workload generator.
    pub fn filled(byte: u8) -> Self {
        Self {
            data: [byte; PAYLOAD_LEN],
        }
    }
}

impl From<&str> for Message {
    fn from(value: &str) -> Self {
        Self::from_bytes(value.as_bytes())
    }
}
