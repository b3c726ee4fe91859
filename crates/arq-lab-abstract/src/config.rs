use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    pub loss_rate: f64,
    pub corrupt_rate: f64,
    pub min_latency: u64,
    pub max_latency: u64,
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            loss_rate: 0.0,
            corrupt_rate: 0.0,
            min_latency: 1,
            max_latency: 9,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    #[serde(rename = "gbn")]
    GoBackN,
    #[serde(rename = "sr")]
    SelectiveRepeat,
}

/// How the Go-Back-N receiver treats packets that arrive ahead of `expected`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiverPolicy {
    /// Buffer anything inside the receive window, ack it, and drain in order.
    #[default]
    BufferAndDrain,
    /// Accept only `expected`; re-ack the last in-order packet otherwise.
    StrictInOrder,
}

/// Which acknowledgment the Selective-Repeat receiver sends for a corrupted packet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorruptAckPolicy {
    /// Echo the incoming `seqnum`, even though it may itself be damaged.
    /// A packet with a damaged payload but intact header is then acked
    /// without being stored, and the sender never resends it.
    EchoIncoming,
    /// Ack the last sequence number delivered in order (`recv_base - 1`).
    #[default]
    EchoLastInOrder,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("window size must be at least 1")]
    EmptyWindow,
    #[error("receive window must be at least 1")]
    EmptyReceiveWindow,
    #[error("sequence space {seq_space} must exceed window size {window_size}")]
    SeqSpaceTooSmall { seq_space: usize, window_size: usize },
    #[error("receive window {recv_window} must be smaller than sequence space {seq_space}")]
    ReceiveWindowTooLarge { recv_window: usize, seq_space: usize },
    #[error("round-trip time must be non-zero")]
    ZeroRtt,
}

/// Constants shared by a sender/receiver pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    pub window_size: usize,
    pub seq_space: usize,
    pub recv_window: usize,
    /// Timer duration used for every arm
    pub rtt: u64,
    pub receiver_policy: ReceiverPolicy,
    pub corrupt_ack_policy: CorruptAckPolicy,
    /// Go-Back-N receiver re-acks packets from the window it has already
    /// delivered, so a sender whose ack was lost can still advance.
    pub reack_delivered: bool,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            window_size: 6,
            seq_space: 12,
            recv_window: 6,
            rtt: 16,
            receiver_policy: ReceiverPolicy::default(),
            corrupt_ack_policy: CorruptAckPolicy::default(),
            reack_delivered: true,
        }
    }
}

impl ProtocolConfig {
    pub fn new(window_size: usize, seq_space: usize) -> Self {
        Self {
            window_size,
            seq_space,
            recv_window: window_size,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size == 0 {
            return Err(ConfigError::EmptyWindow);
        }
        if self.recv_window == 0 {
            return Err(ConfigError::EmptyReceiveWindow);
        }
        if self.seq_space <= self.window_size {
            return Err(ConfigError::SeqSpaceTooSmall {
                seq_space: self.seq_space,
                window_size: self.window_size,
            });
        }
        if self.recv_window >= self.seq_space {
            return Err(ConfigError::ReceiveWindowTooLarge {
                recv_window: self.recv_window,
                seq_space: self.seq_space,
            });
        }
        if self.rtt == 0 {
            return Err(ConfigError::ZeroRtt);
        }
        Ok(())
    }

    /// Whether an old and a new packet can never share a modular slot
    /// while both are inside the send and receive windows.
    pub fn is_ambiguity_free(&self, variant: Variant) -> bool {
        match (variant, self.receiver_policy) {
            // a buffering receiver accepts the whole window ahead of `expected`
            (Variant::GoBackN, ReceiverPolicy::BufferAndDrain) => {
                self.seq_space >= 2 * self.window_size
            }
            (Variant::GoBackN, ReceiverPolicy::StrictInOrder) => self.seq_space > self.window_size,
            (Variant::SelectiveRepeat, _) => self.seq_space >= self.window_size + self.recv_window,
        }
    }
}
