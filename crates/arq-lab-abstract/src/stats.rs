use serde::{Deserialize, Serialize};

/// Observable counters exposed for reporting. They never influence correctness.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Counters {
    /// Uncorrupted acks that reached the sender
    pub acks_received: u64,
    /// Acks that marked a previously unacked packet
    pub new_acks: u64,
    pub packets_resent: u64,
    /// Uncorrupted packets that reached the receiver
    pub packets_received: u64,
    /// Application messages refused because the send window was full
    pub window_full: u64,
}

impl Counters {
    /// Acks that carried no new information.
    pub fn duplicate_acks(&self) -> u64 {
        self.acks_received - self.new_acks
    }
}
