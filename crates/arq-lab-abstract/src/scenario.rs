use crate::config::{CorruptAckPolicy, ProtocolConfig, ReceiverPolicy, SimConfig};
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct TestScenario {
    pub name: String,
    pub description: String,
    pub config: SimConfigOverride,
    #[serde(default)]
    pub protocol: ProtocolConfigOverride,
    pub actions: Vec<TestAction>,
    pub assertions: Vec<TestAssertion>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct SimConfigOverride {
    pub loss_rate: Option<f64>,
    pub corrupt_rate: Option<f64>,
    pub min_latency: Option<u64>,
    pub max_latency: Option<u64>,
    pub seed: Option<u64>,
}

impl SimConfigOverride {
    pub fn apply_to(&self, config: &mut SimConfig) {
        if let Some(v) = self.loss_rate {
            config.loss_rate = v;
        }
        if let Some(v) = self.corrupt_rate {
            config.corrupt_rate = v;
        }
        if let Some(v) = self.min_latency {
            config.min_latency = v;
        }
        if let Some(v) = self.max_latency {
            config.max_latency = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ProtocolConfigOverride {
    pub window_size: Option<usize>,
    pub seq_space: Option<usize>,
    pub recv_window: Option<usize>,
    pub rtt: Option<u64>,
    pub receiver_policy: Option<ReceiverPolicy>,
    pub corrupt_ack_policy: Option<CorruptAckPolicy>,
    pub reack_delivered: Option<bool>,
}

impl ProtocolConfigOverride {
    /// Overriding `window_size` alone also moves `recv_window` along with it.
    pub fn apply_to(&self, config: &mut ProtocolConfig) {
        if let Some(v) = self.window_size {
            config.window_size = v;
            config.recv_window = v;
        }
        if let Some(v) = self.seq_space {
            config.seq_space = v;
        }
        if let Some(v) = self.recv_window {
            config.recv_window = v;
        }
        if let Some(v) = self.rtt {
            config.rtt = v;
        }
        if let Some(v) = self.receiver_policy {
            config.receiver_policy = v;
        }
        if let Some(v) = self.corrupt_ack_policy {
            config.corrupt_ack_policy = v;
        }
        if let Some(v) = self.reack_delivered {
            config.reack_delivered = v;
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestAction {
    /// Application sends data at a specific time
    AppSend { time: u64, data: String },
    /// Generate `count` lettered messages starting at `start`, one every `interval`
    GenerateMessages {
        start: u64,
        count: u32,
        interval: u64,
    },
    /// Deterministically drop the first packet sent by Sender with given seq number
    DropNextFromSenderSeq { seq: i32 },
    /// Deterministically drop the first ACK sent by Receiver with given ack number
    DropNextFromReceiverAck { ack: i32 },
    /// Deterministically corrupt the first packet sent by Sender with given seq number
    CorruptNextFromSenderSeq { seq: i32 },
    /// Deterministically corrupt the first ACK sent by Receiver with given ack number
    CorruptNextFromReceiverAck { ack: i32 },
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestAssertion {
    /// Assert that specific data was delivered to the application layer
    DataDelivered { data: String },
    /// Assert that exactly these payloads were delivered, in this order
    DeliveredInOrder { data: Vec<String> },
    /// Assert that the total number of packets sent by Sender is within range
    SenderPacketCount { min: u32, max: Option<u32> },
    /// Assert that the sender's retransmission count is within range
    PacketsResent { min: u64, max: Option<u64> },
    /// Assert the exact number of window-full rejections
    WindowFullCount { count: u64 },
    /// Assert that the recorded in-flight count never exceeded `limit`
    InflightNeverExceeds { limit: usize },
    /// Assert that simulation finishes within time
    MaxDuration { time: u64 },
}
