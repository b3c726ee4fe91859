pub mod config;
pub mod interface;
pub mod packet;
pub mod scenario;
pub mod stats;

pub use interface::{Admission, SystemContext, TransportProtocol};
pub use packet::{Message, NOT_IN_USE, PAYLOAD_LEN, Packet};
pub use stats::Counters;

pub use config::{
    ConfigError, CorruptAckPolicy, ProtocolConfig, ReceiverPolicy, SimConfig, Variant,
};
pub use scenario::{
    ProtocolConfigOverride, SimConfigOverride, TestAction, TestAssertion, TestScenario,
};
