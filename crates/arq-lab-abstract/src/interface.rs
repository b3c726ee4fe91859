use crate::packet::{Message, Packet};
use crate::stats::Counters;

/// The capability provided by the channel/emulator to a protocol endpoint.
/// Endpoints call these methods to interact with the network and application layer.
pub trait SystemContext {
    /// Hand a packet to the unreliable channel.
    fn send_packet(&mut self, packet: Packet);

    /// Arm the endpoint's single timer to fire after `delay` time units.
    /// Starting a timer that is already running is a no-op.
    fn start_timer(&mut self, delay: u64);

    /// Disarm the endpoint's timer. Stopping an idle timer is a no-op.
    fn stop_timer(&mut self);

    /// Deliver a contiguous payload to the application layer.
    fn deliver_data(&mut self, data: &[u8]);

    /// Log a message to the simulator's debug output.
    fn log(&mut self, message: &str);

    /// Get current simulation time
    fn now(&self) -> u64;

    /// Record a numeric metric for later inspection (e.g. window occupancy).
    fn record_metric(&mut self, _name: &str, _value: f64) {
        // Default no-op so non-visual environments don't need to care.
    }
}

/// Outcome of handing an application message to an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The message was packetized and transmitted with sequence number `seq`.
    Accepted { seq: usize },
    /// The send window is full; the message is dropped.
    WindowFull,
    /// The endpoint originates no application data.
    NotAccepted,
}

impl Admission {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Admission::Accepted { .. })
    }
}

/// The interface every sender or receiver implements.
/// All entry points run to completion and never fail; anomalies are absorbed
/// into state and counters.
pub trait TransportProtocol {
    /// Called once before any other entry point.
    fn init(&mut self, _ctx: &mut dyn SystemContext) {}

    /// Called when a packet arrives from the network.
    fn on_packet(&mut self, ctx: &mut dyn SystemContext, packet: Packet);

    /// Called when the endpoint's timer expires.
    fn on_timer(&mut self, ctx: &mut dyn SystemContext);

    /// Called when the application layer wants to send a message reliably.
    fn on_app_data(&mut self, ctx: &mut dyn SystemContext, message: Message) -> Admission;

    /// Snapshot of the endpoint's reporting counters.
    fn counters(&self) -> Counters;
}
