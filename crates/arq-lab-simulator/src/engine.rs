use crate::trace::SimulationReport;
use arq_lab_abstract::{Admission, Message, Packet, SimConfig};
use arq_lab_abstract::{SystemContext, TransportProtocol};
use rand::Rng;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use tracing::{debug, info, warn};

/// Value the channel writes into a damaged header field.
pub const CORRUPTED_FIELD: i32 = 999_999;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeId {
    Sender,
    Receiver,
}

impl NodeId {
    pub fn peer(&self) -> Self {
        match self {
            NodeId::Sender => NodeId::Receiver,
            NodeId::Receiver => NodeId::Sender,
        }
    }
}

#[derive(Debug)]
pub enum EventType {
    PacketArrival { to: NodeId, packet: Packet },
    TimerExpiry { node: NodeId, generation: u64 },
    AppSend { message: Message },
}

#[derive(Debug)]
struct Event {
    time: u64,
    event_type: EventType,
    id: u64, // Unique ID to differentiate events at same time
}

// Custom Ord for Min-Heap (smallest time pops first)
impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.id == other.id
    }
}

impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse comparison for time: smallest time is Greater in BinaryHeap
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// A compact textual summary of important link-layer events.
#[derive(Debug, Clone, Serialize)]
pub struct LinkEventSummary {
    pub time: u64,
    pub description: String,
}

#[derive(Debug, Clone, Copy)]
enum TimerCommand {
    Start(u64),
    Stop,
}

/// Actions buffered during an endpoint's call, applied once it returns.
#[derive(Default)]
struct ActionBuffer {
    outgoing_packets: Vec<Packet>,
    // order matters: a stop followed by a start re-arms
    timer_commands: Vec<TimerCommand>,
    logs: Vec<String>,
    delivered_data: Vec<Vec<u8>>,
    metrics: Vec<(String, f64)>,
}

/// Context implementation passed to the endpoint
struct ScopedContext<'a> {
    buffer: &'a mut ActionBuffer,
    now: u64,
}

impl<'a> SystemContext for ScopedContext<'a> {
    fn send_packet(&mut self, packet: Packet) {
        self.buffer.outgoing_packets.push(packet);
    }

    fn start_timer(&mut self, delay: u64) {
        self.buffer.timer_commands.push(TimerCommand::Start(delay));
    }

    fn stop_timer(&mut self) {
        self.buffer.timer_commands.push(TimerCommand::Stop);
    }

    fn deliver_data(&mut self, data: &[u8]) {
        self.buffer.delivered_data.push(data.to_vec());
    }

    fn log(&mut self, message: &str) {
        self.buffer.logs.push(message.to_string());
    }

    fn now(&self) -> u64 {
        self.now
    }

    fn record_metric(&mut self, name: &str, value: f64) {
        self.buffer.metrics.push((name.to_string(), value));
    }
}

/// The single timer owned by each node.
#[derive(Debug, Default, Clone, Copy)]
struct TimerSlot {
    armed: bool,
    /// Bumped on every stop so stale expiry events can be recognised.
    generation: u64,
}

/// One-shot faults keyed by header value.
#[derive(Debug, Default)]
struct FaultPlan {
    drop_sender_seq: Vec<i32>,
    drop_receiver_ack: Vec<i32>,
    corrupt_sender_seq: Vec<i32>,
    corrupt_receiver_ack: Vec<i32>,
}

fn take_once(list: &mut Vec<i32>, value: i32) -> bool {
    match list.iter().position(|v| *v == value) {
        Some(pos) => {
            list.remove(pos);
            true
        }
        None => false,
    }
}

pub struct Simulator {
    time: u64,
    event_queue: BinaryHeap<Event>,
    event_id_counter: u64,

    config: SimConfig,
    rng: rand::rngs::StdRng,

    // We use Box to allow different implementations
    pub sender: Box<dyn TransportProtocol>,
    pub receiver: Box<dyn TransportProtocol>,

    // Stats for Grader
    pub delivered_data: Vec<Vec<u8>>,
    pub sender_packet_count: u32,
    pub messages_offered: u32,

    /// Arbitrary time-series metrics recorded via `SystemContext::record_metric`
    /// Key: metric name (e.g., "inflight"), Value: Vec<(time, value)>
    pub metrics: HashMap<String, Vec<(u64, f64)>>,

    faults: FaultPlan,

    /// Timeline of link events (drops, corruptions, sends, deliveries).
    pub link_events: Vec<LinkEventSummary>,

    timers: HashMap<NodeId, TimerSlot>,

    /// Latest arrival already scheduled towards each node, keeps the link FIFO.
    last_arrival: HashMap<NodeId, u64>,
}

impl Simulator {
    pub fn new(
        config: SimConfig,
        sender: Box<dyn TransportProtocol>,
        receiver: Box<dyn TransportProtocol>,
    ) -> Self {
        use rand::SeedableRng;
        let rng = rand::rngs::StdRng::seed_from_u64(config.seed);

        Self {
            time: 0,
            event_queue: BinaryHeap::new(),
            event_id_counter: 0,
            config,
            rng,
            sender,
            receiver,
            delivered_data: Vec::new(),
            sender_packet_count: 0,
            messages_offered: 0,
            metrics: HashMap::new(),
            faults: FaultPlan::default(),
            link_events: Vec::new(),
            timers: HashMap::new(),
            last_arrival: HashMap::new(),
        }
    }

    /// Register a deterministic fault: drop the first packet sent by Sender whose seq equals `seq`.
    pub fn add_drop_sender_seq_once(&mut self, seq: i32) {
        self.faults.drop_sender_seq.push(seq);
    }

    /// Register a deterministic fault: drop the first ACK sent by Receiver whose ack equals `ack`.
    pub fn add_drop_receiver_ack_once(&mut self, ack: i32) {
        self.faults.drop_receiver_ack.push(ack);
    }

    /// Register a deterministic fault: damage the checksum of the first Sender packet with `seq`.
    pub fn add_corrupt_sender_seq_once(&mut self, seq: i32) {
        self.faults.corrupt_sender_seq.push(seq);
    }

    /// Register a deterministic fault: damage the checksum of the first Receiver ACK with `ack`.
    pub fn add_corrupt_receiver_ack_once(&mut self, ack: i32) {
        self.faults.corrupt_receiver_ack.push(ack);
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Return a slice of (time, value) samples for a named metric, if present.
    pub fn metric_series(&self, name: &str) -> Option<&[(u64, f64)]> {
        self.metrics.get(name).map(|v| v.as_slice())
    }

    fn push_event(&mut self, time: u64, event_type: EventType) {
        self.event_queue.push(Event {
            time,
            event_type,
            id: self.event_id_counter,
        });
        self.event_id_counter += 1;
    }

    pub fn schedule_app_send(&mut self, time: u64, message: Message) {
        self.push_event(time, EventType::AppSend { message });
    }

    /// Schedule `count` messages, one every `interval` starting at `start`.
    /// Message `i` is twenty copies of the letter `'a' + i % 26`.
    pub fn schedule_generated_messages(&mut self, start: u64, count: u32, interval: u64) {
        for i in 0..count {
            let letter = b'a' + (i % 26) as u8;
            self.schedule_app_send(start + u64::from(i) * interval, Message::filled(letter));
        }
    }

    pub fn init(&mut self) {
        {
            let mut buffer = ActionBuffer::default();
            let mut ctx = ScopedContext {
                buffer: &mut buffer,
                now: self.time,
            };
            self.sender.init(&mut ctx);
            self.process_actions(NodeId::Sender, buffer);
        }
        {
            let mut buffer = ActionBuffer::default();
            let mut ctx = ScopedContext {
                buffer: &mut buffer,
                now: self.time,
            };
            self.receiver.init(&mut ctx);
            self.process_actions(NodeId::Receiver, buffer);
        }
    }

    pub fn peek_next_event_time(&self) -> Option<u64> {
        self.event_queue.peek().map(|e| e.time)
    }

    pub fn current_time(&self) -> u64 {
        self.time
    }

    pub fn remaining_events(&self) -> usize {
        self.event_queue.len()
    }

    pub fn is_timer_armed(&self, node: NodeId) -> bool {
        self.timers.get(&node).is_some_and(|slot| slot.armed)
    }

    /// Process the next event. Returns true if an event was processed, false if queue is empty.
    pub fn step(&mut self) -> bool {
        let event = match self.event_queue.pop() {
            Some(e) => e,
            None => return false,
        };

        self.time = event.time;
        debug!("Processing event at {}: {:?}", self.time, event.event_type);

        match event.event_type {
            EventType::PacketArrival { to, packet } => {
                let mut buffer = ActionBuffer::default();
                {
                    let mut ctx = ScopedContext {
                        buffer: &mut buffer,
                        now: self.time,
                    };
                    match to {
                        NodeId::Sender => self.sender.on_packet(&mut ctx, packet),
                        NodeId::Receiver => self.receiver.on_packet(&mut ctx, packet),
                    }
                }
                self.process_actions(to, buffer);
            }
            EventType::TimerExpiry { node, generation } => {
                let slot = self.timers.entry(node).or_default();
                if !slot.armed || slot.generation != generation {
                    debug!("Skipping stale timer event for {:?}", node);
                    return true; // Event processed (by being ignored)
                }
                slot.armed = false;

                let mut buffer = ActionBuffer::default();
                {
                    let mut ctx = ScopedContext {
                        buffer: &mut buffer,
                        now: self.time,
                    };
                    match node {
                        NodeId::Sender => self.sender.on_timer(&mut ctx),
                        NodeId::Receiver => self.receiver.on_timer(&mut ctx),
                    }
                }
                self.process_actions(node, buffer);
            }
            EventType::AppSend { message } => {
                self.messages_offered += 1;
                let mut buffer = ActionBuffer::default();
                let admission = {
                    let mut ctx = ScopedContext {
                        buffer: &mut buffer,
                        now: self.time,
                    };
                    self.sender.on_app_data(&mut ctx, message)
                };
                if admission == Admission::WindowFull {
                    self.link_events.push(LinkEventSummary {
                        time: self.time,
                        description: "[Sender] WINDOW FULL, message dropped".to_string(),
                    });
                }
                self.process_actions(NodeId::Sender, buffer);
            }
        }
        true
    }

    /// Produce a serializable snapshot of the current simulation state.
    pub fn export_report(&self) -> SimulationReport {
        SimulationReport {
            config: self.config.clone(),
            duration: self.time,
            delivered_data: self.delivered_data.clone(),
            messages_offered: self.messages_offered,
            sender_packet_count: self.sender_packet_count,
            sender_counters: self.sender.counters(),
            receiver_counters: self.receiver.counters(),
            metrics: self.metrics.clone(),
            link_events: self.link_events.clone(),
        }
    }

    pub fn run_until_complete(&mut self) {
        self.init();
        while self.step() {}
    }

    /// Process events up to and including `limit`. Returns false if events remain.
    pub fn run_until(&mut self, limit: u64) -> bool {
        while let Some(time) = self.peek_next_event_time() {
            if time > limit {
                return false;
            }
            self.step();
        }
        true
    }

    fn apply_timer_command(&mut self, node: NodeId, command: TimerCommand) {
        let slot = self.timers.entry(node).or_default();
        match command {
            TimerCommand::Start(delay) => {
                if slot.armed {
                    warn!("[{:?}] start_timer while timer is running, ignored", node);
                    return;
                }
                slot.armed = true;
                let generation = slot.generation;
                self.push_event(self.time + delay, EventType::TimerExpiry { node, generation });
            }
            TimerCommand::Stop => {
                if !slot.armed {
                    warn!("[{:?}] stop_timer while no timer is running, ignored", node);
                    return;
                }
                slot.armed = false;
                slot.generation += 1;
            }
        }
    }

    /// Decide whether a deterministic fault applies to an outgoing packet.
    /// Returns true when the packet must be dropped.
    fn apply_faults(&mut self, source_node: NodeId, packet: &mut Packet) -> bool {
        let (key, drop_list, corrupt_list, label) = match source_node {
            NodeId::Sender => (
                packet.seqnum,
                &mut self.faults.drop_sender_seq,
                &mut self.faults.corrupt_sender_seq,
                "seq",
            ),
            NodeId::Receiver => (
                packet.acknum,
                &mut self.faults.drop_receiver_ack,
                &mut self.faults.corrupt_receiver_ack,
                "ack",
            ),
        };

        if take_once(drop_list, key) {
            debug!("Deterministically dropping {:?} packet with {}={}", source_node, label, key);
            self.link_events.push(LinkEventSummary {
                time: self.time,
                description: format!(
                    "[{:?}->{:?}] DROP (deterministic {label}) {label}={key}",
                    source_node,
                    source_node.peer()
                ),
            });
            return true;
        }

        if take_once(corrupt_list, key) {
            debug!("Deterministically corrupting {:?} packet with {}={}", source_node, label, key);
            self.link_events.push(LinkEventSummary {
                time: self.time,
                description: format!(
                    "[{:?}->{:?}] CORRUPT (deterministic {label}) {label}={key}",
                    source_node,
                    source_node.peer()
                ),
            });
            packet.checksum = !packet.checksum;
        }
        false
    }

    /// Damage one field the way the classic emulator does: mostly the
    /// payload, occasionally a header number.
    fn corrupt_randomly(&mut self, packet: &mut Packet) -> &'static str {
        let x: f64 = self.rng.random();
        if x < 0.75 {
            packet.payload[0] = b'Z';
            "payload"
        } else if x < 0.875 {
            packet.seqnum = CORRUPTED_FIELD;
            "seqnum"
        } else {
            packet.acknum = CORRUPTED_FIELD;
            "acknum"
        }
    }

    fn process_actions(&mut self, source_node: NodeId, buffer: ActionBuffer) {
        // First, fold metrics into simulator-wide store
        for (name, value) in buffer.metrics {
            self.metrics
                .entry(name)
                .or_default()
                .push((self.time, value));
        }

        for log in buffer.logs {
            info!("[{:?}] {}", source_node, log);
        }

        for data in buffer.delivered_data {
            info!("[{:?}] DELIVERED DATA: {} bytes", source_node, data.len());
            self.link_events.push(LinkEventSummary {
                time: self.time,
                description: format!(
                    "[{:?}] DELIVERED {:?} to application",
                    source_node,
                    String::from_utf8_lossy(&data)
                ),
            });
            self.delivered_data.push(data);
        }

        for command in buffer.timer_commands {
            self.apply_timer_command(source_node, command);
        }

        // Packet transmission logic (Channel)
        for mut packet in buffer.outgoing_packets {
            if source_node == NodeId::Sender {
                self.sender_packet_count += 1;
            }

            if self.apply_faults(source_node, &mut packet) {
                continue;
            }

            // 1. Check Loss
            if self.rng.random::<f64>() < self.config.loss_rate {
                self.link_events.push(LinkEventSummary {
                    time: self.time,
                    description: format!(
                        "[{:?}->{:?}] DROP (random loss) seq={} ack={}",
                        source_node,
                        source_node.peer(),
                        packet.seqnum,
                        packet.acknum
                    ),
                });
                debug!("Packet lost in channel");
                continue;
            }

            // 2. Check Corruption
            if self.rng.random::<f64>() < self.config.corrupt_rate {
                let field = self.corrupt_randomly(&mut packet);
                self.link_events.push(LinkEventSummary {
                    time: self.time,
                    description: format!(
                        "[{:?}->{:?}] CORRUPT {field} seq={} ack={}",
                        source_node,
                        source_node.peer(),
                        packet.seqnum,
                        packet.acknum
                    ),
                });
                debug!("Packet corrupted in channel ({field})");
            }

            // 3. Calculate Latency, never overtaking an earlier packet
            let latency = self
                .rng
                .random_range(self.config.min_latency..=self.config.max_latency);
            let target_node = source_node.peer();
            let earliest = self.last_arrival.get(&target_node).copied().unwrap_or(0);
            let arrival_time = (self.time + latency).max(earliest);
            self.last_arrival.insert(target_node, arrival_time);

            self.link_events.push(LinkEventSummary {
                time: self.time,
                description: format!(
                    "[{:?}->{:?}] SEND seq={} ack={} (arrives at {})",
                    source_node, target_node, packet.seqnum, packet.acknum, arrival_time
                ),
            });

            self.push_event(
                arrival_time,
                EventType::PacketArrival {
                    to: target_node,
                    packet,
                },
            );
        }
    }
}
