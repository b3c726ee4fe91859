use arq_lab_abstract::{
    Admission, Counters, Message, Packet, ProtocolConfig, SystemContext, TransportProtocol,
};

use crate::checksum;
use crate::seq::SeqSpace;

/// Selective-Repeat sender.
///
/// Each ack inside `[window_base, window_base + window)` marks its own slot.
/// The single timer tracks the earliest outstanding packet, and a timeout
/// resends only that packet.
pub struct SrSender {
    config: ProtocolConfig,
    space: SeqSpace,
    window_base: usize,
    next: usize,
    window_count: usize,
    buffer: Vec<Option<Packet>>,
    acked: Vec<bool>,
    counters: Counters,
}

impl SrSender {
    pub fn new(config: ProtocolConfig) -> Self {
        let space = SeqSpace::new(config.seq_space);
        Self {
            buffer: vec![None; space.size()],
            acked: vec![false; space.size()],
            space,
            window_base: 0,
            next: 0,
            window_count: 0,
            counters: Counters::default(),
            config,
        }
    }

    pub fn window_base(&self) -> usize {
        self.window_base
    }

    pub fn next_seq(&self) -> usize {
        self.next
    }

    pub fn window_count(&self) -> usize {
        self.window_count
    }

    /// Sequence numbers of the packets currently in flight, oldest first.
    fn outstanding(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.window_count).map(move |offset| (self.window_base + offset) % self.space.size())
    }

    fn slide(&mut self) {
        while self.window_count > 0 && self.acked[self.window_base] {
            self.acked[self.window_base] = false;
            self.buffer[self.window_base] = None;
            self.window_base = self.space.advance(self.window_base);
            self.window_count -= 1;
        }
    }
}

impl TransportProtocol for SrSender {
    fn init(&mut self, ctx: &mut dyn SystemContext) {
        self.window_base = 0;
        self.next = 0;
        self.window_count = 0;
        self.buffer.fill(None);
        self.acked.fill(false);
        self.counters = Counters::default();
        ctx.log(&format!(
            "SR sender ready (window={}, seq space={})",
            self.config.window_size, self.config.seq_space
        ));
    }

    fn on_app_data(&mut self, ctx: &mut dyn SystemContext, message: Message) -> Admission {
        if self.window_count >= self.config.window_size {
            ctx.log("New message arrives, send window is full");
            self.counters.window_full += 1;
            return Admission::WindowFull;
        }

        let seq = self.next;
        let packet = checksum::seal(Packet::data(self.space.to_wire(seq), &message));
        self.buffer[seq] = Some(packet);
        self.acked[seq] = false;
        self.window_count += 1;

        ctx.log(&format!("Sending packet {seq}"));
        ctx.send_packet(packet);

        if self.window_count == 1 {
            ctx.start_timer(self.config.rtt);
        }
        self.next = self.space.advance(self.next);
        ctx.record_metric("inflight", self.window_count as f64);

        Admission::Accepted { seq }
    }

    fn on_packet(&mut self, ctx: &mut dyn SystemContext, packet: Packet) {
        if checksum::is_corrupted(&packet) {
            ctx.log("Corrupted ACK received, ignored");
            return;
        }
        self.counters.acks_received += 1;

        let Some(ack) = self.space.from_wire(packet.acknum).filter(|ack| {
            self.space
                .in_window(*ack, self.window_base, self.config.window_size)
        }) else {
            ctx.log(&format!("ACK {} outside send window, ignored", packet.acknum));
            return;
        };

        if self.acked[ack] {
            ctx.log(&format!("Duplicate ACK {ack}, ignored"));
            return;
        }

        ctx.log(&format!("ACK {ack} is new"));
        self.counters.new_acks += 1;
        self.acked[ack] = true;
        self.slide();
        ctx.record_metric("inflight", self.window_count as f64);

        ctx.stop_timer();
        if self.outstanding().any(|seq| !self.acked[seq]) {
            ctx.start_timer(self.config.rtt);
        }
    }

    fn on_timer(&mut self, ctx: &mut dyn SystemContext) {
        let first_unacked = self.outstanding().find(|seq| !self.acked[*seq]);
        if let Some(packet) = first_unacked.and_then(|seq| self.buffer[seq]) {
            ctx.log(&format!("Timeout, resending packet {}", packet.seqnum));
            ctx.send_packet(packet);
            self.counters.packets_resent += 1;
        }
        ctx.start_timer(self.config.rtt);
    }

    fn counters(&self) -> Counters {
        self.counters
    }
}
