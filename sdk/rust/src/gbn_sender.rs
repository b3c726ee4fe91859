use arq_lab_abstract::{
    Admission, Counters, Message, Packet, ProtocolConfig, SystemContext, TransportProtocol,
};

use crate::checksum;
use crate::seq::SeqSpace;

/// Go-Back-N sender.
///
/// Acks are interpreted per sequence number: each ack marks one slot, and
/// `base` slides over every contiguous marked slot. A timeout resends every
/// unacked packet in `[base, next)`.
pub struct GbnSender {
    config: ProtocolConfig,
    space: SeqSpace,
    base: usize,
    next: usize,
    buffer: Vec<Option<Packet>>,
    acked: Vec<bool>,
    counters: Counters,
}

impl GbnSender {
    pub fn new(config: ProtocolConfig) -> Self {
        let space = SeqSpace::new(config.seq_space);
        Self {
            buffer: vec![None; space.size()],
            acked: vec![false; space.size()],
            space,
            base: 0,
            next: 0,
            counters: Counters::default(),
            config,
        }
    }

    pub fn base(&self) -> usize {
        self.base
    }

    pub fn next_seq(&self) -> usize {
        self.next
    }

    /// Number of packets in `[base, next)`.
    pub fn in_flight(&self) -> usize {
        self.space.distance(self.base, self.next)
    }

    fn reset(&mut self) {
        self.base = 0;
        self.next = 0;
        self.buffer.fill(None);
        self.acked.fill(false);
        self.counters = Counters::default();
    }
}

impl TransportProtocol for GbnSender {
    fn init(&mut self, ctx: &mut dyn SystemContext) {
        self.reset();
        ctx.log(&format!(
            "GBN sender ready (window={}, seq space={})",
            self.config.window_size, self.config.seq_space
        ));
    }

    fn on_app_data(&mut self, ctx: &mut dyn SystemContext, message: Message) -> Admission {
        if self.in_flight() >= self.config.window_size {
            ctx.log("New message arrives, send window is full");
            self.counters.window_full += 1;
            return Admission::WindowFull;
        }

        let seq = self.next;
        let packet = checksum::seal(Packet::data(self.space.to_wire(seq), &message));
        self.buffer[seq] = Some(packet);
        self.acked[seq] = false;

        ctx.log(&format!("Sending packet {seq}"));
        ctx.send_packet(packet);

        if self.base == self.next {
            ctx.start_timer(self.config.rtt);
        }
        self.next = self.space.advance(self.next);
        ctx.record_metric("inflight", self.in_flight() as f64);

        Admission::Accepted { seq }
    }

    fn on_packet(&mut self, ctx: &mut dyn SystemContext, packet: Packet) {
        if checksum::is_corrupted(&packet) {
            ctx.log("Corrupted ACK received, ignored");
            return;
        }
        self.counters.acks_received += 1;

        let in_flight = self.in_flight();
        let Some(ack) = self
            .space
            .from_wire(packet.acknum)
            .filter(|ack| self.space.in_window(*ack, self.base, in_flight))
        else {
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

        while self.base != self.next && self.acked[self.base] {
            self.acked[self.base] = false;
            self.buffer[self.base] = None;
            self.base = self.space.advance(self.base);
        }
        ctx.record_metric("inflight", self.in_flight() as f64);

        ctx.stop_timer();
        if self.base != self.next {
            ctx.start_timer(self.config.rtt);
        }
    }

    fn on_timer(&mut self, ctx: &mut dyn SystemContext) {
        ctx.log("Timeout, resending all unacked packets in window");
        for seq in self.space.range(self.base, self.next) {
            if self.acked[seq] {
                continue;
            }
            if let Some(packet) = self.buffer[seq] {
                ctx.log(&format!("Resending packet {seq}"));
                ctx.send_packet(packet);
                self.counters.packets_resent += 1;
            }
        }
        ctx.start_timer(self.config.rtt);
    }

    fn counters(&self) -> Counters {
        self.counters
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingContext;

    fn sender(window: usize, seq_space: usize) -> (GbnSender, RecordingContext) {
        let mut ctx = RecordingContext::default();
        let mut sender = GbnSender::new(ProtocolConfig::new(window, seq_space));
        sender.init(&mut ctx);
        (sender, ctx)
    }

    fn ack(seq: i32) -> Packet {
        checksum::seal(Packet::ack(seq))
    }

    fn corrupted_ack(seq: i32) -> Packet {
        let mut pkt = ack(seq);
        pkt.checksum = !pkt.checksum;
        pkt
    }

    fn submit(sender: &mut GbnSender, ctx: &mut RecordingContext, n: usize) {
        for i in 0..n {
            let msg = Message::filled(b'a' + i as u8);
            assert!(sender.on_app_data(ctx, msg).is_accepted());
        }
    }

    #[test]
    fn admits_up_to_window_then_rejects() {
        let (mut sender, mut ctx) = sender(6, 12);
        submit(&mut sender, &mut ctx, 6);
        assert_eq!(ctx.sent_seqs(), vec![0, 1, 2, 3, 4, 5]);
        assert!(ctx.sent.iter().all(|p| !checksum::is_corrupted(p)));
        assert_eq!(ctx.timer_starts, 1);

        let admission = sender.on_app_data(&mut ctx, Message::from("overflow"));
        assert_eq!(admission, Admission::WindowFull);
        assert_eq!(sender.counters().window_full, 1);
        assert_eq!(sender.in_flight(), 6);
        assert_eq!(ctx.sent.len(), 6);
    }

    #[test]
    fn in_order_acks_slide_base_and_stop_timer() {
        let (mut sender, mut ctx) = sender(6, 12);
        submit(&mut sender, &mut ctx, 3);
        for seq in 0..3 {
            sender.on_packet(&mut ctx, ack(seq));
        }
        assert_eq!(sender.base(), 3);
        assert_eq!(sender.in_flight(), 0);
        assert!(!ctx.timer_armed);
        assert_eq!(sender.counters().new_acks, 3);
    }

    #[test]
    fn out_of_order_ack_waits_for_base() {
        let (mut sender, mut ctx) = sender(6, 12);
        submit(&mut sender, &mut ctx, 3);
        sender.on_packet(&mut ctx, ack(1));
        assert_eq!(sender.base(), 0);
        assert!(ctx.timer_armed);

        sender.on_packet(&mut ctx, ack(0));
        assert_eq!(sender.base(), 2);
        assert!(ctx.timer_armed);
    }

    #[test]
    fn corrupted_ack_changes_nothing() {
        let (mut sender, mut ctx) = sender(6, 12);
        submit(&mut sender, &mut ctx, 2);
        sender.on_packet(&mut ctx, corrupted_ack(0));
        assert_eq!(sender.base(), 0);
        assert_eq!(sender.counters(), Counters::default());
    }

    #[test]
    fn duplicate_ack_is_counted_but_ignored() {
        let (mut sender, mut ctx) = sender(6, 12);
        submit(&mut sender, &mut ctx, 3);
        sender.on_packet(&mut ctx, ack(2));
        sender.on_packet(&mut ctx, ack(2));
        let counters = sender.counters();
        assert_eq!(counters.acks_received, 2);
        assert_eq!(counters.new_acks, 1);
        assert_eq!(counters.duplicate_acks(), 1);
    }

    #[test]
    fn ack_outside_window_is_ignored() {
        let (mut sender, mut ctx) = sender(6, 12);
        submit(&mut sender, &mut ctx, 3);
        for stale in [3, 7, 11, -1, 999_999] {
            sender.on_packet(&mut ctx, ack(stale));
        }
        assert_eq!(sender.base(), 0);
        assert_eq!(sender.in_flight(), 3);
        assert_eq!(sender.counters().new_acks, 0);
    }

    #[test]
    fn timeout_resends_whole_window_when_first_ack_corrupted() {
        let (mut sender, mut ctx) = sender(6, 12);
        submit(&mut sender, &mut ctx, 6);
        ctx.drain_sent();

        sender.on_packet(&mut ctx, corrupted_ack(0));
        ctx.expire_timer();
        sender.on_timer(&mut ctx);

        assert_eq!(ctx.sent_seqs(), vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(sender.counters().packets_resent, 6);
        assert!(ctx.timer_armed);
    }

    #[test]
    fn timeout_skips_packets_already_acked() {
        let (mut sender, mut ctx) = sender(6, 12);
        submit(&mut sender, &mut ctx, 4);
        sender.on_packet(&mut ctx, ack(2));
        ctx.drain_sent();

        ctx.expire_timer();
        sender.on_timer(&mut ctx);
        assert_eq!(ctx.sent_seqs(), vec![0, 1, 3]);
    }

    #[test]
    fn window_never_exceeds_limit_across_wraparound() {
        let (mut sender, mut ctx) = sender(4, 5);
        let mut next_ack = 0;
        for round in 0..40 {
            let _ = sender.on_app_data(&mut ctx, Message::filled(b'a' + (round % 26) as u8));
            assert!(sender.in_flight() <= 4);
            if round % 3 == 0 {
                sender.on_packet(&mut ctx, ack(next_ack));
                next_ack = (next_ack + 1) % 5;
            }
        }
        assert!(
            ctx.metrics
                .iter()
                .all(|(name, value)| name == "inflight" && *value <= 4.0)
        );
    }
}
