use arq_lab_abstract::{
    Admission, Counters, Message, Packet, ProtocolConfig, ReceiverPolicy, SystemContext,
    TransportProtocol,
};

use crate::checksum;
use crate::seq::SeqSpace;

/// Go-Back-N receiver.
///
/// With [`ReceiverPolicy::BufferAndDrain`] every packet inside
/// `[expected, expected + window)` is buffered and acked, then the contiguous
/// run starting at `expected` is delivered. [`ReceiverPolicy::StrictInOrder`]
/// only accepts `expected` and re-acks the last in-order packet otherwise.
/// Corrupted packets are dropped without an ack in both modes.
pub struct GbnReceiver {
    config: ProtocolConfig,
    space: SeqSpace,
    expected: usize,
    buffer: Vec<Option<Packet>>,
    counters: Counters,
}

impl GbnReceiver {
    pub fn new(config: ProtocolConfig) -> Self {
        let space = SeqSpace::new(config.seq_space);
        Self {
            buffer: vec![None; space.size()],
            space,
            expected: 0,
            counters: Counters::default(),
            config,
        }
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    pub fn buffered(&self) -> usize {
        self.buffer.iter().filter(|slot| slot.is_some()).count()
    }

    fn send_ack(&self, ctx: &mut dyn SystemContext, seq: usize) {
        ctx.log(&format!("Sending ACK {seq}"));
        ctx.send_packet(checksum::seal(Packet::ack(self.space.to_wire(seq))));
    }

    /// Already-delivered packet from the window just below `expected`.
    fn is_delivered(&self, seq: usize) -> bool {
        let below = self.space.distance(seq, self.expected);
        below >= 1 && below <= self.config.window_size
    }

    fn drain(&mut self, ctx: &mut dyn SystemContext) {
        while let Some(packet) = self.buffer[self.expected].take() {
            ctx.log(&format!("Delivering packet {}", self.expected));
            ctx.deliver_data(&packet.payload);
            self.expected = self.space.advance(self.expected);
        }
    }

    fn buffer_and_drain(&mut self, ctx: &mut dyn SystemContext, seq: usize, packet: Packet) {
        if self.buffer[seq].is_none() {
            if seq == self.expected {
                ctx.log(&format!("Packet {seq} is expected"));
            } else {
                ctx.log(&format!("Packet {seq} is out of order, buffered"));
            }
            self.buffer[seq] = Some(packet);
        }
        self.send_ack(ctx, seq);
        self.drain(ctx);
    }

    fn strict_in_order(&mut self, ctx: &mut dyn SystemContext, seq: usize, packet: Packet) {
        if seq == self.expected {
            ctx.log(&format!("Packet {seq} is expected"));
            ctx.deliver_data(&packet.payload);
            self.send_ack(ctx, seq);
            self.expected = self.space.advance(self.expected);
        } else {
            let last = self.space.retreat(self.expected);
            ctx.log(&format!(
                "Packet {seq} out of order (expected {}), re-ACK {last}",
                self.expected
            ));
            self.send_ack(ctx, last);
        }
    }
}

impl TransportProtocol for GbnReceiver {
    fn init(&mut self, ctx: &mut dyn SystemContext) {
        self.expected = 0;
        self.buffer.fill(None);
        self.counters = Counters::default();
        ctx.log(&format!(
            "GBN receiver ready ({:?})",
            self.config.receiver_policy
        ));
    }

    fn on_packet(&mut self, ctx: &mut dyn SystemContext, packet: Packet) {
        if checksum::is_corrupted(&packet) {
            ctx.log("Corrupted packet received, ignored");
            return;
        }
        self.counters.packets_received += 1;

        let window = self.config.window_size;
        let Some(seq) = self.space.from_wire(packet.seqnum) else {
            ctx.log(&format!("Packet {} outside sequence space, ignored", packet.seqnum));
            return;
        };

        if !self.space.in_window(seq, self.expected, window) {
            if self.config.reack_delivered && self.is_delivered(seq) {
                ctx.log(&format!("Packet {seq} already delivered, re-ACK"));
                self.send_ack(ctx, seq);
            } else {
                ctx.log(&format!("Packet {seq} not in window, ignored"));
            }
            return;
        }

        match self.config.receiver_policy {
            ReceiverPolicy::BufferAndDrain => self.buffer_and_drain(ctx, seq, packet),
            ReceiverPolicy::StrictInOrder => self.strict_in_order(ctx, seq, packet),
        }
    }

    fn on_timer(&mut self, _ctx: &mut dyn SystemContext) {
        // Receiver has no timers
    }

    fn on_app_data(&mut self, _ctx: &mut dyn SystemContext, _message: Message) -> Admission {
        Admission::NotAccepted
    }

    fn counters(&self) -> Counters {
        self.counters
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingContext;

    fn receiver(policy: ReceiverPolicy) -> (GbnReceiver, RecordingContext) {
        let config = ProtocolConfig {
            receiver_policy: policy,
            ..ProtocolConfig::new(6, 12)
        };
        let mut ctx = RecordingContext::default();
        let mut receiver = GbnReceiver::new(config);
        receiver.init(&mut ctx);
        (receiver, ctx)
    }

    fn data(seq: i32) -> Packet {
        checksum::seal(Packet::data(seq, &Message::filled(b'a' + seq as u8)))
    }

    fn letters(ctx: &RecordingContext) -> Vec<u8> {
        ctx.delivered.iter().map(|d| d[0]).collect()
    }

    #[test]
    fn in_order_packets_are_delivered_and_acked() {
        let (mut rx, mut ctx) = receiver(ReceiverPolicy::BufferAndDrain);
        for seq in 0..3 {
            rx.on_packet(&mut ctx, data(seq));
        }
        assert_eq!(letters(&ctx), b"abc");
        assert_eq!(ctx.sent_acks(), vec![0, 1, 2]);
        assert!(ctx.sent.iter().all(|p| !checksum::is_corrupted(p)));
        assert_eq!(rx.expected(), 3);
    }

    #[test]
    fn buffers_ahead_and_drains_on_gap_fill() {
        let (mut rx, mut ctx) = receiver(ReceiverPolicy::BufferAndDrain);
        rx.on_packet(&mut ctx, data(2));
        rx.on_packet(&mut ctx, data(1));
        assert!(ctx.delivered.is_empty());
        assert_eq!(rx.buffered(), 2);

        rx.on_packet(&mut ctx, data(0));
        assert_eq!(letters(&ctx), b"abc");
        assert_eq!(ctx.sent_acks(), vec![2, 1, 0]);
        assert_eq!(rx.buffered(), 0);
    }

    #[test]
    fn duplicate_is_acked_but_delivered_once() {
        let (mut rx, mut ctx) = receiver(ReceiverPolicy::BufferAndDrain);
        rx.on_packet(&mut ctx, data(1));
        rx.on_packet(&mut ctx, data(1));
        rx.on_packet(&mut ctx, data(0));
        assert_eq!(letters(&ctx), b"ab");
        assert_eq!(ctx.sent_acks(), vec![1, 1, 0]);
    }

    #[test]
    fn corrupted_packet_is_silently_dropped() {
        let (mut rx, mut ctx) = receiver(ReceiverPolicy::BufferAndDrain);
        let mut pkt = data(0);
        pkt.payload[0] = b'Z';
        rx.on_packet(&mut ctx, pkt);
        assert!(ctx.sent.is_empty());
        assert!(ctx.delivered.is_empty());
        assert_eq!(rx.counters().packets_received, 0);
    }

    #[test]
    fn packet_beyond_window_is_ignored() {
        // leave a gap between the receive window and the delivered window
        let mut ctx = RecordingContext::default();
        let mut rx = GbnReceiver::new(ProtocolConfig::new(6, 14));
        rx.init(&mut ctx);

        rx.on_packet(&mut ctx, data(6));
        assert!(ctx.sent.is_empty());
        assert_eq!(rx.buffered(), 0);
    }

    #[test]
    fn delivered_packet_is_reacked() {
        let (mut rx, mut ctx) = receiver(ReceiverPolicy::BufferAndDrain);
        rx.on_packet(&mut ctx, data(0));
        ctx.drain_sent();
        rx.on_packet(&mut ctx, data(0));
        assert_eq!(ctx.sent_acks(), vec![0]);
        assert_eq!(letters(&ctx), b"a");
    }

    #[test]
    fn delivered_packet_is_ignored_without_reack() {
        let config = ProtocolConfig {
            reack_delivered: false,
            ..ProtocolConfig::new(6, 12)
        };
        let mut ctx = RecordingContext::default();
        let mut rx = GbnReceiver::new(config);
        rx.init(&mut ctx);

        rx.on_packet(&mut ctx, data(0));
        ctx.drain_sent();
        rx.on_packet(&mut ctx, data(0));
        assert!(ctx.sent.is_empty());
    }

    #[test]
    fn delivery_continues_across_wraparound() {
        let (mut rx, mut ctx) = receiver(ReceiverPolicy::BufferAndDrain);
        for seq in (0..12).chain(0..3) {
            rx.on_packet(&mut ctx, data(seq));
        }
        assert_eq!(ctx.delivered.len(), 15);
        assert_eq!(rx.expected(), 3);
    }

    fn resend_after_lost_acks(config: ProtocolConfig) -> Vec<u8> {
        let mut ctx = RecordingContext::default();
        let mut rx = GbnReceiver::new(config);
        rx.init(&mut ctx);
        for seq in 0..6 {
            rx.on_packet(&mut ctx, data(seq));
        }
        // every ack was lost: the sender times out and only the old 0 gets through
        rx.on_packet(&mut ctx, data(0));
        rx.on_packet(&mut ctx, data(6));
        letters(&ctx)
    }

    #[test]
    fn space_below_twice_window_redelivers_old_packet() {
        let tight = ProtocolConfig::new(6, 7);
        assert_eq!(tight.validate(), Ok(()));
        assert!(!tight.is_ambiguity_free(arq_lab_abstract::Variant::GoBackN));
        assert_eq!(resend_after_lost_acks(tight), b"abcdefga");

        let roomy = ProtocolConfig::new(6, 12);
        assert!(roomy.is_ambiguity_free(arq_lab_abstract::Variant::GoBackN));
        assert_eq!(resend_after_lost_acks(roomy), b"abcdefg");
    }

    #[test]
    fn strict_policy_rejects_out_of_order() {
        let (mut rx, mut ctx) = receiver(ReceiverPolicy::StrictInOrder);
        rx.on_packet(&mut ctx, data(0));
        rx.on_packet(&mut ctx, data(2));
        assert_eq!(letters(&ctx), b"a");
        assert_eq!(ctx.sent_acks(), vec![0, 0]);
        assert_eq!(rx.buffered(), 0);

        rx.on_packet(&mut ctx, data(1));
        rx.on_packet(&mut ctx, data(2));
        assert_eq!(letters(&ctx), b"abc");
    }
}
