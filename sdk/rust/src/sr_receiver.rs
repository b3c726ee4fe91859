use arq_lab_abstract::{
    Admission, CorruptAckPolicy, Counters, Message, Packet, ProtocolConfig, SystemContext,
    TransportProtocol,
};

use crate::checksum;
use crate::seq::SeqSpace;

/// Selective-Repeat receiver.
///
/// Out-of-order packets inside `[recv_base, recv_base + recv_window)` are held
/// in a ring of `recv_window` slots whose head always corresponds to
/// `recv_base`. Every arrival is answered with an ack, including corrupted
/// and out-of-window ones; see [`CorruptAckPolicy`] for what a corrupted
/// packet is answered with.
pub struct SrReceiver {
    config: ProtocolConfig,
    space: SeqSpace,
    recv_base: usize,
    slots: Vec<Option<Packet>>,
    head: usize,
    counters: Counters,
}

impl SrReceiver {
    pub fn new(config: ProtocolConfig) -> Self {
        Self {
            space: SeqSpace::new(config.seq_space),
            slots: vec![None; config.recv_window],
            recv_base: 0,
            head: 0,
            counters: Counters::default(),
            config,
        }
    }

    pub fn recv_base(&self) -> usize {
        self.recv_base
    }

    pub fn buffered(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    fn slot_index(&self, rel: usize) -> usize {
        (self.head + rel) % self.slots.len()
    }

    fn ack_for(&self, packet: &Packet, corrupted: bool) -> i32 {
        match (corrupted, self.config.corrupt_ack_policy) {
            (true, CorruptAckPolicy::EchoLastInOrder) => {
                self.space.to_wire(self.space.retreat(self.recv_base))
            }
            _ => packet.seqnum,
        }
    }

    fn store(&mut self, ctx: &mut dyn SystemContext, packet: Packet) {
        let rel = self
            .space
            .from_wire(packet.seqnum)
            .map(|seq| self.space.distance(self.recv_base, seq))
            .filter(|rel| *rel < self.slots.len());

        let Some(rel) = rel else {
            ctx.log(&format!("Packet {} not in window, re-ACK only", packet.seqnum));
            return;
        };

        let index = self.slot_index(rel);
        if self.slots[index].is_none() {
            ctx.log(&format!("Packet {} buffered at offset {rel}", packet.seqnum));
            self.slots[index] = Some(packet);
        } else {
            ctx.log(&format!("Packet {} already buffered", packet.seqnum));
        }
    }

    fn drain(&mut self, ctx: &mut dyn SystemContext) {
        while let Some(packet) = self.slots[self.head].take() {
            ctx.log(&format!("Delivering packet {}", self.recv_base));
            ctx.deliver_data(&packet.payload);
            self.head = (self.head + 1) % self.slots.len();
            self.recv_base = self.space.advance(self.recv_base);
        }
    }
}

impl TransportProtocol for SrReceiver {
    fn init(&mut self, ctx: &mut dyn SystemContext) {
        self.recv_base = 0;
        self.head = 0;
        self.slots.fill(None);
        self.counters = Counters::default();
        ctx.log(&format!(
            "SR receiver ready (window={}, {:?})",
            self.config.recv_window, self.config.corrupt_ack_policy
        ));
    }

    fn on_packet(&mut self, ctx: &mut dyn SystemContext, packet: Packet) {
        let corrupted = checksum::is_corrupted(&packet);
        if corrupted {
            ctx.log("Corrupted packet received");
        } else {
            self.counters.packets_received += 1;
            self.store(ctx, packet);
        }

        let acknum = self.ack_for(&packet, corrupted);
        ctx.log(&format!("Sending ACK {acknum}"));
        ctx.send_packet(checksum::seal(Packet::ack(acknum)));

        self.drain(ctx);
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
