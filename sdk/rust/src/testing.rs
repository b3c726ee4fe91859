use arq_lab_abstract::{Packet, SystemContext};

/// Context that records every command an endpoint issues.
/// Timer semantics follow the simulator: starting an armed timer and
/// stopping an idle one are no-ops.
#[derive(Default)]
pub struct RecordingContext {
    pub sent: Vec<Packet>,
    pub delivered: Vec<Vec<u8>>,
    pub timer_starts: usize,
    pub timer_stops: usize,
    pub timer_armed: bool,
    pub logs: Vec<String>,
    pub metrics: Vec<(String, f64)>,
}

impl RecordingContext {
    /// Take the packets sent since the last call.
    pub fn drain_sent(&mut self) -> Vec<Packet> {
        std::mem::take(&mut self.sent)
    }

    /// Simulate the timer going off.
    pub fn expire_timer(&mut self) {
        assert!(self.timer_armed, "expired a timer that was not running");
        self.timer_armed = false;
    }

    pub fn sent_seqs(&self) -> Vec<i32> {
        self.sent.iter().map(|p| p.seqnum).collect()
    }

    pub fn sent_acks(&self) -> Vec<i32> {
        self.sent.iter().map(|p| p.acknum).collect()
    }
}

impl SystemContext for RecordingContext {
    fn send_packet(&mut self, packet: Packet) {
        self.sent.push(packet);
    }

    fn start_timer(&mut self, _delay: u64) {
        if !self.timer_armed {
            self.timer_armed = true;
            self.timer_starts += 1;
        }
    }

    fn stop_timer(&mut self) {
        if self.timer_armed {
            self.timer_armed = false;
            self.timer_stops += 1;
        }
    }

    fn deliver_data(&mut self, data: &[u8]) {
        self.delivered.push(data.to_vec());
    }

    fn log(&mut self, message: &str) {
        self.logs.push(message.to_string());
    }

    fn now(&self) -> u64 {
        0
    }

    fn record_metric(&mut self, name: &str, value: f64) {
        self.metrics.push((name.to_string(), value));
    }
}
