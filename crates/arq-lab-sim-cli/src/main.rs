use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use arq_lab_abstract::{CorruptAckPolicy, ProtocolConfig, ReceiverPolicy, SimConfig, Variant};
use arq_lab_loader::spec::{builtin_by_name, parse_variant};
use arq_lab_loader::{LoaderRequest, ProtocolDescriptor, ProtocolLoader};
use arq_lab_simulator::{ProtocolPair, SimulationReport, Simulator, scenario_runner};

#[derive(Parser, Debug)]
#[command(author, version, about = "ARQ Lab simulator (Go-Back-N / Selective Repeat)")]
struct Args {
    /// Load a scenario from disk and grade it.
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Protocol family used for both sides: `gbn` or `sr`.
    #[arg(long, default_value = "gbn")]
    protocol: String,

    /// Override the sender side with another builtin family.
    #[arg(long)]
    builtin_sender: Option<String>,
    /// Override the receiver side with another builtin family.
    #[arg(long)]
    builtin_receiver: Option<String>,

    #[arg(long, default_value_t = 6)]
    window: usize,
    #[arg(long, default_value_t = 12)]
    seq_space: usize,
    /// Receive window for SR (defaults to the send window).
    #[arg(long)]
    recv_window: Option<usize>,
    /// Timer duration for every retransmission timer arm.
    #[arg(long, default_value_t = 16)]
    rtt: u64,
    /// GBN receiver policy: `buffer_and_drain` or `strict_in_order`.
    #[arg(long, default_value = "buffer_and_drain", value_parser = parse_receiver_policy)]
    receiver_policy: ReceiverPolicy,
    /// SR receiver reply to corrupted packets: `echo_incoming` or `echo_last_in_order`.
    #[arg(long, default_value = "echo_last_in_order", value_parser = parse_corrupt_ack_policy)]
    corrupt_ack_policy: CorruptAckPolicy,
    /// GBN receiver ignores retransmissions of packets it already delivered
    /// instead of re-acking them.
    #[arg(long)]
    no_reack_delivered: bool,

    /// Number of generated application messages.
    #[arg(long, default_value_t = 20)]
    messages: u32,
    /// Time between generated messages.
    #[arg(long, default_value_t = 10)]
    interval: u64,

    #[arg(long, default_value_t = 0.1)]
    loss: f64,
    #[arg(long, default_value_t = 0.1)]
    corrupt: f64,
    #[arg(long, default_value_t = 1)]
    min_latency: u64,
    #[arg(long, default_value_t = 9)]
    max_latency: u64,
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Write a JSON trace of the finished simulation.
    #[arg(long)]
    trace_out: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt::init();
    info!("arq-lab-sim-cli starting…");

    let report = if let Some(path) = &args.scenario {
        let scenario_path = path
            .to_str()
            .context("Scenario path contains invalid UTF-8")?;
        scenario_runner::run_scenario(scenario_path, |protocol| args.load_pair(protocol.clone()))?
    } else {
        run_default_sim(&args)?
    };

    log_summary(&report);

    if let Some(trace_path) = &args.trace_out {
        write_trace(trace_path, &report)?;
    }

    Ok(())
}

fn parse_receiver_policy(value: &str) -> Result<ReceiverPolicy, String> {
    match value {
        "buffer_and_drain" => Ok(ReceiverPolicy::BufferAndDrain),
        "strict_in_order" => Ok(ReceiverPolicy::StrictInOrder),
        other => Err(format!("unknown receiver policy '{other}'")),
    }
}

fn parse_corrupt_ack_policy(value: &str) -> Result<CorruptAckPolicy, String> {
    match value {
        "echo_incoming" => Ok(CorruptAckPolicy::EchoIncoming),
        "echo_last_in_order" => Ok(CorruptAckPolicy::EchoLastInOrder),
        other => Err(format!("unknown corrupt-ack policy '{other}'")),
    }
}

impl Args {
    fn variant(&self) -> Result<Variant> {
        parse_variant(&self.protocol)
    }

    fn protocol_config(&self) -> ProtocolConfig {
        ProtocolConfig {
            window_size: self.window,
            seq_space: self.seq_space,
            recv_window: self.recv_window.unwrap_or(self.window),
            rtt: self.rtt,
            receiver_policy: self.receiver_policy,
            corrupt_ack_policy: self.corrupt_ack_policy,
            reack_delivered: !self.no_reack_delivered,
        }
    }

    fn sim_config(&self) -> SimConfig {
        SimConfig {
            loss_rate: self.loss,
            corrupt_rate: self.corrupt,
            min_latency: self.min_latency,
            max_latency: self.max_latency,
            seed: self.seed,
        }
    }

    fn loader_request(&self) -> Result<LoaderRequest> {
        Ok(LoaderRequest {
            sender: self.resolve_descriptor(self.builtin_sender.as_deref(), true)?,
            receiver: self.resolve_descriptor(self.builtin_receiver.as_deref(), false)?,
        })
    }

    fn resolve_descriptor(
        &self,
        builtin: Option<&str>,
        is_sender: bool,
    ) -> Result<Option<ProtocolDescriptor>> {
        if let Some(name) = builtin {
            let builtin = builtin_by_name(name, is_sender)?;
            return Ok(Some(ProtocolDescriptor::BuiltIn(builtin)));
        }
        Ok(None)
    }

    fn load_pair(&self, config: ProtocolConfig) -> Result<ProtocolPair> {
        let loader = ProtocolLoader::builder()
            .protocol_config(config)
            .default_variant(self.variant()?)
            .build()?;
        loader.load_pair(self.loader_request()?)
    }
}

fn run_default_sim(args: &Args) -> Result<SimulationReport> {
    let (sender, receiver) = args.load_pair(args.protocol_config())?;
    let mut sim = Simulator::new(args.sim_config(), sender, receiver);
    sim.schedule_generated_messages(0, args.messages, args.interval);

    info!("Starting default headless simulation…");
    sim.run_until_complete();
    info!("Simulation complete.");
    Ok(sim.export_report())
}

fn log_summary(report: &SimulationReport) {
    let tx = &report.sender_counters;
    let rx = &report.receiver_counters;
    info!(
        "Simulation time: {} | messages offered: {} | delivered: {} | packets sent: {}",
        report.duration,
        report.messages_offered,
        report.delivered_data.len(),
        report.sender_packet_count
    );
    info!(
        "ACKs received: {} (new {}) | resent: {} | window full: {} | packets received by B: {}",
        tx.acks_received, tx.new_acks, tx.packets_resent, tx.window_full, rx.packets_received
    );
}

fn write_trace(path: &Path, report: &SimulationReport) -> Result<()> {
    let data = serde_json::to_vec_pretty(report).context("Failed to serialize simulation trace")?;
    fs::write(path, &data)
        .with_context(|| format!("Failed to write trace file {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reack_delivered_defaults_on() {
        let args = Args::parse_from(["arq-lab-sim-cli"]);
        let config = args.protocol_config();
        assert!(config.reack_delivered);
        assert_eq!(config.corrupt_ack_policy, CorruptAckPolicy::EchoLastInOrder);
    }

    #[test]
    fn no_reack_delivered_flag_disables_reack() {
        let args = Args::parse_from([
            "arq-lab-sim-cli",
            "--no-reack-delivered",
            "--receiver-policy",
            "strict_in_order",
            "--window",
            "4",
        ]);
        let config = args.protocol_config();
        assert!(!config.reack_delivered);
        assert_eq!(config.receiver_policy, ReceiverPolicy::StrictInOrder);
        assert_eq!(config.recv_window, 4);
    }

    #[test]
    fn unknown_policy_is_rejected() {
        let result = Args::try_parse_from(["arq-lab-sim-cli", "--receiver-policy", "eager"]);
        assert!(result.is_err());
    }
}
