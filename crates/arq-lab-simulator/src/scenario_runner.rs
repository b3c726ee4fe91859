use anyhow::{Context, anyhow, bail};
use arq_lab_abstract::{
    Message, ProtocolConfig, SimConfig, TestAction, TestAssertion, TestScenario,
    TransportProtocol,
};
use std::fs;
use tracing::info;

use crate::{SimulationReport, Simulator};

/// Sender and receiver handed to the simulator.
pub type ProtocolPair = (Box<dyn TransportProtocol>, Box<dyn TransportProtocol>);

/// Default horizon when a scenario sets no `max_duration`.
const DEFAULT_MAX_DURATION: u64 = 100_000;

pub fn load_scenario(scenario_path: &str) -> anyhow::Result<TestScenario> {
    let content = fs::read_to_string(scenario_path)
        .with_context(|| format!("Failed to read scenario file {scenario_path}"))?;
    parse_scenario(&content)
}

pub fn parse_scenario(content: &str) -> anyhow::Result<TestScenario> {
    toml::from_str(content).context("Failed to parse scenario")
}

/// Load and execute a scenario file. `build` receives the protocol constants
/// the scenario asks for and returns the pair to test.
pub fn run_scenario<F>(scenario_path: &str, build: F) -> anyhow::Result<SimulationReport>
where
    F: FnOnce(&ProtocolConfig) -> anyhow::Result<ProtocolPair>,
{
    let scenario = load_scenario(scenario_path)?;
    execute(&scenario, build)
}

/// Configure actions (app sends, deterministic faults, workloads).
pub fn configure_actions(sim: &mut Simulator, actions: &[TestAction]) {
    for action in actions {
        match action {
            TestAction::AppSend { time, data } => {
                sim.schedule_app_send(*time, Message::from(data.as_str()));
            }
            TestAction::GenerateMessages {
                start,
                count,
                interval,
            } => {
                sim.schedule_generated_messages(*start, *count, *interval);
            }
            TestAction::DropNextFromSenderSeq { seq } => {
                sim.add_drop_sender_seq_once(*seq);
            }
            TestAction::DropNextFromReceiverAck { ack } => {
                sim.add_drop_receiver_ack_once(*ack);
            }
            TestAction::CorruptNextFromSenderSeq { seq } => {
                sim.add_corrupt_sender_seq_once(*seq);
            }
            TestAction::CorruptNextFromReceiverAck { ack } => {
                sim.add_corrupt_receiver_ack_once(*ack);
            }
        }
    }
}

/// Resolve the simulator and protocol configuration a scenario describes.
pub fn scenario_configs(scenario: &TestScenario) -> (SimConfig, ProtocolConfig) {
    let mut config = SimConfig::default();
    scenario.config.apply_to(&mut config);
    let mut protocol = ProtocolConfig::default();
    scenario.protocol.apply_to(&mut protocol);
    (config, protocol)
}

pub fn execute<F>(scenario: &TestScenario, build: F) -> anyhow::Result<SimulationReport>
where
    F: FnOnce(&ProtocolConfig) -> anyhow::Result<ProtocolPair>,
{
    info!("Running Scenario: {}", scenario.name);
    info!("Description: {}", scenario.description);

    let (config, protocol) = scenario_configs(scenario);
    protocol
        .validate()
        .context("Invalid protocol configuration in scenario")?;
    let (sender, receiver) = build(&protocol)?;

    let mut sim = Simulator::new(config, sender, receiver);
    configure_actions(&mut sim, &scenario.actions);

    // Call init after we've configured the simulator
    sim.init();

    let max_duration = scenario
        .assertions
        .iter()
        .find_map(|a| {
            if let TestAssertion::MaxDuration { time } = a {
                Some(*time)
            } else {
                None
            }
        })
        .unwrap_or(DEFAULT_MAX_DURATION);

    if !sim.run_until(max_duration) {
        bail!("Test timed out after {} time units", max_duration);
    }

    let report = sim.export_report();
    check_assertions(&scenario.assertions, &report)?;

    info!("Test Scenario Passed!");
    Ok(report)
}

pub fn check_assertions(
    assertions: &[TestAssertion],
    report: &SimulationReport,
) -> anyhow::Result<()> {
    for assertion in assertions {
        match assertion {
            TestAssertion::DataDelivered { data } => {
                let expected = Message::from(data.as_str());
                let found = report
                    .delivered_data
                    .iter()
                    .any(|d| d.as_slice() == expected.data.as_slice());
                if !found {
                    return Err(anyhow!(
                        "Assertion Failed: Data {:?} was not delivered",
                        data
                    ));
                }
            }
            TestAssertion::DeliveredInOrder { data } => {
                let expected: Vec<Vec<u8>> = data
                    .iter()
                    .map(|d| Message::from(d.as_str()).data.to_vec())
                    .collect();
                if report.delivered_data != expected {
                    let got: Vec<String> = report
                        .delivered_data
                        .iter()
                        .map(|d| {
                            String::from_utf8_lossy(d)
                                .trim_end_matches('\0')
                                .to_string()
                        })
                        .collect();
                    return Err(anyhow!(
                        "Assertion Failed: delivered {:?}, expected {:?}",
                        got,
                        data
                    ));
                }
            }
            TestAssertion::SenderPacketCount { min, max } => {
                if report.sender_packet_count < *min {
                    return Err(anyhow!(
                        "Assertion Failed: Sender sent {} packets, expected min {}",
                        report.sender_packet_count,
                        min
                    ));
                }
                if let Some(max) = max
                    && report.sender_packet_count > *max
                {
                    return Err(anyhow!(
                        "Assertion Failed: Sender sent {} packets, expected max {}",
                        report.sender_packet_count,
                        max
                    ));
                }
            }
            TestAssertion::PacketsResent { min, max } => {
                let resent = report.sender_counters.packets_resent;
                if resent < *min {
                    return Err(anyhow!(
                        "Assertion Failed: Sender resent {} packets, expected min {}",
                        resent,
                        min
                    ));
                }
                if let Some(max) = max
                    && resent > *max
                {
                    return Err(anyhow!(
                        "Assertion Failed: Sender resent {} packets, expected max {}",
                        resent,
                        max
                    ));
                }
            }
            TestAssertion::WindowFullCount { count } => {
                let refused = report.sender_counters.window_full;
                if refused != *count {
                    return Err(anyhow!(
                        "Assertion Failed: {} window-full rejections, expected {}",
                        refused,
                        count
                    ));
                }
            }
            TestAssertion::InflightNeverExceeds { limit } => {
                let peak = report.metric_max("inflight").unwrap_or(0.0);
                if peak > *limit as f64 {
                    return Err(anyhow!(
                        "Assertion Failed: {} packets in flight, limit {}",
                        peak,
                        limit
                    ));
                }
            }
            TestAssertion::MaxDuration { .. } => {} // Already checked
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = r#"
name = "two-messages"
description = "GBN over a perfect link"

[config]
seed = 3

[protocol]
window_size = 4
seq_space = 8
receiver_policy = "strict_in_order"

[[actions]]
type = "app_send"
time = 0
data = "hello"

[[actions]]
type = "generate_messages"
start = 10
count = 3
interval = 20

[[actions]]
type = "drop_next_from_sender_seq"
seq = 1

[[assertions]]
type = "data_delivered"
data = "hello"

[[assertions]]
type = "max_duration"
time = 500
"#;

    #[test]
    fn parses_actions_and_overrides() {
        let scenario = parse_scenario(SCENARIO).unwrap();
        assert_eq!(scenario.actions.len(), 3);
        assert_eq!(scenario.assertions.len(), 2);

        let (config, protocol) = scenario_configs(&scenario);
        assert_eq!(config.seed, 3);
        assert_eq!(config.loss_rate, 0.0);
        assert_eq!(protocol.window_size, 4);
        assert_eq!(protocol.recv_window, 4);
        assert_eq!(protocol.seq_space, 8);
        assert_eq!(
            protocol.receiver_policy,
            arq_lab_abstract::ReceiverPolicy::StrictInOrder
        );
        assert_eq!(protocol.rtt, 16);
    }

    #[test]
    fn unknown_action_type_is_rejected() {
        let bad = SCENARIO.replace("drop_next_from_sender_seq", "teleport");
        assert!(parse_scenario(&bad).is_err());
    }
}
