use std::path::PathBuf;

use arq_lab_abstract::{ProtocolConfig, TestAssertion, Variant};
use arq_lab_sdk::{receiver, sender};
use arq_lab_simulator::{ProtocolPair, scenario_runner};

fn scenario(name: &str) -> String {
    let path: PathBuf = [env!("CARGO_MANIFEST_DIR"), "..", "..", "scenarios", name]
        .iter()
        .collect();
    path.to_string_lossy().into_owned()
}

fn builtin(variant: Variant) -> impl FnOnce(&ProtocolConfig) -> anyhow::Result<ProtocolPair> {
    move |config| Ok((sender(variant, config.clone()), receiver(variant, config.clone())))
}

#[test]
fn gbn_corrupt_first_ack_scenario_passes() {
    let report = scenario_runner::run_scenario(
        &scenario("gbn_corrupt_first_ack.toml"),
        builtin(Variant::GoBackN),
    )
    .unwrap();
    assert_eq!(report.sender_counters.packets_resent, 6);
}

#[test]
fn sr_selective_resend_scenario_passes() {
    scenario_runner::run_scenario(
        &scenario("sr_selective_resend.toml"),
        builtin(Variant::SelectiveRepeat),
    )
    .unwrap();
}

#[test]
fn lossy_link_scenario_passes_for_both_variants() {
    for variant in [Variant::GoBackN, Variant::SelectiveRepeat] {
        scenario_runner::run_scenario(&scenario("lossy_link.toml"), builtin(variant)).unwrap();
    }
}

#[test]
fn failed_assertion_names_the_mismatch() {
    let mut scenario =
        scenario_runner::load_scenario(&scenario("sr_selective_resend.toml")).unwrap();
    for assertion in &mut scenario.assertions {
        if let TestAssertion::WindowFullCount { count } = assertion {
            *count = 0;
        }
    }
    let err = scenario_runner::execute(&scenario, builtin(Variant::SelectiveRepeat)).unwrap_err();
    assert!(err.to_string().contains("window-full rejections"));
}

#[test]
fn invalid_protocol_block_is_an_error() {
    let scenario = scenario_runner::parse_scenario(
        r#"
name = "zero-receive-window"
description = "SR with an empty receive window"

[config]
seed = 1

[protocol]
recv_window = 0

[[actions]]
type = "generate_messages"
start = 0
count = 3
interval = 5

[[assertions]]
type = "max_duration"
time = 500
"#,
    )
    .unwrap();

    let err = scenario_runner::execute(&scenario, builtin(Variant::SelectiveRepeat)).unwrap_err();
    assert!(err.to_string().contains("Invalid protocol configuration"));
    assert!(format!("{err:#}").contains("receive window must be at least 1"));
}

#[test]
fn zero_sequence_space_is_an_error() {
    let mut scenario =
        scenario_runner::load_scenario(&scenario("gbn_corrupt_first_ack.toml")).unwrap();
    scenario.protocol.seq_space = Some(0);
    assert!(scenario_runner::execute(&scenario, builtin(Variant::GoBackN)).is_err());
}

#[test]
fn missing_scenario_file_is_an_error() {
    let err = scenario_runner::run_scenario(
        &scenario("does_not_exist.toml"),
        builtin(Variant::GoBackN),
    )
    .unwrap_err();
    assert!(err.to_string().contains("Failed to read scenario file"));
}
