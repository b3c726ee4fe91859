use arq_lab_abstract::SimConfig;
use arq_lab_sdk::{ProtocolConfig, Variant, receiver, sender};
use arq_lab_simulator::{SimulationReport, Simulator};

fn main() {
    tracing_subscriber::fmt::init();

    let config = ProtocolConfig::default();
    let link = SimConfig {
        loss_rate: 0.1,
        corrupt_rate: 0.1,
        ..SimConfig::default()
    };

    for variant in [Variant::GoBackN, Variant::SelectiveRepeat] {
        let mut sim = Simulator::new(
            link.clone(),
            sender(variant, config.clone()),
            receiver(variant, config.clone()),
        );
        sim.schedule_app_send(0, "Hello over ARQ".into());
        sim.schedule_generated_messages(5, 20, 8);
        sim.run_until_complete();

        let report: SimulationReport = sim.export_report();
        println!(
            "{variant:?}: delivered {} of {} messages, {} retransmissions",
            report.delivered_data.len(),
            report.messages_offered,
            report.sender_counters.packets_resent
        );
    }
}
