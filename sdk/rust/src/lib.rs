//! Rust SDK for ARQ Lab protocol implementations.
//! Provides the checksum and sequence-space helpers plus reference
//! Go-Back-N and Selective-Repeat senders and receivers.

pub mod checksum;
pub mod gbn_receiver;
pub mod gbn_sender;
pub mod seq;
pub mod sr_receiver;
pub mod sr_sender;

#[cfg(test)]
mod testing;

pub use arq_lab_abstract::{Packet, ProtocolConfig, SystemContext, TransportProtocol, Variant};
pub use gbn_receiver::GbnReceiver;
pub use gbn_sender::GbnSender;
pub use seq::SeqSpace;
pub use sr_receiver::SrReceiver;
pub use sr_sender::SrSender;

pub fn sender(variant: Variant, config: ProtocolConfig) -> Box<dyn TransportProtocol> {
    match variant {
        Variant::GoBackN => Box::new(GbnSender::new(config)),
        Variant::SelectiveRepeat => Box::new(SrSender::new(config)),
    }
}

pub fn receiver(variant: Variant, config: ProtocolConfig) -> Box<dyn TransportProtocol> {
    match variant {
        Variant::GoBackN => Box::new(GbnReceiver::new(config)),
        Variant::SelectiveRepeat => Box::new(SrReceiver::new(config)),
    }
}
