use arq_lab_abstract::{ProtocolConfig, TransportProtocol, Variant};
use arq_lab_sdk::{GbnReceiver, GbnSender, SrReceiver, SrSender};

use crate::BuiltinProtocol;

impl BuiltinProtocol {
    pub fn variant(&self) -> Variant {
        match self {
            BuiltinProtocol::GbnSender | BuiltinProtocol::GbnReceiver => Variant::GoBackN,
            BuiltinProtocol::SrSender | BuiltinProtocol::SrReceiver => Variant::SelectiveRepeat,
        }
    }

    pub fn is_sender(&self) -> bool {
        matches!(self, BuiltinProtocol::GbnSender | BuiltinProtocol::SrSender)
    }

    pub fn sender_for(variant: Variant) -> Self {
        match variant {
            Variant::GoBackN => BuiltinProtocol::GbnSender,
            Variant::SelectiveRepeat => BuiltinProtocol::SrSender,
        }
    }

    pub fn receiver_for(variant: Variant) -> Self {
        match variant {
            Variant::GoBackN => BuiltinProtocol::GbnReceiver,
            Variant::SelectiveRepeat => BuiltinProtocol::SrReceiver,
        }
    }
}

pub fn instantiate(
    builtin: BuiltinProtocol,
    config: &ProtocolConfig,
) -> Box<dyn TransportProtocol> {
    let config = config.clone();
    match builtin {
        BuiltinProtocol::GbnSender => Box::new(GbnSender::new(config)),
        BuiltinProtocol::GbnReceiver => Box::new(GbnReceiver::new(config)),
        BuiltinProtocol::SrSender => Box::new(SrSender::new(config)),
        BuiltinProtocol::SrReceiver => Box::new(SrReceiver::new(config)),
    }
}
