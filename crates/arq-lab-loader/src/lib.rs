mod builtin;
pub mod spec;

use anyhow::{Context, Result};
use arq_lab_abstract::{ProtocolConfig, TransportProtocol, Variant};
use tracing::{info, warn};

/// Built-in Rust implementations shipped with the SDK.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuiltinProtocol {
    GbnSender,
    GbnReceiver,
    SrSender,
    SrReceiver,
}

/// Describes how to obtain a transport protocol implementation.
pub enum ProtocolDescriptor {
    BuiltIn(BuiltinProtocol),
    Rust(Box<dyn TransportProtocol>),
}

/// Pair of protocol descriptors used by the loader.
#[derive(Default)]
pub struct LoaderRequest {
    pub sender: Option<ProtocolDescriptor>,
    pub receiver: Option<ProtocolDescriptor>,
}

impl LoaderRequest {
    /// Both sides of one builtin protocol family.
    pub fn builtin(variant: Variant) -> Self {
        Self {
            sender: Some(ProtocolDescriptor::BuiltIn(BuiltinProtocol::sender_for(variant))),
            receiver: Some(ProtocolDescriptor::BuiltIn(BuiltinProtocol::receiver_for(variant))),
        }
    }
}

/// Builder for the loader. Holds the protocol constants every builtin is built with.
pub struct LoaderBuilder {
    config: ProtocolConfig,
    default_variant: Variant,
}

impl Default for LoaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LoaderBuilder {
    pub fn new() -> Self {
        Self {
            config: ProtocolConfig::default(),
            default_variant: Variant::GoBackN,
        }
    }

    pub fn protocol_config(mut self, config: ProtocolConfig) -> Self {
        self.config = config;
        self
    }

    /// Family used for a side the request leaves unspecified.
    pub fn default_variant(mut self, variant: Variant) -> Self {
        self.default_variant = variant;
        self
    }

    pub fn build(self) -> Result<ProtocolLoader> {
        self.config
            .validate()
            .context("Invalid protocol configuration")?;
        Ok(ProtocolLoader {
            config: self.config,
            default_variant: self.default_variant,
        })
    }
}

/// Loader capable of instantiating sender/receiver implementations.
pub struct ProtocolLoader {
    config: ProtocolConfig,
    default_variant: Variant,
}

impl ProtocolLoader {
    pub fn builder() -> LoaderBuilder {
        LoaderBuilder::new()
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn load_pair(
        &self,
        request: LoaderRequest,
    ) -> Result<(Box<dyn TransportProtocol>, Box<dyn TransportProtocol>)> {
        let sender = match request.sender {
            Some(desc) => self.load(desc)?,
            None => self.load_builtin(BuiltinProtocol::sender_for(self.default_variant)),
        };
        let receiver = match request.receiver {
            Some(desc) => self.load(desc)?,
            None => self.load_builtin(BuiltinProtocol::receiver_for(self.default_variant)),
        };
        Ok((sender, receiver))
    }

    pub fn load(&self, descriptor: ProtocolDescriptor) -> Result<Box<dyn TransportProtocol>> {
        match descriptor {
            ProtocolDescriptor::BuiltIn(builtin) => Ok(self.load_builtin(builtin)),
            ProtocolDescriptor::Rust(protocol) => Ok(protocol),
        }
    }

    fn load_builtin(&self, builtin: BuiltinProtocol) -> Box<dyn TransportProtocol> {
        let variant = builtin.variant();
        if !self.config.is_ambiguity_free(variant) {
            warn!(
                "{:?}: sequence space {} cannot disambiguate send window {} and receive window {}",
                builtin, self.config.seq_space, self.config.window_size, self.config.recv_window
            );
        }
        info!("Loading builtin {:?}", builtin);
        builtin::instantiate(builtin, &self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arq_lab_abstract::Message;

    #[test]
    fn invalid_config_is_rejected() {
        let result = ProtocolLoader::builder()
            .protocol_config(ProtocolConfig::new(6, 6))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn empty_request_uses_default_variant() {
        let loader = ProtocolLoader::builder()
            .default_variant(Variant::SelectiveRepeat)
            .build()
            .unwrap();
        let (sender, receiver) = loader.load_pair(LoaderRequest::default()).unwrap();
        assert_eq!(sender.counters(), Default::default());
        assert_eq!(receiver.counters(), Default::default());
    }

    #[test]
    fn builtin_flags() {
        assert!(BuiltinProtocol::SrSender.is_sender());
        assert!(!BuiltinProtocol::GbnReceiver.is_sender());
        assert_eq!(BuiltinProtocol::GbnReceiver.variant(), Variant::GoBackN);
    }

    #[test]
    fn receivers_refuse_application_data() {
        struct Null;
        impl arq_lab_abstract::SystemContext for Null {
            fn send_packet(&mut self, _packet: arq_lab_abstract::Packet) {}
            fn start_timer(&mut self, _delay: u64) {}
            fn stop_timer(&mut self) {}
            fn deliver_data(&mut self, _data: &[u8]) {}
            fn log(&mut self, _message: &str) {}
            fn now(&self) -> u64 {
                0
            }
        }

        let loader = ProtocolLoader::builder().build().unwrap();
        let (_, mut receiver) = loader.load_pair(LoaderRequest::builtin(Variant::GoBackN)).unwrap();
        let admission = receiver.on_app_data(&mut Null, Message::from("x"));
        assert_eq!(admission, arq_lab_abstract::Admission::NotAccepted);
    }
}
