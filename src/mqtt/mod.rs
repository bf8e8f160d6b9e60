use std::fmt;
use std::sync::Arc;

use rand::distributions::{Alphanumeric, DistString};

pub mod alias;
pub mod codec;
pub mod connection;
pub mod decoder;
pub mod disconnect;
pub mod publish;
pub mod topic;

/// Quality of Service level of a PUBLISH.
///
/// https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901234
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum QoS {
    AtMostOnce = 0,
    AtLeastOnce = 1,
    ExactlyOnce = 2,
}

impl QoS {
    /// Value 3 is reserved and must not appear on the wire.
    pub fn from_bits(bits: u8) -> Option<QoS> {
        match bits {
            0 => Some(QoS::AtMostOnce),
            1 => Some(QoS::AtLeastOnce),
            2 => Some(QoS::ExactlyOnce),
            _ => None,
        }
    }
}

/// Opaque tag identifying this broker instance, stamped into every decoded
/// PUBLISH so downstream components can tell which node accepted a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerId(Arc<str>);

impl BrokerId {
    pub fn generate() -> Self {
        BrokerId(Alphanumeric.sample_string(&mut rand::thread_rng(), 16).into())
    }

    pub fn new(id: impl Into<Arc<str>>) -> Self {
        BrokerId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BrokerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
