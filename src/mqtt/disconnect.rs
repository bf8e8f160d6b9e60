use crate::mqtt::connection::{ClientConnection, OutboundPacket};

/// DISCONNECT reason codes the broker sends from the PUBLISH decode path
/// (MQTT 3.14.2.1). Discriminants are the wire values.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DisconnectReasonCode {
    MalformedPacket = 0x81,
    ProtocolError = 0x82,
    TopicAliasInvalid = 0x94,
    QuotaExceeded = 0x97,
    PayloadFormatInvalid = 0x99,
}

/// An outbound DISCONNECT, queued for the connection's writer. Wire encoding
/// happens in the transport layer.
#[derive(Debug, PartialEq, Eq)]
pub struct Disconnect {
    pub reason_code: DisconnectReasonCode,
    pub reason_string: Option<String>,
}

/// Why a packet was rejected: the reason code for the wire, a fixed reason
/// string for the client, and a log line for the operator.
#[derive(Debug, PartialEq, Eq)]
pub struct Rejection {
    pub reason_code: DisconnectReasonCode,
    pub reason_string: &'static str,
    pub log_message: String,
}

/// The single sink for protocol-error terminations.
///
/// Every failure path in the decoders funnels through [`Self::disconnect`],
/// which logs the violation with the client's address, queues the DISCONNECT
/// and signals the connection to close. Whether the packet carries the
/// human-readable reason string is a configuration choice.
#[derive(Debug)]
pub struct Disconnector {
    reason_strings_enabled: bool,
}

impl Disconnector {
    pub fn new(reason_strings_enabled: bool) -> Self {
        Disconnector {
            reason_strings_enabled,
        }
    }

    pub fn disconnect(&self, connection: &ClientConnection, rejection: Rejection) {
        tracing::debug!(
            remote_addr = %connection.remote_addr(),
            reason_code = ?rejection.reason_code,
            "client {}; disconnecting",
            rejection.log_message,
        );

        connection.send(OutboundPacket::Disconnect(Disconnect {
            reason_code: rejection.reason_code,
            reason_string: self
                .reason_strings_enabled
                .then(|| rejection.reason_string.to_owned()),
        }));

        connection.close();
    }
}
