//! Decoder for inbound MQTT 5 PUBLISH packets.
//!
//! The framing layer consumes the fixed header's remaining-length integer and
//! hands over the first header byte plus a byte window covering exactly one
//! packet's variable header and payload. Everything here is synchronous; a
//! validation failure disconnects the client with the appropriate reason code
//! and yields no message.

use std::num::NonZeroU16;
use std::sync::Arc;

use bytes::{Buf, Bytes};

use crate::config::MqttConfig;
use crate::mqtt::alias::TopicAliasLimiter;
use crate::mqtt::codec::{self, ReadError};
use crate::mqtt::connection::ClientConnection;
use crate::mqtt::disconnect::{DisconnectReasonCode, Disconnector, Rejection};
use crate::mqtt::publish::{
    user_properties_encoded_len, Mqtt5Publish, PayloadFormatIndicator,
};
use crate::mqtt::{topic, BrokerId, QoS};

// Property identifiers valid in a PUBLISH (MQTT 3.3.2.3).
const PAYLOAD_FORMAT_INDICATOR: u8 = 0x01;
const MESSAGE_EXPIRY_INTERVAL: u8 = 0x02;
const CONTENT_TYPE: u8 = 0x03;
const RESPONSE_TOPIC: u8 = 0x08;
const CORRELATION_DATA: u8 = 0x09;
const SUBSCRIPTION_IDENTIFIER: u8 = 0x0B;
const TOPIC_ALIAS: u8 = 0x23;
const USER_PROPERTY: u8 = 0x26;

/// Reason strings sent to the client alongside the DISCONNECT reason code.
mod reason {
    pub const REMAINING_LENGTH_TOO_SHORT: &str =
        "Sent a PUBLISH with an incorrect remaining length";
    pub const MALFORMED_UTF8_STRING: &str = "Sent a PUBLISH with a malformed UTF-8 string";
    pub const INVALID_QOS: &str = "Sent a PUBLISH with an invalid QoS";
    pub const DUP_WITH_QOS_ZERO: &str = "Sent a PUBLISH with QoS 0 and DUP flag set";
    pub const PACKET_IDENTIFIER_ZERO: &str = "Sent a PUBLISH with packet identifier 0";
    pub const INVALID_TOPIC: &str = "Sent a PUBLISH with an invalid topic name";
    pub const MALFORMED_PROPERTIES_LENGTH: &str =
        "Sent a PUBLISH with a malformed properties length";
    pub const INVALID_PROPERTY_IDENTIFIER: &str =
        "Sent a PUBLISH with an invalid property identifier";
    pub const DUPLICATE_PROPERTY: &str = "Sent a PUBLISH including a property more than once";
    pub const SUBSCRIPTION_IDENTIFIER: &str = "Sent a PUBLISH with subscription identifiers";
    pub const INVALID_PAYLOAD_FORMAT_INDICATOR: &str =
        "Sent a PUBLISH with an invalid payload format indicator";
    pub const INVALID_RESPONSE_TOPIC: &str =
        "Sent a PUBLISH with a wildcard character in the response topic";
    pub const TOPIC_ALIAS_ZERO: &str = "Sent a PUBLISH with topic alias = '0'";
    pub const TOPIC_ALIAS_TOO_LARGE: &str = "Sent a PUBLISH with too large topic alias";
    pub const TOPIC_ALIAS_UNMAPPED: &str = "Sent a PUBLISH with an unmapped topic alias";
    pub const TOPIC_ALIAS_ABSENT: &str =
        "Sent a PUBLISH with absent topic alias while topic name is zero length";
    pub const TOPIC_ALIAS_QUOTA_EXCEEDED: &str =
        "Sent a PUBLISH with a topic alias that exceeds the global memory hard limit";
    pub const USER_PROPERTIES_TOO_LARGE: &str = "Sent a PUBLISH with too large user properties";
    pub const PAYLOAD_NOT_UTF8: &str =
        "Sent a PUBLISH with a payload that is declared as UTF-8 but is not well-formed";
}

macro_rules! reject {
    ($code:ident, $reason:expr, $($fmt:tt)*) => {
        return Err(Rejection {
            reason_code: DisconnectReasonCode::$code,
            reason_string: $reason,
            log_message: format!($($fmt)*),
        })
    };
}

macro_rules! check_once {
    ($slot:expr, $name:literal) => {
        if $slot.is_some() {
            reject!(
                ProtocolError,
                reason::DUPLICATE_PROPERTY,
                concat!("sent a PUBLISH including the ", $name, " property more than once")
            );
        }
    };
}

/// `DUP`, QoS and `RETAIN` from the low nibble of the first header byte
/// (MQTT 3.3.1).
#[derive(Debug, Copy, Clone)]
struct PublishFlags {
    qos: QoS,
    dup: bool,
    retain: bool,
}

impl PublishFlags {
    fn from_header(header: u8) -> Result<Self, Rejection> {
        let Some(qos) = QoS::from_bits((header >> 1) & 0b11) else {
            reject!(
                MalformedPacket,
                reason::INVALID_QOS,
                "sent a PUBLISH with the reserved QoS value 3"
            );
        };

        let dup = header & 0b1000 != 0;

        // MQTT-3.3.1-2: there can be no duplicate delivery of a QoS 0 message.
        if dup && qos == QoS::AtMostOnce {
            reject!(
                ProtocolError,
                reason::DUP_WITH_QOS_ZERO,
                "sent a PUBLISH with QoS 0 and DUP flag set"
            );
        }

        Ok(PublishFlags {
            qos,
            dup,
            retain: header & 0b0001 != 0,
        })
    }
}

/// Accumulator for the property block, filled one property at a time.
#[derive(Default)]
struct PublishProperties {
    payload_format_indicator: Option<PayloadFormatIndicator>,
    message_expiry_interval: Option<u32>,
    content_type: Option<String>,
    response_topic: Option<String>,
    correlation_data: Option<Bytes>,
    topic_alias: Option<NonZeroU16>,
    user_properties: Vec<(String, String)>,
}

/// One shared instance decodes for every connection; all per-packet state is
/// local to [`Self::decode`].
#[derive(Debug)]
pub struct Mqtt5PublishDecoder {
    broker_id: BrokerId,
    disconnector: Disconnector,
    alias_limiter: Arc<TopicAliasLimiter>,
    max_message_expiry_interval: u32,
    validate_payload_format: bool,
    max_user_properties_length: usize,
}

impl Mqtt5PublishDecoder {
    pub fn new(
        config: &MqttConfig,
        broker_id: BrokerId,
        disconnector: Disconnector,
        alias_limiter: Arc<TopicAliasLimiter>,
    ) -> Self {
        Mqtt5PublishDecoder {
            broker_id,
            disconnector,
            alias_limiter,
            max_message_expiry_interval: config.max_message_expiry_interval,
            validate_payload_format: config.validate_payload_format,
            max_user_properties_length: config.max_user_properties_length,
        }
    }

    /// Decodes one PUBLISH from `bytes`, `header` being the packet's first
    /// byte (the framing layer already consumed the remaining-length integer).
    ///
    /// On a protocol violation the client is disconnected through the
    /// [`Disconnector`], exactly once, and `None` is returned; the caller
    /// only has to drop the connection.
    pub fn decode(
        &self,
        connection: &mut ClientConnection,
        bytes: Bytes,
        header: u8,
    ) -> Option<Mqtt5Publish> {
        match self.decode_inner(connection, bytes, header) {
            Ok(publish) => Some(publish),
            Err(rejection) => {
                self.disconnector.disconnect(connection, rejection);
                None
            }
        }
    }

    fn decode_inner(
        &self,
        connection: &mut ClientConnection,
        mut bytes: Bytes,
        header: u8,
    ) -> Result<Mqtt5Publish, Rejection> {
        let flags = PublishFlags::from_header(header)?;

        let topic_name = match codec::read_string(&mut bytes) {
            Ok(name) => name,
            Err(ReadError::MalformedUtf8String) => reject!(
                MalformedPacket,
                reason::MALFORMED_UTF8_STRING,
                "sent a PUBLISH with a malformed UTF-8 topic name"
            ),
            Err(_) => reject!(
                MalformedPacket,
                reason::REMAINING_LENGTH_TOO_SHORT,
                "sent a PUBLISH whose remaining length ends inside the topic name"
            ),
        };

        // An empty topic name defers to the topic alias (MQTT-3.3.2-1 allows
        // a zero-length name exactly for that case).
        let topic_name = if topic_name.is_empty() {
            None
        } else {
            if topic::contains_wildcard(&topic_name) {
                reject!(
                    MalformedPacket,
                    reason::INVALID_TOPIC,
                    "sent a PUBLISH with a wildcard character in the topic name ({topic_name:?})"
                );
            }
            Some(topic_name)
        };

        let packet_id = if flags.qos > QoS::AtMostOnce {
            let Ok(packet_id) = codec::read_u16(&mut bytes) else {
                reject!(
                    MalformedPacket,
                    reason::REMAINING_LENGTH_TOO_SHORT,
                    "sent a PUBLISH whose remaining length ends inside the packet identifier"
                );
            };

            if packet_id == 0 {
                reject!(
                    ProtocolError,
                    reason::PACKET_IDENTIFIER_ZERO,
                    "sent a PUBLISH with QoS > 0 and packet identifier 0"
                );
            }

            packet_id
        } else {
            0
        };

        let properties = self.read_properties(&mut bytes)?;
        // Everything after the property block is payload.
        let payload = bytes;

        let (resolved_topic, is_new_topic_alias) =
            self.resolve_topic_alias(connection, topic_name, properties.topic_alias)?;

        if self.validate_payload_format
            && properties.payload_format_indicator == Some(PayloadFormatIndicator::Utf8)
            && std::str::from_utf8(&payload).is_err()
        {
            reject!(
                PayloadFormatInvalid,
                reason::PAYLOAD_NOT_UTF8,
                "sent a PUBLISH with a payload that is declared as UTF-8 but is not well-formed"
            );
        }

        let user_properties_len = user_properties_encoded_len(&properties.user_properties);
        if user_properties_len > self.max_user_properties_length {
            reject!(
                MalformedPacket,
                reason::USER_PROPERTIES_TOO_LARGE,
                "sent a PUBLISH with {user_properties_len} bytes of user properties, over the limit of {}",
                self.max_user_properties_length
            );
        }

        Ok(Mqtt5Publish {
            topic: resolved_topic,
            qos: flags.qos,
            retain: flags.retain,
            dup: flags.dup,
            packet_id,
            payload,
            payload_format_indicator: properties.payload_format_indicator,
            content_type: properties.content_type,
            response_topic: properties.response_topic,
            correlation_data: properties.correlation_data,
            message_expiry_interval: properties
                .message_expiry_interval
                .map(|interval| interval.min(self.max_message_expiry_interval)),
            user_properties: properties.user_properties,
            is_new_topic_alias,
            broker_id: self.broker_id.clone(),
        })
    }

    fn read_properties(&self, bytes: &mut Bytes) -> Result<PublishProperties, Rejection> {
        let Ok(properties_len) = codec::read_variable_byte_integer(bytes) else {
            reject!(
                MalformedPacket,
                reason::MALFORMED_PROPERTIES_LENGTH,
                "sent a PUBLISH with a malformed properties length"
            );
        };

        let properties_len = properties_len as usize;
        if properties_len > bytes.remaining() {
            reject!(
                MalformedPacket,
                reason::REMAINING_LENGTH_TOO_SHORT,
                "sent a PUBLISH whose properties length exceeds the remaining length"
            );
        }

        // The loop consumes exactly this window. A property running past the
        // declared length fails its read inside the window, which covers the
        // residue case as well.
        let mut window = bytes.split_to(properties_len);

        let mut properties = PublishProperties::default();

        while window.has_remaining() {
            let identifier = codec::read_u8(&mut window).map_err(property_rejection)?;

            match identifier {
                PAYLOAD_FORMAT_INDICATOR => {
                    check_once!(properties.payload_format_indicator, "payload format indicator");

                    properties.payload_format_indicator =
                        match codec::read_u8(&mut window).map_err(property_rejection)? {
                            0 => Some(PayloadFormatIndicator::Unspecified),
                            1 => Some(PayloadFormatIndicator::Utf8),
                            value => reject!(
                                MalformedPacket,
                                reason::INVALID_PAYLOAD_FORMAT_INDICATOR,
                                "sent a PUBLISH with the invalid payload format indicator '{value}'"
                            ),
                        };
                }

                MESSAGE_EXPIRY_INTERVAL => {
                    check_once!(properties.message_expiry_interval, "message expiry interval");

                    properties.message_expiry_interval =
                        Some(codec::read_u32(&mut window).map_err(property_rejection)?);
                }

                CONTENT_TYPE => {
                    check_once!(properties.content_type, "content type");

                    properties.content_type =
                        Some(codec::read_string(&mut window).map_err(property_rejection)?);
                }

                RESPONSE_TOPIC => {
                    check_once!(properties.response_topic, "response topic");

                    let response_topic =
                        codec::read_string(&mut window).map_err(property_rejection)?;

                    if topic::contains_wildcard(&response_topic) {
                        reject!(
                            MalformedPacket,
                            reason::INVALID_RESPONSE_TOPIC,
                            "sent a PUBLISH with a wildcard character in the response topic ({response_topic:?})"
                        );
                    }

                    properties.response_topic = Some(response_topic);
                }

                CORRELATION_DATA => {
                    check_once!(properties.correlation_data, "correlation data");

                    properties.correlation_data =
                        Some(codec::read_binary(&mut window).map_err(property_rejection)?);
                }

                USER_PROPERTY => {
                    let key = codec::read_string(&mut window).map_err(property_rejection)?;
                    let value = codec::read_string(&mut window).map_err(property_rejection)?;

                    properties.user_properties.push((key, value));
                }

                TOPIC_ALIAS => {
                    check_once!(properties.topic_alias, "topic alias");

                    let alias = codec::read_u16(&mut window).map_err(property_rejection)?;

                    let Some(alias) = NonZeroU16::new(alias) else {
                        reject!(
                            ProtocolError,
                            reason::TOPIC_ALIAS_ZERO,
                            "sent a PUBLISH with topic alias = '0'"
                        );
                    };

                    properties.topic_alias = Some(alias);
                }

                // MQTT-3.3.4-6: subscription identifiers only ever flow from
                // the server to a client.
                SUBSCRIPTION_IDENTIFIER => reject!(
                    ProtocolError,
                    reason::SUBSCRIPTION_IDENTIFIER,
                    "sent a PUBLISH with subscription identifiers"
                ),

                identifier => reject!(
                    MalformedPacket,
                    reason::INVALID_PROPERTY_IDENTIFIER,
                    "sent a PUBLISH with the invalid property identifier '{identifier:#04x}'"
                ),
            }
        }

        Ok(properties)
    }

    /// Applies the topic alias semantics of MQTT 3.3.2.3.4 and returns the
    /// effective topic plus whether this packet established a fresh binding.
    ///
    /// A binding is installed and charged to the limiter *before* the hard
    /// limit is checked; on QUOTA_EXCEEDED the binding stays in place and is
    /// only released at connection teardown. The accounting depends on the
    /// incoming topic's length, so the check cannot be hoisted above the
    /// mutation.
    fn resolve_topic_alias(
        &self,
        connection: &mut ClientConnection,
        topic_name: Option<String>,
        topic_alias: Option<NonZeroU16>,
    ) -> Result<(String, bool), Rejection> {
        let Some(alias) = topic_alias else {
            match topic_name {
                Some(topic) => return Ok((topic, false)),
                None => reject!(
                    ProtocolError,
                    reason::TOPIC_ALIAS_ABSENT,
                    "sent a PUBLISH with absent topic alias while topic name is zero length"
                ),
            }
        };

        let mapping = connection.topic_alias_mapping();

        if alias.get() > mapping.maximum() {
            reject!(
                TopicAliasInvalid,
                reason::TOPIC_ALIAS_TOO_LARGE,
                "sent a PUBLISH with topic alias {alias} above the maximum of {}",
                mapping.maximum()
            );
        }

        match topic_name {
            None => match mapping.get(alias) {
                Some(topic) => Ok((topic.to_owned(), false)),
                None => reject!(
                    TopicAliasInvalid,
                    reason::TOPIC_ALIAS_UNMAPPED,
                    "sent a PUBLISH with the unmapped topic alias {alias}"
                ),
            },
            Some(topic) => {
                if let Some(previous) = mapping.insert(alias, topic.clone()) {
                    self.alias_limiter.remove_usage(&previous);
                }
                self.alias_limiter.add_usage(&topic);

                if self.alias_limiter.limit_exceeded() {
                    reject!(
                        QuotaExceeded,
                        reason::TOPIC_ALIAS_QUOTA_EXCEEDED,
                        "sent a PUBLISH with a topic alias that exceeds the global memory hard limit"
                    );
                }

                Ok((topic, true))
            }
        }
    }
}

fn property_rejection(error: ReadError) -> Rejection {
    match error {
        ReadError::MalformedUtf8String => Rejection {
            reason_code: DisconnectReasonCode::MalformedPacket,
            reason_string: reason::MALFORMED_UTF8_STRING,
            log_message: "sent a PUBLISH with a malformed UTF-8 string in a property".to_owned(),
        },
        _ => Rejection {
            reason_code: DisconnectReasonCode::MalformedPacket,
            reason_string: reason::MALFORMED_PROPERTIES_LENGTH,
            log_message: "sent a PUBLISH with a property running past the properties length"
                .to_owned(),
        },
    }
}
