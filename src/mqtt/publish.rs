use bytes::Bytes;

use crate::mqtt::{BrokerId, QoS};

/// Payload Format Indicator property values (MQTT 3.3.2.3.2).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PayloadFormatIndicator {
    /// The payload is an opaque byte run.
    Unspecified = 0,
    /// The payload is UTF-8 encoded character data.
    Utf8 = 1,
}

/// A fully decoded and validated inbound PUBLISH, ready for routing.
///
/// `topic` is the real topic name: if the packet used a topic alias, it has
/// already been resolved against the connection's alias table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mqtt5Publish {
    pub topic: String,
    pub qos: QoS,
    pub retain: bool,
    pub dup: bool,
    /// 0 if and only if `qos` is [`QoS::AtMostOnce`].
    pub packet_id: u16,
    pub payload: Bytes,
    pub payload_format_indicator: Option<PayloadFormatIndicator>,
    pub content_type: Option<String>,
    pub response_topic: Option<String>,
    pub correlation_data: Option<Bytes>,
    /// Seconds until the message expires, clamped to the configured ceiling.
    /// `None` means the message never expires.
    pub message_expiry_interval: Option<u32>,
    /// In wire order. Duplicate keys are allowed (MQTT 3.3.2.3.7).
    pub user_properties: Vec<(String, String)>,
    /// True if and only if this packet established a fresh alias binding.
    pub is_new_topic_alias: bool,
    /// The broker instance that accepted the message.
    pub broker_id: BrokerId,
}

/// Serialized size of the User Properties block: one identifier byte plus
/// two length-prefixed strings per pair (MQTT 1.5.7).
pub(crate) fn user_properties_encoded_len(user_properties: &[(String, String)]) -> usize {
    user_properties
        .iter()
        .map(|(key, value)| 1 + 2 + key.len() + 2 + value.len())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::user_properties_encoded_len;

    #[test]
    fn encoded_len_counts_prefixes_and_identifier() {
        assert_eq!(user_properties_encoded_len(&[]), 0);

        let props = vec![
            ("a".to_owned(), "bc".to_owned()),
            ("a".to_owned(), String::new()),
        ];
        // (1 + 2 + 1 + 2 + 2) + (1 + 2 + 1 + 2 + 0)
        assert_eq!(user_properties_encoded_len(&props), 14);
    }
}
