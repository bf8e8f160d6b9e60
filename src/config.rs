use std::path::Path;
use std::{fs, io};

use color_eyre::eyre::WrapErr;

/// MQTT protocol limits enforced by the broker.
///
/// Every field has a default, so a missing or empty file yields a working
/// configuration.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct MqttConfig {
    /// Ceiling for the Message Expiry Interval property, in seconds.
    ///
    /// A PUBLISH carrying a larger interval is not rejected; the interval is
    /// clamped to this value instead.
    pub max_message_expiry_interval: u32,

    /// Verify that a payload declared as UTF-8 (Payload Format Indicator = 1)
    /// actually is well-formed UTF-8, and disconnect the sender if it isn't.
    ///
    /// Costs one pass over every such payload, hence off by default.
    pub validate_payload_format: bool,

    /// Upper bound on the serialized size of all User Properties of a single
    /// packet, in bytes (property identifier plus both length-prefixed
    /// strings, per pair).
    pub max_user_properties_length: usize,

    /// The Topic Alias Maximum to report to the client and enforce.
    ///
    /// A topic alias is an integer that may be sent in lieu of a topic string
    /// to save bandwidth. The client specifies an alias for a topic string by
    /// sending at least one PUBLISH with both set, and then it may send an
    /// empty topic string for future PUBLISHes and provide the alias instead.
    ///
    /// Since 0 is not a valid topic alias, this is also the maximum _number_
    /// of topic aliases a single connection may use. The broker must store
    /// the aliased topic strings for the lifetime of the connection, so
    /// having a good limit is prescient. Set to 0 to disable topic aliases.
    ///
    /// https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901051
    pub topic_alias_maximum: u16,

    /// Hard limit on the total bytes of topic strings held in alias bindings
    /// across all connections.
    ///
    /// A PUBLISH that establishes a binding pushing the total past this limit
    /// is answered with a QUOTA_EXCEEDED disconnect.
    pub topic_alias_global_memory_hard_limit: usize,

    /// Include a human-readable Reason String in DISCONNECT packets sent for
    /// protocol violations.
    pub reason_strings_enabled: bool,
}

impl Default for MqttConfig {
    fn default() -> Self {
        MqttConfig {
            max_message_expiry_interval: u32::MAX,
            validate_payload_format: false,
            max_user_properties_length: 65_535,
            topic_alias_maximum: 100,
            topic_alias_global_memory_hard_limit: 5 * 1024 * 1024,
            reason_strings_enabled: true,
        }
    }
}

/// NOTE: uses blocking I/O internally.
pub fn read(path: &Path) -> crate::Result<MqttConfig> {
    let config_toml = if path == Path::new("-") {
        io::read_to_string(io::stdin().lock()).wrap_err("error reading from stdin")?
    } else {
        fs::read_to_string(path)
            .wrap_err_with(|| format!("error reading from {}", path.display()))?
    };

    toml::from_str(&config_toml).wrap_err("error parsing config from TOML")
}

#[cfg(test)]
mod tests {
    use super::MqttConfig;

    #[test]
    fn defaults_fill_missing_fields() {
        let config: MqttConfig = toml::from_str("").unwrap();

        assert_eq!(config.max_message_expiry_interval, u32::MAX);
        assert!(!config.validate_payload_format);
        assert_eq!(config.topic_alias_maximum, 100);
        assert!(config.reason_strings_enabled);
    }

    #[test]
    fn kebab_case_keys() {
        let config: MqttConfig = toml::from_str(
            r#"
            max-message-expiry-interval = 3600
            validate-payload-format = true
            max-user-properties-length = 1024
            topic-alias-maximum = 16
            topic-alias-global-memory-hard-limit = 4096
            reason-strings-enabled = false
            "#,
        )
        .unwrap();

        assert_eq!(config.max_message_expiry_interval, 3600);
        assert!(config.validate_payload_format);
        assert_eq!(config.max_user_properties_length, 1024);
        assert_eq!(config.topic_alias_maximum, 16);
        assert_eq!(config.topic_alias_global_memory_hard_limit, 4096);
        assert!(!config.reason_strings_enabled);
    }
}
