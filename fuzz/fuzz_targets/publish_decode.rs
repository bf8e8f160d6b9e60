#![no_main]

use std::hint::black_box;
use std::sync::Arc;

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use embermq::config::MqttConfig;
use embermq::mqtt::alias::TopicAliasLimiter;
use embermq::mqtt::connection::ClientConnection;
use embermq::mqtt::decoder::Mqtt5PublishDecoder;
use embermq::mqtt::disconnect::Disconnector;
use embermq::mqtt::BrokerId;

fuzz_target!(|data: &[u8]| {
    let Some((&header, window)) = data.split_first() else {
        return;
    };

    let config = MqttConfig::default();
    let limiter = Arc::new(TopicAliasLimiter::new(
        config.topic_alias_global_memory_hard_limit,
    ));

    let (outbound_tx, _outbound_rx) = mpsc::unbounded_channel();
    let mut connection = ClientConnection::new(
        "127.0.0.1:1883".parse().unwrap(),
        outbound_tx,
        CancellationToken::new(),
        config.topic_alias_maximum,
        limiter.clone(),
    );

    let decoder = Mqtt5PublishDecoder::new(
        &config,
        BrokerId::new("fuzz"),
        Disconnector::new(true),
        limiter,
    );

    let _ = black_box(decoder.decode(&mut connection, Bytes::copy_from_slice(window), header));
});
