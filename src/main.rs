use std::sync::Arc;

use clap::Parser;

use embermq::args::Args;
use embermq::config::MqttConfig;
use embermq::mqtt::alias::TopicAliasLimiter;
use embermq::mqtt::decoder::Mqtt5PublishDecoder;
use embermq::mqtt::disconnect::Disconnector;
use embermq::mqtt::BrokerId;
use embermq::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    embermq::bootstrap(args.log)?;

    let config = match &args.config {
        Some(path) => embermq::config::read(path)?,
        None => MqttConfig::default(),
    };

    let broker_id = BrokerId::generate();

    let alias_limiter = Arc::new(TopicAliasLimiter::new(
        config.topic_alias_global_memory_hard_limit,
    ));

    let _decoder = Mqtt5PublishDecoder::new(
        &config,
        broker_id.clone(),
        Disconnector::new(config.reason_strings_enabled),
        alias_limiter,
    );

    tracing::info!(%broker_id, "broker core initialized");

    // Listener setup and the accept loop go here.

    Ok(())
}
