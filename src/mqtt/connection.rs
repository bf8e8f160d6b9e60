use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::mqtt::alias::{TopicAliasLimiter, TopicAliasMapping};
use crate::mqtt::disconnect::Disconnect;

/// Packets queued for a connection's writer task.
#[derive(Debug, PartialEq, Eq)]
pub enum OutboundPacket {
    Disconnect(Disconnect),
}

/// Per-connection state the decoders need: where the client is, how to reach
/// its writer, how to signal close, and its topic alias bindings.
///
/// Topic aliases are not stored with the session state because they are
/// explicitly per-connection:
/// https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901113
///
/// Note that client->broker and broker->client PUBLISHes have separate topic
/// alias spaces, so these bindings only cover the inbound direction.
pub struct ClientConnection {
    remote_addr: SocketAddr,
    outbound: mpsc::UnboundedSender<OutboundPacket>,
    token: CancellationToken,
    topic_aliases: TopicAliasMapping,
    alias_limiter: Arc<TopicAliasLimiter>,
}

impl ClientConnection {
    pub fn new(
        remote_addr: SocketAddr,
        outbound: mpsc::UnboundedSender<OutboundPacket>,
        token: CancellationToken,
        topic_alias_maximum: u16,
        alias_limiter: Arc<TopicAliasLimiter>,
    ) -> Self {
        ClientConnection {
            remote_addr,
            outbound,
            token,
            topic_aliases: TopicAliasMapping::new(topic_alias_maximum),
            alias_limiter,
        }
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// The framing layer decodes one packet at a time per connection, so the
    /// decoder may hold this view for the duration of a synchronous decode.
    pub fn topic_alias_mapping(&mut self) -> &mut TopicAliasMapping {
        &mut self.topic_aliases
    }

    pub(crate) fn send(&self, packet: OutboundPacket) {
        // The receiver half lives in the writer task; if it is gone the
        // connection is already tearing down and the packet has nowhere to go.
        let _ = self.outbound.send(packet);
    }

    pub(crate) fn close(&self) {
        self.token.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for ClientConnection {
    fn drop(&mut self) {
        // Return the bytes pinned by this connection's alias bindings.
        // A binding left in place by a QUOTA_EXCEEDED disconnect is released
        // here too, and no earlier.
        for topic in self.topic_aliases.drain() {
            self.alias_limiter.remove_usage(&topic);
        }
    }
}
