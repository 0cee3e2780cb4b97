use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::channel::{
    ChannelError, ChannelEvent, EventHandler, TunnelChannel, TunnelConfig, TunnelIdentity,
    DEFAULT_KEY_READY_TIMEOUT,
};
use crate::crypto::Signer;
use crate::keystore::ParticipantId;
use crate::message::ChatMessage;
use crate::transport::Transport;

/// Sent by a participant that joins a tunnel someone else created
pub const JOIN_ANNOUNCEMENT: &str = "I have joined the tunnel.";

/// How to start a [`Session`]
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Tunnel id to create or join; ignored when creating a random tunnel
    pub tunnel: String,
    pub display_name: String,
    pub config: TunnelConfig,
    /// Attach an ECDSA signature to every outgoing message
    pub sign_messages: bool,
    /// This session opens the tunnel rather than joining it
    pub create: bool,
    /// Greet the tunnel after joining; ignored when creating
    pub announce_join: bool,
    pub key_ready_timeout: Duration,
}

impl SessionOptions {
    pub fn new(tunnel: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            tunnel: tunnel.into(),
            display_name: display_name.into(),
            config: TunnelConfig::default(),
            sign_messages: false,
            create: false,
            announce_join: true,
            key_ready_timeout: DEFAULT_KEY_READY_TIMEOUT,
        }
    }

    /// Reject combinations a session cannot honour
    ///
    /// A signature and its key alone exceed what one RSA block holds, so
    /// signing is only available on unencrypted tunnels.
    pub fn validate(&self) -> Result<(), ChannelError> {
        if self.sign_messages && self.config.encryption {
            return Err(ChannelError::SignedEncryption);
        }
        Ok(())
    }
}

/// What a session reports to its owner
#[derive(Debug)]
pub enum SessionEvent {
    /// A chat message, with whatever its integrity checks turned up
    Message {
        message: ChatMessage,
        warnings: Vec<ChannelError>,
    },
    /// Something went wrong with one inbound payload
    Notice(ChannelError),
}

/// One participant's chat in one tunnel
///
/// Owns the tunnel channel, the display name and the optional signing key,
/// and turns raw channel events into [`SessionEvent`]s.
#[derive(Debug)]
pub struct Session {
    channel: TunnelChannel,
    display_name: String,
    signer: Option<Signer>,
}

struct SessionHandler<H> {
    handler: H,
}

#[async_trait]
impl<H> EventHandler for SessionHandler<H>
where
    H: Fn(SessionEvent) + Send + Sync + 'static,
{
    async fn handle(&self, event: ChannelEvent) {
        let event = match event {
            ChannelEvent::Message(data) => match serde_json::from_str::<ChatMessage>(&data) {
                Ok(mut message) => {
                    message.stamp_if_missing();
                    let warnings = message.inspect();
                    for warning in &warnings {
                        tracing::warn!("message from {}: {}", message.sender, warning);
                    }
                    SessionEvent::Message { message, warnings }
                }
                Err(e) => {
                    tracing::warn!("ignoring payload that is not a chat message: {}", e);
                    SessionEvent::Notice(ChannelError::MalformedPayload(e.to_string()))
                }
            },
            ChannelEvent::Dropped(e) => SessionEvent::Notice(e),
        };
        (self.handler)(event);
    }
}

impl Session {
    /// Create or join a tunnel and start streaming events to `handler`
    pub async fn start<H>(
        transport: Arc<dyn Transport>,
        options: SessionOptions,
        handler: H,
    ) -> Result<Self, ChannelError>
    where
        H: Fn(SessionEvent) + Send + Sync + 'static,
    {
        options.validate()?;
        let mut config = options.config;
        // only the creator waits quietly for the first peer; joiners announce
        config.first_user = options.create;
        config.random = config.random && options.create;

        let mut channel = TunnelChannel::builder(options.tunnel.clone())
            .config(config)
            .key_ready_timeout(options.key_ready_timeout)
            .build(transport);

        channel.create().await?;
        channel.init().await?;
        channel.connect(SessionHandler { handler }).await?;
        tracing::info!(
            "{} is in tunnel {} as {}",
            options.display_name,
            channel.identity().tunnel_id,
            channel.participant_id()
        );

        let signer = options.sign_messages.then(Signer::generate);
        let session = Self {
            channel,
            display_name: options.display_name,
            signer,
        };

        if !options.create && options.announce_join {
            session.announce_join(options.key_ready_timeout).await?;
        }
        Ok(session)
    }

    async fn announce_join(&self, timeout: Duration) -> Result<(), ChannelError> {
        if !self.wait_for_peers(timeout).await {
            tracing::info!("nobody else in the tunnel yet, skipping join announcement");
            return Ok(());
        }
        self.say(JOIN_ANNOUNCEMENT).await?;
        Ok(())
    }

    /// Wait until a message sent now would reach somebody
    ///
    /// Always true without encryption, where the broker does the fan-out.
    pub async fn wait_for_peers(&self, timeout: Duration) -> bool {
        if !self.channel.config().encryption {
            return true;
        }
        let own = self.channel.participant_id();
        self.channel.store().wait_for_others(own, timeout).await
    }

    /// Compose and send a chat message
    ///
    /// Encrypted tunnels get the compact form, leaving room for bodies of
    /// about 164 bytes minus the display name.
    pub async fn say(&self, body: &str) -> Result<ChatMessage, ChannelError> {
        let mut message = if self.channel.config().encryption {
            ChatMessage::compact(&self.display_name, body)
        } else {
            ChatMessage::compose(&self.display_name, body, self.signer.as_ref())?
        };
        let payload = serde_json::to_string(&message)
            .map_err(|e| ChannelError::MalformedPayload(e.to_string()))?;
        self.channel.send(&payload).await?;
        message.stamp_if_missing();
        Ok(message)
    }

    /// Close the tunnel channel
    pub fn leave(&mut self) {
        self.channel.close();
    }

    pub fn identity(&self) -> &TunnelIdentity {
        self.channel.identity()
    }

    pub fn participant_id(&self) -> &ParticipantId {
        self.channel.participant_id()
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn channel(&self) -> &TunnelChannel {
        &self.channel
    }
}
