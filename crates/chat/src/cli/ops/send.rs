use clap::Args;

use crate::cli::chat::{open_session, ChatArgs, ChatError};

/// Send one message to a tunnel and leave
#[derive(Args, Debug, Clone)]
pub struct SendMessage {
    /// Tunnel id to send to
    pub id: String,

    /// Message text
    pub message: String,

    #[command(flatten)]
    pub chat: ChatArgs,
}

#[async_trait::async_trait]
impl crate::cli::op::Op for SendMessage {
    type Error = ChatError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut options = self.chat.session_options(ctx, &self.id, false)?;
        options.announce_join = false;
        let timeout = options.key_ready_timeout;

        let (mut session, _events) = open_session(ctx, options).await?;
        if !session.wait_for_peers(timeout).await {
            session.leave();
            return Err(ChatError::NoPeers(self.id.clone(), timeout));
        }

        let result = session.say(&self.message).await;
        session.leave();
        let message = result?;
        Ok(format!(
            "[{}] {} -> {}: {}",
            message.time, message.sender, self.id, message.message
        ))
    }
}
