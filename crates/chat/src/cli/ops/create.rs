use clap::Args;

use crate::cli::chat::{open_session, run_interactive, ChatArgs, ChatError};

#[derive(Args, Debug, Clone)]
pub struct Create {
    /// Tunnel id to open; the broker picks one when omitted
    pub id: Option<String>,

    #[command(flatten)]
    pub chat: ChatArgs,
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Create {
    type Error = ChatError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let tunnel = self.id.as_deref().unwrap_or_default();
        let options = self.chat.session_options(ctx, tunnel, true)?;
        let (session, events) = open_session(ctx, options).await?;
        run_interactive(session, events).await
    }
}
