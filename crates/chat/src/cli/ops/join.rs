use clap::Args;

use crate::cli::chat::{open_session, run_interactive, ChatArgs, ChatError};

#[derive(Args, Debug, Clone)]
pub struct Join {
    /// Tunnel id shared by whoever created it
    pub id: String,

    #[command(flatten)]
    pub chat: ChatArgs,
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Join {
    type Error = ChatError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let options = self.chat.session_options(ctx, &self.id, false)?;
        let (session, events) = open_session(ctx, options).await?;
        run_interactive(session, events).await
    }
}
