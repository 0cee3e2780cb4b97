use std::time::Duration;

use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use common::channel::{ChannelError, TunnelConfig};
use common::session::{Session, SessionEvent, SessionOptions};
use tunnel_chat::state::{validate_display_name, StateError};

use crate::cli::op::OpContext;

/// Typed on its own line to leave an interactive chat
pub const QUIT_COMMAND: &str = "/quit";

/// Flags shared by every command that talks in a tunnel
#[derive(Args, Debug, Clone, Default)]
pub struct ChatArgs {
    /// Display name (defaults to the configured display_name)
    #[arg(long)]
    pub name: Option<String>,

    /// Encrypt messages for each participant
    #[arg(long)]
    pub encrypt: bool,

    /// Gzip messages before they leave this machine
    #[arg(long)]
    pub compress: bool,

    /// Sign every outgoing message (unencrypted tunnels only)
    #[arg(long, conflicts_with = "encrypt")]
    pub sign: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("no display name: pass --name or set display_name in the config")]
    MissingDisplayName,

    #[error("nobody answered in tunnel {0} within {1:?}")]
    NoPeers(String, Duration),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChatArgs {
    /// Pick the display name: `--name` first, then the config file
    pub fn display_name(&self, ctx: &OpContext) -> Result<String, ChatError> {
        let name = self
            .name
            .as_deref()
            .or(ctx.config.display_name.as_deref())
            .ok_or(ChatError::MissingDisplayName)?;
        Ok(validate_display_name(name)?)
    }

    /// Session options for `tunnel`; an empty id with `create` asks for a random one
    pub fn session_options(
        &self,
        ctx: &OpContext,
        tunnel: &str,
        create: bool,
    ) -> Result<SessionOptions, ChatError> {
        let mut options = SessionOptions::new(tunnel, self.display_name(ctx)?);
        options.config = TunnelConfig {
            encryption: self.encrypt,
            compression: self.compress,
            random: create && tunnel.is_empty(),
            ..Default::default()
        };
        options.sign_messages = self.sign;
        options.create = create;
        options.key_ready_timeout = ctx.config.key_ready_timeout();
        options.validate()?;
        Ok(options)
    }
}

/// Start a session whose events are queued for the caller
pub async fn open_session(
    ctx: &OpContext,
    options: SessionOptions,
) -> Result<(Session, mpsc::UnboundedReceiver<SessionEvent>), ChatError> {
    let (tx, rx) = mpsc::unbounded_channel();
    let session = Session::start(ctx.transport.clone(), options, move |event| {
        let _ = tx.send(event);
    })
    .await?;
    Ok((session, rx))
}

/// One line of terminal output for a session event
pub fn render(event: &SessionEvent) -> String {
    match event {
        SessionEvent::Message { message, warnings } => {
            let mut line = format!("[{}] {}: {}", message.time, message.sender, message.message);
            if message.is_signed() && warnings.is_empty() {
                line.push_str(" (signed)");
            }
            for warning in warnings {
                line.push_str(&format!(" [warning: {}]", warning));
            }
            line
        }
        SessionEvent::Notice(e) => format!("! {}", e),
    }
}

/// Relay stdin lines into the tunnel and print what arrives until the user quits
pub async fn run_interactive(
    mut session: Session,
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
) -> Result<String, ChatError> {
    let tunnel_id = session.identity().tunnel_id.clone();
    println!(
        "joined tunnel {} as {}, type {} to leave",
        tunnel_id,
        session.display_name(),
        QUIT_COMMAND
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == QUIT_COMMAND {
                    break;
                }
                match session.say(line).await {
                    // sealed messages are never addressed to their sender
                    Ok(message) if session.channel().config().encryption => {
                        println!("{}", render(&SessionEvent::Message { message, warnings: vec![] }));
                    }
                    Ok(_) => {}
                    Err(ChannelError::Closed) => break,
                    Err(e) => eprintln!("! could not send: {}", e),
                }
            }
            Some(event) = events.recv() => {
                println!("{}", render(&event));
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::debug!("interrupted");
                break;
            }
        }
    }

    session.leave();
    Ok(format!("left tunnel {}", tunnel_id))
}
