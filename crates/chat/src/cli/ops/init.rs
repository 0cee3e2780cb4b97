use std::path::PathBuf;

use clap::Args;
use url::Url;

use tunnel_chat::state::{ChatConfig, ChatState, StateError};

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// Display name used when --name is not given
    #[arg(long)]
    pub name: Option<String>,

    /// Broker to use instead of the public relay
    #[arg(long)]
    pub broker: Option<Url>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Directory for daily rolling log files
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Seconds to wait for keys before giving up
    #[arg(long, default_value_t = 10)]
    pub key_timeout: u64,
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Init {
    type Error = StateError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut config = ChatConfig {
            display_name: self.name.clone(),
            log_level: self.log_level.clone(),
            log_dir: self.log_dir.clone(),
            key_ready_timeout_secs: self.key_timeout,
            ..Default::default()
        };
        if let Some(broker) = &self.broker {
            config.broker_url = broker.clone();
        }

        let state = ChatState::init(ctx.config_path.clone(), Some(config))?;

        let mut output = format!(
            "Initialized tunnel directory at {}\n",
            state.tunnel_dir.display()
        );
        output.push_str(&format!("  broker:       {}\n", state.config.broker_url));
        match &state.config.display_name {
            Some(name) => output.push_str(&format!("  display name: {}\n", name)),
            None => output.push_str("  display name: (pass --name when chatting)\n"),
        }
        output.push_str(&format!("  log level:    {}", state.config.log_level));
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cli::op::{Op, OpContext};
    use common::transport::MemoryBroker;

    fn init_args() -> Init {
        Init {
            name: Some("alice".to_string()),
            broker: None,
            log_level: "debug".to_string(),
            log_dir: None,
            key_timeout: 5,
        }
    }

    #[tokio::test]
    async fn test_init_writes_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx =
            OpContext::with_transport(Arc::new(MemoryBroker::new()), ChatConfig::default());
        ctx.config_path = Some(dir.path().join("tunnel"));

        let output = init_args().execute(&ctx).await.unwrap();
        assert!(output.contains("display name: alice"));

        let state = ChatState::load(ctx.config_path.clone()).unwrap();
        assert_eq!(state.config.display_name.as_deref(), Some("alice"));
        assert_eq!(state.config.key_ready_timeout_secs, 5);

        assert!(matches!(
            init_args().execute(&ctx).await,
            Err(StateError::AlreadyInitialized)
        ));
    }
}
