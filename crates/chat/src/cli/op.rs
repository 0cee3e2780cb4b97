use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use url::Url;

use common::transport::{HttpTransport, Transport, TransportError};
use tunnel_chat::state::ChatConfig;

#[derive(Clone)]
pub struct OpContext {
    /// Broker client (always initialized with the resolved URL)
    pub transport: Arc<dyn Transport>,
    /// Optional custom config path (defaults to ~/.tunnel)
    pub config_path: Option<PathBuf>,
    /// Loaded configuration, defaults if the directory is not initialized
    pub config: ChatConfig,
}

impl OpContext {
    /// Create context with the resolved broker URL and optional config path
    pub fn new(
        remote: Url,
        config_path: Option<PathBuf>,
        config: ChatConfig,
    ) -> Result<Self, TransportError> {
        Ok(Self {
            transport: Arc::new(HttpTransport::new(&remote)?),
            config_path,
            config,
        })
    }

    /// Context over an arbitrary transport
    #[cfg(test)]
    pub fn with_transport(transport: Arc<dyn Transport>, config: ChatConfig) -> Self {
        Self {
            transport,
            config_path: None,
            config,
        }
    }
}

#[async_trait::async_trait]
pub trait Op: Send + Sync {
    type Error: Error + Send + Sync + 'static;
    type Output;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error>;
}

#[macro_export]
macro_rules! command_enum {
    ($(($variant:ident, $type:ty)),* $(,)?) => {
        #[derive(Subcommand, Debug, Clone)]
        pub enum Command {
            $($variant($type),)*
        }

        #[derive(Debug)]
        pub enum OpOutput {
            $($variant(<$type as $crate::cli::op::Op>::Output),)*
        }

        #[derive(Debug, thiserror::Error)]
        pub enum OpError {
            $(
                #[error(transparent)]
                $variant(<$type as $crate::cli::op::Op>::Error),
            )*
        }

        #[async_trait::async_trait]
        impl $crate::cli::op::Op for Command {
            type Output = OpOutput;
            type Error = OpError;

            async fn execute(&self, ctx: &$crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
                match self {
                    $(
                        Command::$variant(op) => {
                            op.execute(ctx).await
                                .map(OpOutput::$variant)
                                .map_err(OpError::$variant)
                        },
                    )*
                }
            }
        }

        impl std::fmt::Display for OpOutput {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        OpOutput::$variant(output) => write!(f, "{}", output),
                    )*
                }
            }
        }
    };
}
