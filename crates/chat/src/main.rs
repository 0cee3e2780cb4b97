// CLI modules
mod cli;

use clap::{Parser, Subcommand};
use cli::{args::Args, op::Op, Create, Init, Join, SendMessage, Version};

use tunnel_chat::process::{init_logging, LogConfig, LogTarget};
use tunnel_chat::state::{resolve_remote, ChatState};

command_enum! {
    (Create, Create),
    (Init, Init),
    (Join, Join),
    (Send, SendMessage),
    (Version, Version),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Missing config directory just means defaults
    let state = match ChatState::load_or_default(args.config_path.clone()) {
        Ok(state) => state,
        Err(e) => {
            eprintln!("Error: Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    let level = match args.log_level.map(Ok).unwrap_or_else(|| state.config.log_level()) {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    // chat output owns stdout
    let target = match args.command {
        Command::Init(_) | Command::Version(_) => LogTarget::Stdout,
        _ => LogTarget::Stderr,
    };
    let guards = init_logging(&LogConfig {
        level,
        log_dir: state.config.log_dir.clone(),
        target,
    });

    // Resolve remote URL: explicit flag > config broker_url > public relay
    let remote = resolve_remote(args.remote, &state.config);

    let ctx = match cli::op::OpContext::new(remote, args.config_path, state.config) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error: Failed to create broker client: {}", e);
            std::process::exit(1);
        }
    };

    let code = match args.command.execute(&ctx).await {
        Ok(output) => {
            println!("{}", output);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };
    drop(guards);
    std::process::exit(code);
}
