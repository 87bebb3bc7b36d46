use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;

use crate::{
    bot::{
        config::{BotConfig, ServiceCredentials},
        run_bot,
        telegram::TelegramTransport,
        transport::ConsoleTransport,
    },
    engine::Engine,
    sheet::{google::GoogleSheetsStore, memory::MemoryStore},
    utils::{
        clock::DefaultClock,
        dir::create_application_default_path,
        logging::{enable_logging, BOT_PREFIX},
    },
};

#[derive(Parser, Debug)]
#[command(name = "Timekeep", version, long_about = None)]
#[command(about = "Chat bot for time tracking over a linked spreadsheet", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, help = "Enable logging")]
    log: bool,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Run the bot against Telegram")]
    Serve {
        #[arg(
            long,
            help = "Application directory for logs. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
        )]
        dir: Option<PathBuf>,
    },
    #[command(
        about = "Run the bot on stdin/stdout with an in-process sheet store. Used for trying the conversation out and for debugging"
    )]
    Console {
        #[arg(
            long,
            help = "Application directory for logs. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
        )]
        dir: Option<PathBuf>,
    },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };

    match args.commands {
        Commands::Serve { dir } => {
            let dir = match dir {
                Some(v) => v,
                None => create_application_default_path()?,
            };
            enable_logging(BOT_PREFIX, &dir, logging_level, args.log)?;

            // All credentials are required up front; serving without them is
            // not an option.
            let config = BotConfig::from_env()?;
            let transport = TelegramTransport::new(&config.bot_token)?;
            let store = GoogleSheetsStore::new(config.store_access_token)
                .map_err(|e| anyhow!("failed to set up the sheets client: {e}"))?;
            let engine = Engine::new(
                store,
                Box::new(DefaultClock),
                config.credentials.client_email,
            );
            run_bot(engine, transport, DefaultClock).await
        }
        Commands::Console { dir } => {
            let dir = match dir {
                Some(v) => v,
                None => create_application_default_path()?,
            };
            enable_logging(BOT_PREFIX, &dir, logging_level, args.log)?;

            let service_account = ServiceCredentials::from_env()
                .map(|creds| creds.client_email)
                .unwrap_or_else(|_| "timekeep@local".into());
            let engine = Engine::new(
                MemoryStore::auto_creating(),
                Box::new(DefaultClock),
                service_account,
            );
            run_bot(engine, ConsoleTransport::new(), DefaultClock).await
        }
    }
}
