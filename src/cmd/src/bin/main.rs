use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;
use cmd::command::server;
use cmd::config::Config;
use cmd::config::LogLevel;
use cmd::error::Error;
use cmd::error::Result;
use tracing::info;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Clone)]
pub struct Cfg {
    /// Config file, keys may be overridden with APP_ prefixed variables (APP_QUERY__TIMEOUT).
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, value_enum)]
    log_level: Option<LogLevel>,
}

#[derive(Subcommand, Clone)]
enum Commands {
    /// Run server
    Server(Cfg),
}

#[derive(Parser)]
#[command(propagate_version = true)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let Some(Commands::Server(args)) = args.command else {
        return Err(Error::BadRequest("no command specified".to_string()));
    };

    let mut builder = config::Config::builder();
    if let Some(path) = &args.config {
        builder = builder.add_source(config::File::from(path.clone()));
    }
    let raw: Config = builder
        .add_source(config::Environment::with_prefix("APP").separator("__"))
        .build()?
        .try_deserialize()?;
    let mut cfg: common::config::Config = raw.try_into()?;
    if let Some(level) = args.log_level {
        cfg.log.level = level.into();
    }

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cfg.log.level)
        .finish();
    tracing::subscriber::set_global_default(subscriber).map_err(Error::SetGlobalDefaultError)?;

    let version = env!("CARGO_PKG_VERSION");
    info!("query engine v{version}");

    server::start(cfg).await
}
