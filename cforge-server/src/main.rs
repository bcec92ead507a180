use anyhow::Result;
use cforge_common::AppConfig;
use cforge_server::{init_tracing, run_server_app};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cforge-server")]
#[command(about = "Compile C source to WebAssembly over HTTP")]
pub struct Args {
    /// Configuration file (defaults to $CFORGE_CONFIG, then the user config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to listen on, overriding the configuration
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Also write logs to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _guard = init_tracing(args.verbose, args.log_file.as_deref());

    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }

    run_server_app(config).await
}
