mod commands;

use anyhow::Result;
use cforge_common::AppConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cforge")]
#[command(about = "Compile C to WebAssembly and run it in a sandbox")]
#[command(version)]
pub struct Cli {
    /// Configuration file (defaults to $CFORGE_CONFIG, then the user config dir)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the compile server (default if no subcommand provided)
    Serve {
        /// Address to listen on, overriding the configuration
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Compile a C file through the same pipeline the server uses
    Compile {
        /// C source file
        file: PathBuf,

        /// Write the compiled module here instead of printing it as base64
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Execute the module in the sandbox after a successful compile
        #[arg(short, long)]
        run: bool,
    },
    /// Execute a compiled module (raw .wasm or base64 text)
    Run {
        /// Artifact file
        artifact: PathBuf,
    },
    /// List course topics, or show one topic
    Topics {
        /// Topic slug
        slug: Option<String>,
    },
    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write the default configuration
    Init {
        /// Destination (defaults to the user config dir)
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
    /// Print the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = cforge_server::init_tracing(cli.verbose, cli.log_file.as_deref());

    if let Some(Commands::Config { action }) = &cli.command {
        return match action {
            ConfigCommands::Init { path, force } => {
                commands::execute_config_init(path.clone(), *force)
            }
            ConfigCommands::Show => {
                let config = AppConfig::load(cli.config.as_deref())?;
                commands::execute_config_show(&config)
            }
        };
    }

    let mut config = AppConfig::load(cli.config.as_deref())?;

    let succeeded = match cli.command {
        Some(Commands::Serve { bind }) => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            cforge_server::run_server_app(config).await?;
            true
        }
        Some(Commands::Compile { file, output, run }) => {
            commands::execute_compile(&config, &file, output.as_deref(), run).await?
        }
        Some(Commands::Run { artifact }) => commands::execute_run(&config, &artifact).await?,
        Some(Commands::Topics { slug }) => commands::execute_topics(&config, slug.as_deref())?,
        Some(Commands::Config { .. }) => true,
        None => {
            // Default to serving
            cforge_server::run_server_app(config).await?;
            true
        }
    };

    if !succeeded {
        std::process::exit(1);
    }
    Ok(())
}
