mod inspect;
mod run;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use locbot_config::LocBotConfig;

#[derive(Parser)]
#[command(name = "locbot", about = "Location check-in bot for Telegram groups")]
struct Cli {
    /// Config file (defaults to ~/.locbot/config.json5)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to Telegram and run the bot with its report schedule
    Run,
    /// Print a report for one group from the local database
    Report {
        /// Group chat id
        #[arg(short, long, allow_hyphen_values = true)]
        group: i64,

        /// Window start, HH:MM
        start: String,

        /// Window end, HH:MM
        end: String,

        /// Local date (YYYY-MM-DD); defaults to today in the configured timezone
        #[arg(short, long)]
        date: Option<chrono::NaiveDate>,
    },
    /// List registered groups
    Groups,
    /// Validate the configuration and print it (without the token)
    CheckConfig,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<LocBotConfig> {
    let config = match path {
        Some(path) => {
            let _ = dotenvy::dotenv();
            locbot_config::load_config_from(path)?
        }
        None => locbot_config::load_config()?,
    };
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json);

    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Run => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run::run_bot(config))?;
        }
        Commands::Report {
            group,
            start,
            end,
            date,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            let text = rt.block_on(inspect::report(&config, group, &start, &end, date))?;
            print!("{text}");
        }
        Commands::Groups => {
            let rt = tokio::runtime::Runtime::new()?;
            for line in rt.block_on(inspect::groups(&config))? {
                println!("{line}");
            }
        }
        Commands::CheckConfig => {
            config.validate()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            match config.resolve_bot_token() {
                Ok(_) => println!("bot token: set"),
                Err(e) => println!("bot token: {e}"),
            }
        }
    }

    Ok(())
}
