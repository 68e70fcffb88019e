pub mod commands;

use clap::{Parser, Subcommand};
use sneakerdesk_core::config::CatalogProfile;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "sneakerdesk",
    about = "Sneakerdesk operator CLI",
    long_about = "Inspect configuration, check readiness, list advertised tools, and run one chat turn against the configured model and tool endpoint.",
    after_help = "Examples:\n  sneakerdesk doctor --json\n  sneakerdesk tools --profile extended\n  sneakerdesk chat \"Where is my order ORD123?\" --user-id u-1"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, tool catalog, and tool endpoint reachability")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "List the tool descriptors advertised to the model")]
    Tools {
        #[arg(long, help = "Catalog profile to list instead of the configured one")]
        profile: Option<CatalogProfile>,
    },
    #[command(about = "Run one orchestration for a message and print the outcome as JSON")]
    Chat {
        message: String,
        #[arg(long, default_value = "anonymous", help = "Identity prefixed to the message")]
        user_id: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Tools { profile } => commands::tools::run(profile),
        Command::Chat { message, user_id } => commands::chat::run(&message, &user_id),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
