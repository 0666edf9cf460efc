pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "coursebot",
    about = "Coursebot operator CLI",
    long_about = "Inspect configuration, check integration readiness, and exercise the course assistant without starting the server.",
    after_help = "Examples:\n  coursebot doctor --json\n  coursebot config\n  coursebot smoke\n  coursebot ask \"how much does it cost?\""
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Run the chat flow in-process with per-check timing details")]
    Smoke,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config and completion and spreadsheet readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Route one message through the assistant and print the reply")]
    Ask {
        message: String,
        #[arg(long, default_value = "cli", help = "Conversation key to answer under")]
        user: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Smoke => commands::smoke::run(),
        Command::Config => commands::config::run(),
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Ask { message, user } => commands::ask::run(&message, &user),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
