pub mod commands;

use clap::{Parser, Subcommand};
use leadline_core::Language;
use std::process::ExitCode;

use commands::request::RequestArgs;

#[derive(Debug, Parser)]
#[command(
    name = "leadline",
    about = "Leadline lead-capture CLI",
    long_about = "Talk to the lead-capture assistant, price projects, walk the estimate form, and check runtime readiness.",
    after_help = "Examples:\n  leadline chat --language es\n  leadline estimate --project kitchen --sqft 150\n  leadline doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Start an interactive chat with the lead-capture assistant")]
    Chat {
        #[arg(long, default_value = "en", help = "Conversation language (en|es)")]
        language: Language,
        #[arg(long, help = "Discard any saved conversation instead of offering to resume it")]
        fresh: bool,
    },
    #[command(about = "Price a project type for a given square footage")]
    Estimate {
        #[arg(long, help = "Project type key or label, e.g. kitchen")]
        project: String,
        #[arg(long, help = "Square footage; free text such as \"1,200 sq ft\" is accepted")]
        sqft: String,
    },
    #[command(about = "Submit the estimate request form and print the scheduling redirect")]
    Request {
        #[arg(long)]
        service: String,
        #[arg(long)]
        timeline: Option<String>,
        #[arg(long)]
        budget: Option<String>,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        phone: String,
        #[arg(long)]
        details: Option<String>,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, booking key readiness, and session store connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Chat { language, fresh } => {
            commands::chat::run(commands::chat::ChatArgs { language, fresh })
        }
        Command::Estimate { project, sqft } => commands::estimate::run(&project, &sqft),
        Command::Request { service, timeline, budget, name, email, phone, details } => {
            commands::request::run(RequestArgs {
                service,
                timeline,
                budget,
                name,
                email,
                phone,
                details,
            })
        }
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Migrate => commands::migrate::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
