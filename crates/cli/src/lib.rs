pub mod bootstrap;
pub mod commands;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "brokerflow",
    about = "Brokerflow automation operator CLI",
    long_about = "Operate the Brokerflow workflow-automation runtime: migrations, rule \
                  inspection, manual triggers, and the long-running engine process.",
    after_help = "Examples:\n  brokerflow migrate\n  brokerflow rules list\n  brokerflow trigger claim_updated C-100 claim --data '{\"status\":\"submitted\"}'\n  brokerflow run"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Run the automation engine until interrupted")]
    Run,
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Inspect and manage automation rules")]
    Rules {
        #[command(subcommand)]
        command: RulesCommand,
    },
    #[command(about = "Manually synthesize and ingest one workflow event")]
    Trigger {
        #[arg(help = "Event type, e.g. claim_updated")]
        event_type: String,
        #[arg(help = "Entity document id")]
        entity_id: String,
        #[arg(help = "Entity type: quote|policy|claim|customer")]
        entity_type: String,
        #[arg(long, default_value = "{}", help = "Entity snapshot as a JSON object")]
        data: String,
    },
    #[command(about = "Inspect effective configuration values with secrets redacted")]
    Config,
}

#[derive(Debug, Subcommand)]
enum RulesCommand {
    #[command(about = "List every stored rule, soft-deleted included")]
    List,
    #[command(about = "Create a rule from a JSON definition file")]
    Create {
        #[arg(long, help = "Path to a JSON file holding the rule definition")]
        file: std::path::PathBuf,
    },
    #[command(about = "Soft-delete a rule (disable and stamp, never remove)")]
    Disable {
        #[arg(help = "Rule id")]
        id: String,
    },
}

pub async fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Run => return commands::run::run().await,
        Command::Migrate => commands::migrate::run().await,
        Command::Rules { command } => match command {
            RulesCommand::List => commands::rules::list().await,
            RulesCommand::Create { file } => commands::rules::create(&file).await,
            RulesCommand::Disable { id } => commands::rules::disable(&id).await,
        },
        Command::Trigger { event_type, entity_id, entity_type, data } => {
            commands::trigger::run(&event_type, &entity_id, &entity_type, &data).await
        }
        Command::Config => commands::config::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
