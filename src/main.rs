use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::error;

use selection_capture::command::ScriptJob;
use selection_capture::system::default_service;
use selection_capture::{
    init_tracing, load_settings, LogLevel, MenuAction, SelectionError, Settings, Strategy,
    StrategySet,
};

#[derive(Debug, Parser)]
#[command(name = "selection-capture")]
#[command(about = "Reads the text selected in the focused application")]
struct Cli {
    /// Enable debug logging
    #[arg(long, default_value_t = false)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the selected text (exit code 1 when there is none)
    Get {
        /// Strategy to try, in order; repeat for a chain (default: from config)
        #[arg(long = "strategy", value_name = "NAME")]
        strategies: Vec<Strategy>,

        /// Do not add script-copy for apps with a configured copy script
        #[arg(long, default_value_t = false)]
        no_app_scripts: bool,
    },
    /// Paste TEXT into the focused application through the clipboard
    CopyPaste {
        text: String,

        /// Leave TEXT on the clipboard instead of restoring the previous content
        #[arg(long, default_value_t = false)]
        no_preserve: bool,
    },
    /// Look up the Copy or Paste menu item of the frontmost application
    Menu {
        #[arg(value_parser = parse_menu_action)]
        action: MenuAction,

        /// Report a disabled item as an error
        #[arg(long, default_value_t = false)]
        require_enabled: bool,
    },
    /// Run a script through the configured interpreter and print its output
    Script {
        source: String,

        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Print the screen bounds of the focused selection as JSON
    Bounds,
    /// Print the effective settings as JSON
    Config,
}

fn parse_menu_action(s: &str) -> Result<MenuAction, String> {
    MenuAction::from_str(s).ok_or_else(|| format!("expected 'copy' or 'paste', got '{s}'"))
}

type BoxError = Box<dyn std::error::Error + Send + Sync>;

async fn run(command: Command, settings: Settings) -> Result<ExitCode, BoxError> {
    if let Command::Config = command {
        println!("{}", settings.to_json()?);
        return Ok(ExitCode::SUCCESS);
    }

    let service = default_service(settings)?;

    match command {
        Command::Get {
            strategies,
            no_app_scripts,
        } => {
            let text = if !strategies.is_empty() {
                service.get_selected_text(&StrategySet::new(strategies)).await?
            } else if no_app_scripts {
                service
                    .get_selected_text(&service.settings().strategies)
                    .await?
            } else {
                service.get_selected_text_auto().await?
            };
            match text {
                Some(text) => {
                    println!("{text}");
                    Ok(ExitCode::SUCCESS)
                }
                None => Ok(ExitCode::from(1)),
            }
        }
        Command::CopyPaste { text, no_preserve } => {
            service.copy_then_paste(&text, !no_preserve).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Menu {
            action,
            require_enabled,
        } => {
            let handle = service.find_menu_item(action, require_enabled)?;
            let report = serde_json::json!({
                "action": action,
                "title": handle.title,
                "enabled": handle.enabled,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Script { source, timeout_ms } => {
            let mut job = ScriptJob::new(source);
            if let Some(ms) = timeout_ms {
                job = job.with_timeout(Duration::from_millis(ms));
            }
            println!("{}", service.run_script(&job).await?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Bounds => {
            let bounds = service.selection_bounds()?;
            println!("{}", serde_json::to_string_pretty(&bounds)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Config => Ok(ExitCode::SUCCESS),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let settings = load_settings();
    let level = if cli.debug {
        LogLevel::Debug
    } else {
        settings.log_level
    };
    init_tracing(level);

    match run(cli.command, settings).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("error: {e}");
            match e.downcast_ref::<SelectionError>() {
                Some(e) if e.is_recoverable() => ExitCode::from(3),
                _ => ExitCode::from(2),
            }
        }
    }
}
