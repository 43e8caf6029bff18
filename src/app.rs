//! Application orchestration and command routing.
//!
//! Handles command-line argument parsing and delegates to the appropriate
//! command handlers.

use crate::commands;
use crate::logging;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;
use std::process;

/// Record and play back voice memos from the terminal
#[derive(Parser)]
#[command(name = "vmemo")]
#[command(version)]
#[command(about = "Record and play back voice memos from the terminal")]
#[command(long_about = "Record voice memos from the microphone with a live level readout,\n\
    and play them back with a countdown.\n\n\
    DEFAULT COMMAND:\n\
    If no command is specified, 'run' is used by default.\n\
    Run options (-d, --name, -m) can be used without explicitly saying 'run'.\n\n\
    EXAMPLES:\n\
    # Open the record/play screen\n\
    $ vmemo\n\n\
    # Record into a specific directory with a 30 second cap\n\
    $ vmemo -d ~/memos -m 30\n\n\
    # See what you have recorded so far\n\
    $ vmemo list")]
#[command(
    after_help = "CONFIGURATION:\n    Config file:        ~/.config/vmemo/vmemo.toml\n    Logs:               ~/.local/state/vmemo/vmemo.log.*"
)]
struct Cli {
    /// Directory to record into (run default command)
    #[arg(short, long, value_name = "DIR", global = true)]
    dir: Option<PathBuf>,

    /// Filename for the next recording instead of the timestamp default
    #[arg(long, value_name = "NAME", global = true)]
    name: Option<String>,

    /// Maximum recording length in seconds
    #[arg(short, long, value_name = "SECS", global = true)]
    max_duration: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the record/play screen (default)
    ///
    /// Press 'r'/'s' to start/stop recording, 'p'/'x' to start/stop
    /// playback, 'q' to quit. SIGUSR1 stops an active recording.
    #[command(visible_alias = "r")]
    Run {
        /// Directory to record into
        #[arg(short, long, value_name = "DIR")]
        dir: Option<PathBuf>,

        /// Filename for the next recording instead of the timestamp default
        #[arg(long, value_name = "NAME")]
        name: Option<String>,

        /// Maximum recording length in seconds
        #[arg(short, long, value_name = "SECS")]
        max_duration: Option<u64>,
    },

    /// List saved memos with durations
    ///
    /// Shows every memo in the recordings directory, newest first.
    #[command(visible_alias = "l")]
    List,

    /// List available audio input and output devices
    ///
    /// Shows device IDs, names, and configurations to help configure
    /// the correct device in vmemo.toml.
    #[command(name = "list-devices")]
    ListDevices,

    /// Open configuration file in your preferred editor
    ///
    /// Edit audio and recording settings. Uses $EDITOR, falling back to
    /// nano/vim.
    #[command(visible_alias = "c")]
    Config,

    /// Show recent log entries from the application
    ///
    /// Displays the tail of the most recent log file. Useful for
    /// troubleshooting issues.
    Logs {
        /// Number of lines to show
        #[arg(short = 'n', long, value_name = "LINES")]
        lines: Option<usize>,
    },

    /// Generate shell completion script
    ///
    /// Save the output to your shell's completion directory or source it
    /// directly.
    ///
    /// Examples:
    ///   vmemo completions bash > vmemo.bash
    ///   vmemo completions zsh > _vmemo
    Completions {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Runs the main application based on command-line arguments.
///
/// # Errors
/// - If logging initialization fails
/// - If command execution fails
pub async fn run() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Handle commands that don't need logging setup
    match &cli.command {
        Some(Commands::Completions { shell }) => {
            generate(*shell, &mut Cli::command(), "vmemo", &mut io::stdout());
            return Ok(());
        }
        Some(Commands::ListDevices) => {
            return match commands::handle_list_devices() {
                Ok(()) => Ok(()),
                Err(e) => {
                    eprintln!("Error: {e}");
                    process::exit(1);
                }
            };
        }
        Some(Commands::Logs { lines }) => {
            return match commands::handle_logs(*lines) {
                Ok(()) => Ok(()),
                Err(e) => {
                    eprintln!("Error: {e}");
                    process::exit(1);
                }
            };
        }
        _ => {}
    }

    // Initialize logging for all other commands
    logging::init_logging()?;

    match cli.command {
        None | Some(Commands::Run { .. }) => {
            // Default command is run; explicit run options take precedence
            // over the top-level ones
            let (dir, name, max_duration) = match cli.command {
                Some(Commands::Run {
                    dir,
                    name,
                    max_duration,
                }) => (
                    dir.or(cli.dir),
                    name.or(cli.name),
                    max_duration.or(cli.max_duration),
                ),
                None => (cli.dir, cli.name, cli.max_duration),
                _ => unreachable!(),
            };
            commands::handle_run(dir, name, max_duration).await?;
        }
        Some(Commands::List) => {
            commands::handle_list().await?;
        }
        Some(Commands::Config) => {
            commands::handle_config()?;
        }
        Some(Commands::Completions { .. })
        | Some(Commands::ListDevices)
        | Some(Commands::Logs { .. }) => {
            unreachable!("These commands are handled earlier")
        }
    }

    Ok(())
}
