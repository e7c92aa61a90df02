//! minion - a minimal terminal text editor
//!
//! minion puts the terminal into raw mode, decodes key presses (including
//! cursor-key escape sequences) and redraws the viewport with plain VT
//! escape sequences after every key.
//!
//! # Quick Start
//!
//! ```text
//! minion                      # Start with ~/.minion/config.toml
//! minion -c ./minion.toml     # Start with an explicit config file
//! ```
//!
//! # Keys
//!
//! | Key | Action |
//! |-----|--------|
//! | Arrow keys | Move the cursor |
//! | w/a/s/d | Move the cursor (configurable) |
//! | Ctrl+Q | Quit (configurable) |
//!
//! # Exit status
//!
//! `0` after the quit key, `1` after any terminal error.

mod config;
mod core;
mod ui;

use std::env;
use std::io::{self, Write};
use std::path::PathBuf;

use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::Config;
use crate::core::cursor::Cursor;
use crate::core::session::Termination;
use crate::core::terminal::{ModeControl, RawMode, TerminalError};
use crate::ui::teardown_frame;

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Command line options
#[derive(Debug, Default)]
struct Args {
    /// Explicit config file
    config_path: Option<PathBuf>,
}

fn print_version() {
    eprintln!("minion {}", VERSION);
}

fn print_help() {
    eprintln!("minion {} - a minimal terminal text editor", VERSION);
    eprintln!();
    eprintln!("Usage: minion [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -c, --config <PATH>   Read configuration from PATH");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Keys:");
    eprintln!("  Arrow keys, w/a/s/d   Move the cursor");
    eprintln!("  Ctrl+Q                Quit");
    eprintln!();
    eprintln!("Configuration: ~/.minion/config.toml");
    eprintln!("Log file:      ~/.minion/minion.log (filter with MINION_LOG)");
}

fn parse_args() -> Result<Args, String> {
    let args: Vec<String> = env::args().collect();
    let mut parsed = Args::default();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                std::process::exit(0);
            }
            "-c" | "--config" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing config path".to_string());
                }
                parsed.config_path = Some(PathBuf::from(&args[i]));
            }
            arg => {
                return Err(format!("Unknown argument: {}. Use -h for help.", arg));
            }
        }
        i += 1;
    }

    Ok(parsed)
}

/// Log to `~/.minion/minion.log`; stdout belongs to the renderer.
fn init_logging(config: &Config) {
    let log_path = crate::config::minion_dir()
        .map(|dir| dir.join("minion.log"))
        .unwrap_or_else(|| PathBuf::from("minion.log"));

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let filter = EnvFilter::try_from_env("MINION_LOG")
            .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

fn main() -> anyhow::Result<()> {
    let args = match parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    // An explicit config must load; the default one falls back with a warning
    let (config, load_error) = match args.config_path {
        Some(path) => (Config::load_from(&path)?, None),
        None => Config::load_or_default(),
    };

    init_logging(&config);
    info!(version = VERSION, "minion starting");
    if let Some(e) = load_error {
        warn!(error = %format!("{:#}", e), "Failed to load config; using defaults");
    }

    let code = run_editor(&config);
    info!(code, "minion exiting");
    std::process::exit(code);
}

/// Run one editing session on the controlling terminal and return the
/// process exit code.
#[cfg(unix)]
fn run_editor(config: &Config) -> i32 {
    use crate::core::input::ReadSource;
    use crate::core::session::Session;
    use crate::core::terminal::Tty;

    let mut raw = match RawMode::enter(Tty::new(), config.read_timeout()) {
        Ok(raw) => raw,
        Err(e) => return fatal(None::<&mut RawMode<Tty>>, &mut io::stdout(), &e),
    };

    let result = Session::initialize(
        || raw.geometry(),
        ReadSource::with_read_timeout(io::stdin(), config.read_timeout()),
        io::stdout(),
        config.session_options(),
    )
    .and_then(|mut session| session.run());

    match result {
        Ok(termination) => finish(&mut raw, termination),
        Err(e) => fatal(Some(&mut raw), &mut io::stdout(), &e),
    }
}

#[cfg(not(unix))]
fn run_editor(_config: &Config) -> i32 {
    eprintln!("minion currently only supports Unix terminals.");
    1
}

/// Graceful exit: the session already cleared the screen, so only the mode
/// is restored. A failed restore still ends with status 1.
#[cfg_attr(not(unix), allow(dead_code))]
fn finish<C: ModeControl>(raw: &mut RawMode<C>, termination: Termination) -> i32 {
    match raw.exit() {
        Ok(()) => termination.exit_code(),
        Err(e) => {
            error!(error = %e, "Failed to restore terminal mode");
            eprintln!("minion: {}", e);
            1
        }
    }
}

/// Single exit for fatal errors: clear the screen without redrawing rows,
/// restore the terminal mode, report, and hand back exit status 1.
#[cfg_attr(not(unix), allow(dead_code))]
fn fatal<C: ModeControl, W: Write>(raw: Option<&mut RawMode<C>>, out: &mut W, err: &TerminalError) -> i32 {
    error!(error = %err, "fatal terminal error");

    let _ = out.write_all(&teardown_frame(Cursor::default()));
    let _ = out.flush();

    if let Some(raw) = raw {
        // Reported, but never routed back through here
        if let Err(e) = raw.exit() {
            error!(error = %e, "Failed to restore terminal mode");
            eprintln!("minion: {}", e);
        }
    }

    eprintln!("minion: {}", err);
    1
}
