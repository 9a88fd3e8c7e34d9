//! vintage entrypoint.
use anyhow::{Context, Result};
use clap::Parser;
use core_actions::Session;
use core_config::load_from;
use core_events::Mode;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Once;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;

mod driver;
mod interactive;

use driver::Driver;

const LOG_FILE_NAME: &str = "vintage.log";

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "vintage", version, about = "Vim-style modal input interpreter")]
struct Args {
    /// Optional configuration file path (overrides discovery of `vintage.toml`).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
    /// Read key/Ex lines from a file instead of stdin.
    #[arg(long = "script", conflicts_with = "interactive")]
    pub script: Option<PathBuf>,
    /// Read raw key presses from the terminal.
    #[arg(long = "interactive")]
    pub interactive: bool,
    /// Mode the machine starts in.
    #[arg(long = "mode", default_value = "normal")]
    pub mode: Mode,
}

struct AppStartup {
    log_guard: Option<WorkerGuard>,
}

impl AppStartup {
    fn new() -> Self {
        Self { log_guard: None }
    }

    fn run(&mut self) -> Result<(Args, Driver)> {
        self.configure_logging()?;
        Self::install_panic_hook();

        info!(target: "runtime", "startup");
        let args = Args::parse();
        let config = load_from(args.config.clone())?;
        let session = Session::from_config(&config).context("building input session")?;
        let config_path = config.path.as_ref().map(|p| p.display().to_string());
        info!(
            target: "runtime.startup",
            config = config_path.as_deref(),
            config_override = args.config.is_some(),
            mode = %args.mode,
            interactive = args.interactive,
            "bootstrap_complete"
        );
        let driver = Driver::new(session, args.mode);
        Ok((args, driver))
    }

    fn configure_logging(&mut self) -> Result<()> {
        let log_dir = Path::new(".");
        let log_path = log_dir.join(LOG_FILE_NAME);
        if log_path.exists() {
            let _ = std::fs::remove_file(&log_path);
        }

        let file_appender = tracing_appender::rolling::never(log_dir, LOG_FILE_NAME);
        let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
        match tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(nb_writer)
            .try_init()
        {
            Ok(_) => {
                self.log_guard = Some(guard);
            }
            Err(_err) => {
                // Global subscriber already installed; dropping the guard stops the writer.
            }
        }

        Ok(())
    }

    fn install_panic_hook() {
        static HOOK: Once = Once::new();
        HOOK.call_once(|| {
            let default_panic = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                tracing::error!(target: "runtime.panic", ?info, "panic");
                default_panic(info);
            }));
        });
    }
}

fn main() -> Result<()> {
    let mut startup = AppStartup::new();
    let (args, mut driver) = startup.run()?;
    let outcome = if args.interactive {
        interactive::run(&mut driver)
    } else if let Some(path) = args.script.as_ref() {
        let file = File::open(path).with_context(|| format!("opening script {}", path.display()))?;
        driver.run_lines(BufReader::new(file), &mut io::stdout().lock())
    } else {
        driver.run_lines(io::stdin().lock(), &mut io::stdout().lock())
    };
    info!(target: "runtime", ok = outcome.is_ok(), "shutdown");
    outcome
}
