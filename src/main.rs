mod alert;
mod api;
mod config;
mod control;
mod display;
mod error;
mod gui;
mod logging;
mod offline;
mod snapshot;
mod stream;
#[cfg(test)]
mod testutil;

use crate::{
    alert::Notifier,
    api::{Backend, HttpBackend},
    config::{DashboardConfig, STATUS_PATH, STREAM_PATH},
    control::{Command, Controller, WithdrawForm},
    display::Display,
    gui::Gui,
    offline::OfflineCache,
    snapshot::StatusSnapshot,
    stream::{StatusStream, StreamEvent},
};
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use std::{
    fs,
    io::{self, Write},
    path::PathBuf,
    process,
    sync::{
        mpsc::{self, Receiver, RecvTimeoutError},
        Arc,
    },
    time::Duration,
};
use tracing::Level;

#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Backend base URL (default http://127.0.0.1:5000)
    #[arg(short, long)]
    url: Option<String>,
    /// JSON config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Directory for the offline cache (memory only when unset)
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,
    /// Set the log level (trace, debug, info, warn, error)
    #[arg(long, default_value_t = Level::WARN, value_name = "LEVEL")]
    log_level: Level,
    #[command(subcommand)]
    command: Option<Cmd>,
}

#[derive(Subcommand)]
enum Cmd {
    /// Follow live mining status (default)
    Watch {
        /// Enable the interactive dashboard
        #[arg(long)]
        gui: bool,
    },
    /// Start mining
    Start,
    /// Stop mining
    Stop,
    /// Request a BTC withdrawal
    Withdraw {
        /// Destination address
        #[arg(long)]
        to: String,
        /// Amount in BTC
        #[arg(long, allow_hyphen_values = true)]
        amount: String,
    },
    /// Print one status snapshot, served from cache when offline
    Status,
    /// Fetch one asset, served from cache when offline
    Fetch {
        /// Request path, e.g. /index.html
        path: String,
        /// Write the body here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> io::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => DashboardConfig::load(path)?,
        None => DashboardConfig::default(),
    };
    if let Some(url) = args.url {
        config.base_url = url;
    }
    if let Some(dir) = args.cache_dir {
        config.cache_dir = Some(dir);
    }
    let command = args.command.unwrap_or(Cmd::Watch { gui: false });

    let gui_logs = if let Cmd::Watch { gui: true } = command {
        if let Err(e) = gui::check_terminal_size() {
            logging::init_console(args.log_level);
            tracing::error!("Cannot start dashboard: {}", e);
            process::exit(1);
        }
        let (log_tx, log_rx) = mpsc::channel::<String>();
        logging::init_gui(args.log_level, log_tx);
        Some(log_rx)
    } else {
        logging::init_console(args.log_level);
        None
    };

    let backend = Arc::new(HttpBackend::new(&config.base_url).map_err(io::Error::other)?);

    let ok = match command {
        Cmd::Watch { .. } => return watch(&config, backend, gui_logs),
        Cmd::Start => run_command(backend, Command::Start),
        Cmd::Stop => run_command(backend, Command::Stop),
        Cmd::Withdraw { to, amount } => run_command(backend, Command::Withdraw(WithdrawForm::new(to, amount))),
        Cmd::Status => print_status(&config, backend)?,
        Cmd::Fetch { path, output } => fetch_asset(&config, backend, &path, output)?,
    };
    if !ok {
        process::exit(1);
    }
    Ok(())
}

fn run_command(backend: Arc<HttpBackend>, command: Command) -> bool {
    let outcome = Controller::new(backend).run(&command);
    if let Some(alert) = &outcome.alert {
        Display::alert(alert);
    }
    if let Some(running) = outcome.running {
        println!("{} {}", "✅".green(), Display::status_label(running).bold());
    }
    outcome.is_success()
}

fn print_status(config: &DashboardConfig, backend: Arc<HttpBackend>) -> io::Result<bool> {
    let cache = OfflineCache::install(backend, config.cache_dir.as_deref(), &[]).map_err(io::Error::other)?;
    let asset = match cache.fetch(STATUS_PATH) {
        Ok(asset) if asset.is_success() => asset,
        Ok(asset) => {
            eprintln!("{} Status request failed with HTTP {}", "❌".red(), asset.status);
            return Ok(false);
        }
        Err(e) => {
            eprintln!("{} Error fetching status: {}", "❌".red(), e);
            return Ok(false);
        }
    };
    match StatusSnapshot::parse(&String::from_utf8_lossy(&asset.body)) {
        Ok(snapshot) => {
            Display::status_line(&snapshot);
            Ok(true)
        }
        Err(e) => {
            eprintln!("{} Malformed status response: {}", "❌".red(), e);
            Ok(false)
        }
    }
}

fn fetch_asset(
    config: &DashboardConfig,
    backend: Arc<HttpBackend>,
    path: &str,
    output: Option<PathBuf>,
) -> io::Result<bool> {
    let cache = OfflineCache::install(backend, config.cache_dir.as_deref(), &[]).map_err(io::Error::other)?;
    let asset = match cache.fetch(path) {
        Ok(asset) => asset,
        Err(e) => {
            eprintln!("{} Error fetching {}: {}", "❌".red(), path, e);
            return Ok(false);
        }
    };
    match output {
        Some(file) => fs::write(file, &asset.body)?,
        None => io::stdout().write_all(&asset.body)?,
    }
    if !asset.is_success() {
        eprintln!("{} {} answered HTTP {}", "⚠️".yellow(), path, asset.status);
    }
    Ok(asset.is_success())
}

fn watch(config: &DashboardConfig, backend: Arc<HttpBackend>, gui_logs: Option<Receiver<String>>) -> io::Result<()> {
    let cache = OfflineCache::install(Arc::clone(&backend), config.cache_dir.as_deref(), &config.precache)
        .map_err(io::Error::other)?;
    tracing::debug!(lifecycle = ?cache.lifecycle(), "Offline cache ready.");
    let seed = cache
        .get(STATUS_PATH)
        .filter(|asset| asset.is_success())
        .and_then(|asset| StatusSnapshot::parse(&String::from_utf8_lossy(&asset.body)).ok());

    let mut stream = StatusStream::open(
        backend.client().clone(),
        &config.endpoint(STREAM_PATH),
        config.reconnect_delay,
    );

    if let Some(log_rx) = gui_logs {
        let backend: Arc<dyn Backend> = backend;
        let mut gui = Gui::new(
            log_rx,
            stream,
            Controller::new(backend),
            Notifier::new(config.alert_ttl),
            seed,
            config.base_url.clone(),
        );
        if let Err(e) = gui.run() {
            eprintln!("{} Dashboard exited with error: {}", "❌".red(), e);
            process::exit(1);
        }
        return Ok(());
    }

    Display::banner();
    Display::connection_info(&config.base_url);
    if let Some(snapshot) = &seed {
        println!("{}", "Last known status:".bold());
        Display::status_line(snapshot);
        println!();
    }

    loop {
        if stream.try_reconnect_signal().is_ok() {
            stream.reconnect();
        }
        match stream.recv_event_timeout(Duration::from_millis(100)) {
            Ok(StreamEvent::Opened) => Display::stream_opened(),
            Ok(StreamEvent::Snapshot(snapshot)) => Display::status_line(&snapshot),
            Ok(StreamEvent::Error(reason)) => Display::stream_lost(&reason),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return Ok(()),
        }
    }
}
