use std::{
    path::{Path, PathBuf},
    sync::mpsc::{self, Receiver},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use clap::{Parser, Subcommand};
use gsxr_dash::{
    CancellationToken, DashConfig, DashError, DashboardRuntime, DashboardUpdate, RecordedFrame,
    runtime::join_worker,
    telemetry::producer::{ReplayTelemetryProducer, TelemetryProducer, UdpTelemetryProducer},
    writer,
};
use log::{debug, error, info, warn};

const WRITER_GRACE: Duration = Duration::from_secs(2);

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Poll the data logger and drive the dashboard
    Live {
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(long)]
        host: Option<String>,

        #[arg(short, long)]
        port: Option<u16>,

        #[arg(long)]
        receive_timeout_ms: Option<u64>,

        /// Record every received frame to a json-lines file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Journal dashboard updates to a json-lines file
        #[arg(short, long)]
        updates: Option<PathBuf>,
    },
    /// Drive the dashboard from a recorded json-lines file
    Replay {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(long, default_value_t = 10)]
        interval_ms: u64,

        #[arg(short, long)]
        updates: Option<PathBuf>,
    },
    /// Write the default configuration file
    InitConfig,
}

fn load_config(path: Option<&Path>) -> Result<DashConfig, DashError> {
    match path {
        Some(path) => DashConfig::from_file(path),
        None => Ok(DashConfig::from_local_file().unwrap_or_default()),
    }
}

/// Logs every update and optionally journals it. The dashboard has no display of
/// its own.
fn spawn_presenter(
    updates_rx: Receiver<DashboardUpdate>,
    journal: Option<PathBuf>,
) -> JoinHandle<Result<(), DashError>> {
    thread::spawn(move || {
        let (journal_tx, journal_handle) = match journal {
            Some(path) => {
                let (tx, rx) = mpsc::channel::<DashboardUpdate>();
                let handle = thread::spawn(move || writer::write_json_lines(&path, rx));
                (Some(tx), Some(handle))
            }
            None => (None, None),
        };
        for update in &updates_rx {
            match &update {
                DashboardUpdate::Mode(_)
                | DashboardUpdate::Screen(_)
                | DashboardUpdate::Stopwatch { .. }
                | DashboardUpdate::ActiveFault(Some(_)) => info!("{:?}", update),
                _ => debug!("{:?}", update),
            }
            if let Some(ref tx) = journal_tx {
                let _ = tx.send(update);
            }
        }
        drop(journal_tx);
        if let Some(handle) = journal_handle
            && let Some(result) = join_worker(handle)
        {
            result?;
        }
        Ok(())
    })
}

fn run(
    config: DashConfig,
    producer: impl TelemetryProducer + Send + 'static,
    output: Option<PathBuf>,
    updates: Option<PathBuf>,
    cancel: CancellationToken,
    stop_when_exhausted: bool,
) -> Result<(), DashError> {
    let (updates_tx, updates_rx) = mpsc::channel::<DashboardUpdate>();
    let presenter = spawn_presenter(updates_rx, updates);

    // recorded frames go through their own writer thread so a slow disk never
    // holds up polling
    let (frame_writer_tx, frame_writer) = match output {
        Some(output_file) => {
            let (tx, rx) = mpsc::channel::<RecordedFrame>();
            let handle = thread::spawn(move || {
                if let Err(e) = writer::write_json_lines(&output_file, rx) {
                    error!("Frame recording failed: {}", e);
                }
            });
            (Some(tx), Some(handle))
        }
        None => (None, None),
    };

    let dashboard = DashboardRuntime::new(config, cancel)
        .stop_when_exhausted(stop_when_exhausted)
        .run(producer, frame_writer_tx, updates_tx)?;
    info!(
        "Dashboard stopped in {:?} with {} active faults",
        dashboard.state().mode(),
        dashboard.faults().len()
    );

    if let Some(result) = join_worker(presenter) {
        result?;
    }
    if let Some(handle) = frame_writer {
        // the collector lets go of the writer after its in-flight poll
        let deadline = Instant::now() + WRITER_GRACE;
        while !handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
        }
        if handle.is_finished() {
            join_worker(handle);
        } else {
            warn!("Frame recording did not finish, the last frames may be missing");
        }
    }
    Ok(())
}

fn live(
    config: DashConfig,
    output: Option<PathBuf>,
    updates: Option<PathBuf>,
    cancel: CancellationToken,
) -> Result<(), DashError> {
    let producer = UdpTelemetryProducer::new(
        &config.logger_host,
        config.logger_port,
        &config.request_token,
        config.max_frame_size,
        config.receive_timeout(),
    );
    run(config, producer, output, updates, cancel, false)
}

fn replay(
    input: &Path,
    interval_ms: u64,
    updates: Option<PathBuf>,
    cancel: CancellationToken,
) -> Result<(), DashError> {
    let producer = ReplayTelemetryProducer::from_file(input)?;
    let config = DashConfig {
        startup_delay_ms: 0,
        poll_interval_ms: interval_ms,
        ..DashConfig::from_local_file().unwrap_or_default()
    };
    run(config, producer, None, updates, cancel, true)
}

fn main() {
    #[cfg(debug_assertions)]
    colog::init();

    let cli = Args::parse();
    let cancel = CancellationToken::new();
    let handler_cancel = cancel.clone();
    ctrlc::set_handler(move || {
        println!("Exiting...");
        handler_cancel.cancel();
    })
    .expect("Could not set Ctrl-C handler");

    match cli.command {
        Commands::Live {
            config,
            host,
            port,
            receive_timeout_ms,
            output,
            updates,
        } => {
            let mut dash_config =
                load_config(config.as_deref()).expect("Error while loading config file");
            if let Some(host) = host {
                dash_config.logger_host = host;
            }
            if let Some(port) = port {
                dash_config.logger_port = port;
            }
            if receive_timeout_ms.is_some() {
                dash_config.receive_timeout_ms = receive_timeout_ms;
            }
            live(dash_config, output, updates, cancel).expect("Error while running live dashboard")
        }
        Commands::Replay {
            input,
            interval_ms,
            updates,
        } => replay(&input, interval_ms, updates, cancel).expect("Error while replaying telemetry"),
        Commands::InitConfig => {
            let path = DashConfig::default()
                .save()
                .expect("Error while writing config file");
            println!("Wrote default config to {}", path.display());
        }
    };
}
