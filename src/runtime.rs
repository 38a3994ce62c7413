use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver, RecvTimeoutError, Sender},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use log::{error, info};

use crate::{
    config::DashConfig,
    dashboard::{Command, Dashboard, DashboardUpdate, OperatingMode, Screen},
    errors::DashError,
    telemetry::{RecordedFrame, collect_telemetry, producer::TelemetryProducer},
};

const SLEEP_CHUNK: Duration = Duration::from_millis(20);
const COMMAND_POLL: Duration = Duration::from_millis(50);
const CLOCK_FORMAT: &str = "%H:%M:%S";
const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// Shared stop flag checked by every background loop.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Sleeps for `duration` in small steps. Returns `false` as soon as the token
    /// is cancelled, `true` if the full duration elapsed.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep(SLEEP_CHUNK.min(deadline - now));
        }
    }
}

/// Runs `tick` every `interval`, at least 1 ms, until the token is cancelled or
/// `tick` returns `false`.
pub fn spawn_ticker<F>(
    name: &str,
    interval: Duration,
    cancel: CancellationToken,
    mut tick: F,
) -> Result<JoinHandle<()>, DashError>
where
    F: FnMut() -> bool + Send + 'static,
{
    let interval = interval.max(MIN_TICK_INTERVAL);
    thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            while cancel.sleep(interval) {
                if !tick() {
                    break;
                }
            }
        })
        .map_err(|e| DashError::ThreadSpawnError {
            name: name.to_string(),
            source: e,
        })
}

/// Joins a worker thread. A panic in the worker is logged and yields `None`.
pub fn join_worker<T>(handle: JoinHandle<T>) -> Option<T> {
    let name = handle.thread().name().unwrap_or("unnamed").to_string();
    match handle.join() {
        Ok(value) => Some(value),
        Err(_) => {
            error!("Worker thread {} panicked", name);
            None
        }
    }
}

fn spawn_named<F>(name: &str, body: F) -> Result<JoinHandle<()>, DashError>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(body)
        .map_err(|e| DashError::ThreadSpawnError {
            name: name.to_string(),
            source: e,
        })
}

/// Wires a producer, the periodic loops and the [`Dashboard`] together.
///
/// Every loop only sends [`Command`]s; the dashboard is owned by the thread that
/// calls [`DashboardRuntime::run`].
pub struct DashboardRuntime {
    config: DashConfig,
    cancel: CancellationToken,
    stop_when_exhausted: bool,
    command_sender: Sender<Command>,
    command_receiver: Receiver<Command>,
}

impl DashboardRuntime {
    pub fn new(config: DashConfig, cancel: CancellationToken) -> Self {
        let (command_sender, command_receiver) = mpsc::channel();
        Self {
            config,
            cancel,
            stop_when_exhausted: false,
            command_sender,
            command_receiver,
        }
    }

    /// Cancel the whole runtime once the producer has no more frames.
    pub fn stop_when_exhausted(mut self, stop: bool) -> Self {
        self.stop_when_exhausted = stop;
        self
    }

    /// Sender for commands coming from outside the runtime, e.g. orientation
    /// samples or a lean maxima reset.
    pub fn command_sender(&self) -> Sender<Command> {
        self.command_sender.clone()
    }

    /// Runs until cancelled and returns the dashboard in its final state.
    pub fn run<P>(
        self,
        producer: P,
        frame_writer_sender: Option<Sender<RecordedFrame>>,
        update_sender: Sender<DashboardUpdate>,
    ) -> Result<Dashboard, DashError>
    where
        P: TelemetryProducer + Send + 'static,
    {
        let DashboardRuntime {
            config,
            cancel,
            stop_when_exhausted,
            command_sender,
            command_receiver,
        } = self;

        let mut dashboard = Dashboard::new(config.dashboard_settings());
        let mut presenter = Presenter {
            config: &config,
            cancel: &cancel,
            command_sender: &command_sender,
            update_sender,
            clock_started: false,
            tickers: Vec::new(),
        };

        let poll_settings = config.poll_settings();
        let collector_sender = command_sender.clone();
        let collector_cancel = cancel.clone();
        spawn_named("telemetry-collector", move || {
            if let Err(e) = collect_telemetry(
                producer,
                collector_sender,
                frame_writer_sender,
                &poll_settings,
                &collector_cancel,
            ) {
                error!("Telemetry collection stopped: {}", e);
            }
            if stop_when_exhausted {
                collector_cancel.cancel();
            }
        })?;

        let lap_timer_sender = command_sender.clone();
        presenter.tickers.push(spawn_ticker(
            "lap-timer",
            config.lap_timer_interval(),
            cancel.clone(),
            move || {
                lap_timer_sender
                    .send(Command::SampleLapTimer {
                        now: Instant::now(),
                    })
                    .is_ok()
            },
        )?);
        let fault_sender = command_sender.clone();
        presenter.tickers.push(spawn_ticker(
            "fault-rotation",
            config.fault_rotation_interval(),
            cancel.clone(),
            move || fault_sender.send(Command::RotateFault).is_ok(),
        )?);

        let result = presenter
            .publish(dashboard.start())
            .and_then(|_| consume(&mut dashboard, &command_receiver, &mut presenter));

        cancel.cancel();
        for ticker in presenter.tickers.drain(..) {
            join_worker(ticker);
        }
        result.map(|_| dashboard)
    }
}

fn consume(
    dashboard: &mut Dashboard,
    command_receiver: &Receiver<Command>,
    presenter: &mut Presenter,
) -> Result<(), DashError> {
    loop {
        if presenter.cancel.is_cancelled() {
            // whatever was queued before cancellation still gets applied
            while let Ok(command) = command_receiver.try_recv() {
                let updates = dashboard.handle(command);
                presenter.publish(updates)?;
            }
            return Ok(());
        }
        match command_receiver.recv_timeout(COMMAND_POLL) {
            Ok(command) => {
                let splash_finished = matches!(command, Command::SplashFinished);
                let updates = dashboard.handle(command);
                presenter.publish(updates)?;
                if splash_finished && dashboard.state().mode() == OperatingMode::ShutdownSequencing
                {
                    info!("Shutdown sequence complete");
                    presenter.cancel.cancel();
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return Err(DashError::CommandQueueClosed),
        }
    }
}

/// Forwards updates and starts the loops that depend on what is on screen.
struct Presenter<'a> {
    config: &'a DashConfig,
    cancel: &'a CancellationToken,
    command_sender: &'a Sender<Command>,
    update_sender: Sender<DashboardUpdate>,
    clock_started: bool,
    tickers: Vec<JoinHandle<()>>,
}

impl Presenter<'_> {
    fn publish(&mut self, updates: Vec<DashboardUpdate>) -> Result<(), DashError> {
        for update in updates {
            match update {
                DashboardUpdate::Screen(Screen::Splash(_)) => self.start_splash()?,
                DashboardUpdate::Screen(Screen::Instruments) => self.start_clock()?,
                _ => {}
            }
            self.update_sender.send(update)?;
        }
        Ok(())
    }

    /// Stands in for the animation callback of a real display.
    fn start_splash(&mut self) -> Result<(), DashError> {
        let sender = self.command_sender.clone();
        let cancel = self.cancel.clone();
        let duration = Duration::from_millis(self.config.splash_duration_ms);
        self.tickers.push(spawn_named("splash", move || {
            if cancel.sleep(duration) {
                let _ = sender.send(Command::SplashFinished);
            }
        })?);
        Ok(())
    }

    fn start_clock(&mut self) -> Result<(), DashError> {
        if self.clock_started {
            return Ok(());
        }
        self.clock_started = true;
        let sender = self.command_sender.clone();
        let cancel = self.cancel.clone();
        let interval = self.config.clock_interval();
        self.tickers.push(spawn_named("clock", move || {
            loop {
                let time = chrono::Local::now().format(CLOCK_FORMAT).to_string();
                if sender.send(Command::ClockTick { time }).is_err() || !cancel.sleep(interval) {
                    break;
                }
            }
        })?);
        Ok(())
    }
}
