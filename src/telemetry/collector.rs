use std::{
    sync::mpsc::Sender,
    time::{Duration, Instant},
};

use log::{info, warn};
use simple_moving_average::{SMA, SumTreeSMA};

use crate::{dashboard::Command, errors::DashError, runtime::CancellationToken};

use super::{RecordedFrame, producer::TelemetryProducer};

const RTT_WINDOW: usize = 100;

/// Pacing of the polling loop.
#[derive(Clone, Debug)]
pub struct PollSettings {
    /// Wait before the first request, gives the logger time to boot
    pub startup_delay: Duration,
    /// Pause after every poll
    pub poll_interval: Duration,
    /// Log statistics every this many frames, 0 disables them
    pub stats_every_frames: u64,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            startup_delay: Duration::from_millis(5_000),
            poll_interval: Duration::from_millis(1),
            stats_every_frames: 100,
        }
    }
}

/// Polls `producer` and forwards every payload to the dashboard as a
/// [`Command::Frame`].
///
/// Transport errors are logged and the loop carries on with the next poll. The
/// loop ends when the producer is exhausted, when `cancel` is tripped, or when
/// the dashboard stops listening.
pub fn collect_telemetry(
    mut producer: impl TelemetryProducer,
    command_sender: Sender<Command>,
    frame_writer_sender: Option<Sender<RecordedFrame>>,
    settings: &PollSettings,
    cancel: &CancellationToken,
) -> Result<(), DashError> {
    if !cancel.sleep(settings.startup_delay) {
        return Ok(());
    }
    producer.start()?;
    info!("Collecting telemetry from {}", producer.source_name());

    let mut frame_writer_sender = frame_writer_sender;
    let mut rtt_ms = SumTreeSMA::<f64, f64, RTT_WINDOW>::new();
    let mut frames: u64 = 0;
    let mut errors: u64 = 0;

    while !cancel.is_cancelled() {
        let requested_at = Instant::now();
        match producer.next_frame() {
            Ok(Some(payload)) => {
                let received_at = Instant::now();
                frames += 1;
                rtt_ms.add_sample(received_at.duration_since(requested_at).as_secs_f64() * 1000.);

                if let Some(ref writer_sender) = frame_writer_sender
                    && writer_sender.send(RecordedFrame::new(&payload)).is_err()
                {
                    warn!("Frame writer stopped, recording disabled");
                    frame_writer_sender = None;
                }

                command_sender
                    .send(Command::Frame {
                        payload,
                        received_at,
                    })
                    .map_err(|_| DashError::CommandQueueClosed)?;

                if settings.stats_every_frames > 0 && frames % settings.stats_every_frames == 0 {
                    info!(
                        "Received {} frames ({} errors), average round trip {:.2}ms",
                        frames,
                        errors,
                        rtt_ms.get_average()
                    );
                }
            }
            Ok(None) => {
                info!(
                    "{} exhausted after {} frames",
                    producer.source_name(),
                    frames
                );
                break;
            }
            Err(e) => {
                errors += 1;
                warn!("Telemetry poll failed: {}", e);
            }
        }
        if !cancel.sleep(settings.poll_interval) {
            break;
        }
    }
    Ok(())
}
