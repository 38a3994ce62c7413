// Error types for gsxr-dash

use crate::dashboard::DashboardUpdate;
use snafu::Snafu;
use std::{io, sync::mpsc::SendError};

#[derive(Debug, Snafu)]
pub enum DashError {
    // Errors talking to the data logger
    #[snafu(display("Could not resolve data logger address {address}"))]
    InvalidLoggerAddress { address: String },
    #[snafu(display("Unable to bind the telemetry socket"))]
    SocketBindError { source: io::Error },
    #[snafu(display("Error sending telemetry request to the data logger"))]
    SendRequestError { source: io::Error },
    #[snafu(display("Error receiving telemetry frame from the data logger"))]
    ReceiveFrameError { source: io::Error },
    #[snafu(display("Telemetry producer is not started, call start() first"))]
    ProducerNotStarted,

    // Payload errors, the whole frame is dropped
    #[snafu(display("Could not parse telemetry payload"))]
    PayloadParseError { source: serde_json::Error },
    #[snafu(display("Telemetry payload is not a key-value object"))]
    PayloadNotAnObject,

    // Errors while passing messages between loops
    #[snafu(display("Dashboard command queue is closed"))]
    CommandQueueClosed,
    #[snafu(display("Error broadcasting dashboard update"))]
    UpdateBroadcastError {
        source: Box<SendError<DashboardUpdate>>,
    },
    #[snafu(display("Unable to spawn {name} thread"))]
    ThreadSpawnError { name: String, source: io::Error },

    // Errors for the json-lines writer
    #[snafu(display("Error writing json-lines file"))]
    WriterError { source: io::Error },

    // Config management errors
    #[snafu(display("Could not find application config directory to save config file"))]
    NoConfigDir,
    #[snafu(display("Error reading or writing config file"))]
    ConfigIOError { source: io::Error },
    #[snafu(display("Error serializing config file"))]
    ConfigSerializeError { source: serde_json::Error },

    // Replay errors
    #[snafu(display("Error loading replay file"))]
    ReplayFileError { source: io::Error },
}

impl From<SendError<DashboardUpdate>> for DashError {
    fn from(value: SendError<DashboardUpdate>) -> Self {
        DashError::UpdateBroadcastError {
            source: Box::new(value),
        }
    }
}
