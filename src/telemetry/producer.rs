use std::{
    collections::VecDeque,
    net::{SocketAddr, ToSocketAddrs, UdpSocket},
    path::Path,
    time::Duration,
};

use log::{debug, info};
use serde::Deserialize;
use serde_json::Value;

use crate::errors::DashError;

use super::RecordedFrame;

/// Source of raw telemetry payloads.
///
/// `next_frame` blocks until a payload is available. `Ok(None)` means the source is
/// exhausted and the polling loop should end.
pub trait TelemetryProducer {
    /// Prepares the producer, e.g. binds the socket used to talk to the logger.
    fn start(&mut self) -> Result<(), DashError>;

    fn next_frame(&mut self) -> Result<Option<String>, DashError>;

    /// Human readable name of the source for log messages.
    fn source_name(&self) -> String;
}

/// Polls the on-board data logger: one request datagram out, one frame back.
pub struct UdpTelemetryProducer {
    host: String,
    port: u16,
    request_token: Vec<u8>,
    receive_timeout: Option<Duration>,
    buffer: Vec<u8>,
    socket: Option<(UdpSocket, SocketAddr)>,
}

impl UdpTelemetryProducer {
    pub fn new(
        host: &str,
        port: u16,
        request_token: &str,
        max_frame_size: usize,
        receive_timeout: Option<Duration>,
    ) -> Self {
        Self {
            host: host.to_string(),
            port,
            request_token: request_token.as_bytes().to_vec(),
            receive_timeout,
            buffer: vec![0; max_frame_size.max(1)],
            socket: None,
        }
    }

    fn resolve(&self) -> Result<SocketAddr, DashError> {
        let address = format!("{}:{}", self.host, self.port);
        address
            .to_socket_addrs()
            .ok()
            .and_then(|mut addrs| addrs.find(SocketAddr::is_ipv4))
            .ok_or(DashError::InvalidLoggerAddress { address })
    }
}

impl TelemetryProducer for UdpTelemetryProducer {
    fn start(&mut self) -> Result<(), DashError> {
        let logger = self.resolve()?;
        let socket =
            UdpSocket::bind("0.0.0.0:0").map_err(|e| DashError::SocketBindError { source: e })?;
        socket
            .set_read_timeout(self.receive_timeout)
            .map_err(|e| DashError::SocketBindError { source: e })?;
        info!("Polling data logger at {}", logger);
        self.socket = Some((socket, logger));
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<String>, DashError> {
        let (socket, logger) = self.socket.as_ref().ok_or(DashError::ProducerNotStarted)?;
        socket
            .send_to(&self.request_token, logger)
            .map_err(|e| DashError::SendRequestError { source: e })?;
        let (len, from) = socket
            .recv_from(&mut self.buffer)
            .map_err(|e| DashError::ReceiveFrameError { source: e })?;
        if from != *logger {
            debug!("Frame from unexpected peer {}", from);
        }
        // stray bad bytes become U+FFFD, the decoder only rejects the fields they hit
        Ok(Some(String::from_utf8_lossy(&self.buffer[..len]).into_owned()))
    }

    fn source_name(&self) -> String {
        format!("udp://{}:{}", self.host, self.port)
    }
}

/// A replay line: either a frame we recorded or a raw frame as the logger writes it.
#[derive(Deserialize)]
#[serde(untagged)]
enum ReplayLine {
    Recorded(RecordedFrame),
    Raw(Value),
}

impl ReplayLine {
    fn into_payload(self) -> String {
        match self {
            ReplayLine::Recorded(frame) => frame.payload,
            ReplayLine::Raw(value) => value.to_string(),
        }
    }
}

/// Replays previously captured frames in order.
#[derive(Debug, Default)]
pub struct ReplayTelemetryProducer {
    name: String,
    frames: VecDeque<String>,
    started: bool,
}

impl ReplayTelemetryProducer {
    pub fn from_frames(frames: Vec<String>) -> Self {
        Self {
            name: "memory".to_string(),
            frames: frames.into(),
            started: false,
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, DashError> {
        let frames = serde_jsonlines::json_lines::<ReplayLine, _>(path)
            .map_err(|e| DashError::ReplayFileError { source: e })?
            .map(|line| line.map(ReplayLine::into_payload))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| DashError::ReplayFileError { source: e })?;
        info!("Loaded {} frames from {}", frames.len(), path.display());
        Ok(Self {
            name: path.display().to_string(),
            frames: frames.into(),
            started: false,
        })
    }
}

impl TelemetryProducer for ReplayTelemetryProducer {
    fn start(&mut self) -> Result<(), DashError> {
        self.started = true;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<String>, DashError> {
        if !self.started {
            return Err(DashError::ProducerNotStarted);
        }
        Ok(self.frames.pop_front())
    }

    fn source_name(&self) -> String {
        format!("replay://{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{io::Write, thread};

    #[test]
    fn test_replay_requires_start() {
        let mut producer = ReplayTelemetryProducer::from_frames(vec!["{}".to_string()]);
        assert!(matches!(
            producer.next_frame(),
            Err(DashError::ProducerNotStarted)
        ));
        producer.start().unwrap();
        assert_eq!(producer.next_frame().unwrap(), Some("{}".to_string()));
        assert_eq!(producer.next_frame().unwrap(), None);
    }

    #[test]
    fn test_replay_file_accepts_recorded_and_raw_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let recorded = RecordedFrame {
            received_at_ms: 17,
            payload: r#"{"rear_brake_gps_wheel_kmh": 42}"#.to_string(),
        };
        writeln!(file, "{}", serde_json::to_string(&recorded).unwrap()).unwrap();
        writeln!(file, r#"{{"port4_d6_int_tempC": 81.5}}"#).unwrap();

        let mut producer = ReplayTelemetryProducer::from_file(file.path()).unwrap();
        producer.start().unwrap();
        assert_eq!(producer.next_frame().unwrap(), Some(recorded.payload));
        let raw: Value = serde_json::from_str(&producer.next_frame().unwrap().unwrap()).unwrap();
        assert_eq!(raw["port4_d6_int_tempC"], 81.5);
        assert!(producer.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_replay_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let result = ReplayTelemetryProducer::from_file(&dir.path().join("missing.jsonl"));
        assert!(matches!(result, Err(DashError::ReplayFileError { .. })));
    }

    #[test]
    fn test_udp_requires_start() {
        let mut producer = UdpTelemetryProducer::new("127.0.0.1", 9100, "REQ", 1880, None);
        assert!(matches!(
            producer.next_frame(),
            Err(DashError::ProducerNotStarted)
        ));
    }

    #[test]
    fn test_udp_invalid_address() {
        let mut producer = UdpTelemetryProducer::new("not a host", 9100, "REQ", 1880, None);
        assert!(matches!(
            producer.start(),
            Err(DashError::InvalidLoggerAddress { .. })
        ));
    }

    #[test]
    fn test_udp_request_response() {
        let logger = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = logger.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let mut buf = [0u8; 16];
            let (len, peer) = logger.recv_from(&mut buf).unwrap();
            assert_eq!(&buf[..len], b"REQ");
            logger.send_to(br#"{"front_tyre_S1": 60}"#, peer).unwrap();
        });

        let mut producer = UdpTelemetryProducer::new(
            "127.0.0.1",
            port,
            "REQ",
            1880,
            Some(Duration::from_secs(2)),
        );
        producer.start().unwrap();
        let frame = producer.next_frame().unwrap();
        assert_eq!(frame.as_deref(), Some(r#"{"front_tyre_S1": 60}"#));
        handle.join().unwrap();
    }

    #[test]
    fn test_udp_invalid_utf8_is_replaced() {
        let logger = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = logger.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let mut buf = [0u8; 16];
            let (_, peer) = logger.recv_from(&mut buf).unwrap();
            let mut frame = br#"{"note": "a"#.to_vec();
            frame.push(0xff);
            frame.extend_from_slice(br#"", "rear_brake_gps_wheel_kmh": 88}"#);
            logger.send_to(&frame, peer).unwrap();
        });

        let mut producer = UdpTelemetryProducer::new(
            "127.0.0.1",
            port,
            "REQ",
            1880,
            Some(Duration::from_secs(2)),
        );
        producer.start().unwrap();
        let frame = producer.next_frame().unwrap().unwrap();
        assert!(frame.contains('\u{FFFD}'));
        let snapshot = crate::telemetry::decoder::decode_payload(&frame).unwrap();
        assert_eq!(snapshot.wheel_speed_kmh, Some(88.0));
        handle.join().unwrap();
    }

    #[test]
    fn test_udp_frame_truncated_to_buffer() {
        let logger = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = logger.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let mut buf = [0u8; 16];
            let (_, peer) = logger.recv_from(&mut buf).unwrap();
            logger.send_to(b"0123456789", peer).unwrap();
        });

        let mut producer =
            UdpTelemetryProducer::new("127.0.0.1", port, "REQ", 4, Some(Duration::from_secs(2)));
        producer.start().unwrap();
        assert_eq!(producer.next_frame().unwrap().as_deref(), Some("0123"));
        handle.join().unwrap();
    }
}
