// Integration tests for the dashboard pipeline
//
// These drive the public API the way the binary does:
// 1. A full riding session through the Dashboard state machine
// 2. The runtime polling a fake data logger over UDP loopback
// 3. Replaying a frame log while recording what was received

use std::{
    io::Write,
    net::UdpSocket,
    sync::mpsc,
    thread,
    time::{Duration, Instant},
};

use gsxr_dash::{
    CancellationToken, Command, DashConfig, Dashboard, DashboardRuntime, DashboardSettings,
    DashboardUpdate, RecordedFrame,
    dashboard::{Gauge, Indicator, OperatingMode, Readout},
    telemetry::{
        TelemetryField,
        producer::{ReplayTelemetryProducer, UdpTelemetryProducer},
    },
    writer,
};

const FULL_FRAME: &str = r#"{
    "front_tyre_S1": 64.0, "front_tyre_S2": 71.5, "front_brakes_tps_S1": 120.0,
    "brakes_imu_in_d5": 0, "brakes_imu_in_d6": 0,
    "front_imu_sonar_mm": 40.0, "rear_brake_gps_rear_ss_mm": 56.0,
    "rear_brake_gps_gps_fix": 1, "rear_brake_gps_wheel_kmh": 142.3,
    "port4_d6_int_tempC": 92.0, "port4_d6_int_d6": 0
}"#;

fn frame(payload: &str, received_at: Instant) -> Command {
    Command::Frame {
        payload: payload.to_string(),
        received_at,
    }
}

fn test_config() -> DashConfig {
    DashConfig {
        startup_delay_ms: 0,
        poll_interval_ms: 1,
        splash_duration_ms: 0,
        receive_timeout_ms: Some(50),
        ..Default::default()
    }
}

#[test]
fn test_riding_session() {
    let mut dashboard = Dashboard::new(DashboardSettings {
        lap_mode_window: 5,
        rear_brake_shutdown: false,
        ..Default::default()
    });
    dashboard.start();
    let t0 = Instant::now();

    // logger boots with the rear brake reporting applied, then comes online
    dashboard.handle(frame(r#"{"brakes_imu_in_d6": 1}"#, t0));
    assert_eq!(dashboard.state().mode(), OperatingMode::BootSequencing);
    dashboard.handle(frame(r#"{"brakes_imu_in_d6": 0}"#, t0));
    assert_eq!(dashboard.state().mode(), OperatingMode::Live);

    for _ in 0..5 {
        dashboard.handle(frame(FULL_FRAME, t0));
    }
    assert!(dashboard.faults().is_empty());
    assert!(dashboard.state().lap_mode_enabled());
    assert_eq!(dashboard.state().readout(Readout::Speed), Some("142"));
    assert_eq!(dashboard.state().readout(Readout::Coolant), Some("092"));
    assert!((dashboard.state().gauge(Gauge::FrontSuspension).unwrap() - 0.625).abs() < 1e-6);
    assert!((dashboard.state().gauge(Gauge::RearSuspension).unwrap() - 0.75).abs() < 1e-6);
    assert!((dashboard.state().gauge(Gauge::FrontBrakeDiskTemp).unwrap() - 1.32).abs() < 1e-5);
    assert!(dashboard.state().is_visible(Indicator::GpsFix));

    // rear trigger with the headlight flash starts the lap
    dashboard.handle(frame(
        r#"{"brakes_imu_in_d5": 0, "brakes_imu_in_d6": 1, "port4_d6_int_d6": 1}"#,
        t0,
    ));
    assert!(dashboard.state().lap_timer_armed());
    dashboard.handle(Command::SampleLapTimer {
        now: t0 + Duration::from_millis(61_230),
    });
    assert_eq!(dashboard.state().readout(Readout::LapTime), Some("00:01:01:23"));

    // front trigger with the headlight flash stops it
    dashboard.handle(frame(
        r#"{"brakes_imu_in_d5": 1, "brakes_imu_in_d6": 0, "port4_d6_int_d6": 1}"#,
        t0 + Duration::from_millis(92_000),
    ));
    assert!(!dashboard.state().lap_timer_armed());
    assert_eq!(dashboard.state().readout(Readout::LapTime), Some("00:01:32:00"));

    // a frame with a broken sensor raises its code and keeps the rest
    dashboard.handle(frame(
        &FULL_FRAME.replace("92.0", "\"n/a\""),
        t0 + Duration::from_millis(93_000),
    ));
    assert!(dashboard.faults().contains(TelemetryField::CoolantTemp));
    assert_eq!(dashboard.faults().len(), 1);
    let updates = dashboard.handle(Command::RotateFault);
    assert_eq!(
        updates.last(),
        Some(&DashboardUpdate::ActiveFault(Some(
            TelemetryField::CoolantTemp.fault_code()
        )))
    );
    assert_eq!(TelemetryField::CoolantTemp.fault_code().to_string(), "E9");
}

#[test]
fn test_udp_loopback_session() {
    let logger = UdpSocket::bind("127.0.0.1:0").unwrap();
    logger
        .set_read_timeout(Some(Duration::from_millis(50)))
        .unwrap();
    let port = logger.local_addr().unwrap().port();
    let logger_stop = CancellationToken::new();
    let logger_cancel = logger_stop.clone();
    let fake_logger = thread::spawn(move || {
        let frames = [r#"{"brakes_imu_in_d6": 0}"#, FULL_FRAME];
        let mut served = 0;
        let mut buf = [0u8; 16];
        while !logger_cancel.is_cancelled() {
            if let Ok((len, peer)) = logger.recv_from(&mut buf) {
                assert_eq!(&buf[..len], b"REQ");
                let payload = frames[served.min(frames.len() - 1)];
                logger.send_to(payload.as_bytes(), peer).unwrap();
                served += 1;
            }
        }
        served
    });

    let config = test_config();
    let producer = UdpTelemetryProducer::new(
        "127.0.0.1",
        port,
        &config.request_token,
        config.max_frame_size,
        config.receive_timeout(),
    );
    let cancel = CancellationToken::new();
    let runtime_cancel = cancel.clone();
    let (update_tx, update_rx) = mpsc::channel();
    let runtime = thread::spawn(move || {
        DashboardRuntime::new(config, runtime_cancel).run(producer, None, update_tx)
    });

    let deadline = Instant::now() + Duration::from_secs(10);
    let mut saw_speed = false;
    let mut saw_instruments = false;
    while Instant::now() < deadline && !(saw_speed && saw_instruments) {
        match update_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(DashboardUpdate::Readout {
                readout: Readout::Speed,
                text,
            }) => saw_speed = text == "142",
            Ok(DashboardUpdate::Screen(gsxr_dash::dashboard::Screen::Instruments)) => {
                saw_instruments = true
            }
            _ => {}
        }
    }
    cancel.cancel();
    let dashboard = runtime.join().unwrap().unwrap();
    logger_stop.cancel();
    let served = fake_logger.join().unwrap();

    assert!(saw_speed);
    assert!(saw_instruments);
    assert!(served >= 2);
    assert_eq!(dashboard.state().mode(), OperatingMode::Live);
    assert!(dashboard.faults().is_empty());
}

#[test]
fn test_replay_with_recording() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("session.jsonl");
    let recording = dir.path().join("recorded.jsonl");
    {
        let mut file = std::fs::File::create(&input).unwrap();
        writeln!(file, r#"{{"brakes_imu_in_d6": 0}}"#).unwrap();
        for speed in [12, 48, 97] {
            writeln!(file, r#"{{"rear_brake_gps_wheel_kmh": {speed}}}"#).unwrap();
        }
    }

    let producer = ReplayTelemetryProducer::from_file(&input).unwrap();
    let (frame_tx, frame_rx) = mpsc::channel::<RecordedFrame>();
    let recorder = thread::spawn({
        let recording = recording.clone();
        move || writer::write_json_lines(&recording, frame_rx)
    });
    let (update_tx, update_rx) = mpsc::channel();

    let dashboard = DashboardRuntime::new(test_config(), CancellationToken::new())
        .stop_when_exhausted(true)
        .run(producer, Some(frame_tx), update_tx)
        .unwrap();
    assert_eq!(recorder.join().unwrap().unwrap(), 4);

    assert_eq!(dashboard.state().readout(Readout::Speed), Some("097"));
    let speeds: Vec<String> = update_rx
        .iter()
        .filter_map(|update| match update {
            DashboardUpdate::Readout {
                readout: Readout::Speed,
                text,
            } => Some(text),
            _ => None,
        })
        .collect();
    assert_eq!(speeds, vec!["012", "048", "097"]);

    // the recording replays to the same result
    let mut replayed = Dashboard::new(DashboardSettings::default());
    replayed.start();
    let frames: Vec<RecordedFrame> = serde_jsonlines::json_lines(&recording)
        .unwrap()
        .collect::<std::io::Result<_>>()
        .unwrap();
    for recorded in frames {
        replayed.handle(frame(&recorded.payload, Instant::now()));
    }
    assert_eq!(replayed.state().readout(Readout::Speed), Some("097"));
}
