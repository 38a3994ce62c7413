use log::info;
use serde::{Deserialize, Serialize};

use super::DashboardUpdate;

const SYSTEM_ONLINE: i32 = 0;

/// Whether decoded telemetry drives the dashboard. Only `Live` applies frames;
/// `Idle` and `BootSequencing` only watch for the logger coming online.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperatingMode {
    #[default]
    Idle,
    BootSequencing,
    Live,
    ShutdownSequencing,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplashAnimation {
    Boot,
    Shutdown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Screen {
    Splash(SplashAnimation),
    Instruments,
}

/// Boot and shutdown sequencing.
///
/// `ShutdownSequencing` is terminal for the process; nothing leads back to boot.
#[derive(Debug, Default)]
pub struct BootSequencer {
    mode: OperatingMode,
    splash_playing: bool,
    instruments_shown: bool,
}

impl BootSequencer {
    pub fn mode(&self) -> OperatingMode {
        self.mode
    }

    pub fn updates_enabled(&self) -> bool {
        self.mode == OperatingMode::Live
    }

    /// Starts the boot splash.
    pub fn start(&mut self) -> Vec<DashboardUpdate> {
        if self.mode != OperatingMode::Idle {
            return Vec::new();
        }
        self.splash_playing = true;
        self.transition(OperatingMode::BootSequencing);
        vec![
            DashboardUpdate::Mode(self.mode),
            DashboardUpdate::Screen(Screen::Splash(SplashAnimation::Boot)),
        ]
    }

    /// Feeds the rear brake reading of a frame decoded before going live.
    ///
    /// Returns the updates for going live, or `None` when the logger is not
    /// reporting a released rear brake yet.
    pub fn observe_rear_brake(&mut self, rear_brake: Option<i32>) -> Option<Vec<DashboardUpdate>> {
        if !matches!(self.mode, OperatingMode::Idle | OperatingMode::BootSequencing) {
            return None;
        }
        if rear_brake != Some(SYSTEM_ONLINE) {
            return None;
        }
        self.transition(OperatingMode::Live);
        let mut updates = vec![DashboardUpdate::Mode(self.mode)];
        if !self.splash_playing {
            updates.extend(self.show_instruments());
        }
        Some(updates)
    }

    /// Called once the presentation finished playing the current splash.
    pub fn splash_finished(&mut self) -> Vec<DashboardUpdate> {
        match self.mode {
            OperatingMode::BootSequencing => {
                self.splash_playing = false;
                Vec::new()
            }
            OperatingMode::Live if self.splash_playing => {
                self.splash_playing = false;
                self.show_instruments()
            }
            _ => {
                self.splash_playing = false;
                Vec::new()
            }
        }
    }

    pub fn begin_shutdown(&mut self) -> Vec<DashboardUpdate> {
        if self.mode != OperatingMode::Live {
            return Vec::new();
        }
        self.splash_playing = true;
        self.instruments_shown = false;
        self.transition(OperatingMode::ShutdownSequencing);
        vec![
            DashboardUpdate::Mode(self.mode),
            DashboardUpdate::Screen(Screen::Splash(SplashAnimation::Shutdown)),
        ]
    }

    fn show_instruments(&mut self) -> Vec<DashboardUpdate> {
        if self.instruments_shown {
            return Vec::new();
        }
        self.instruments_shown = true;
        vec![DashboardUpdate::Screen(Screen::Instruments)]
    }

    fn transition(&mut self, mode: OperatingMode) {
        info!("Dashboard mode {:?} -> {:?}", self.mode, mode);
        self.mode = mode;
    }
}
