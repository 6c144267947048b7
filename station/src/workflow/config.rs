use anyhow::Context;
use liftcore::device::DeviceSpec;
use liftcore::model::{FlowConditions, SetupInput};
use liftcore::pipeline::{Color, PresentationSettings};
use liftcore::prelude::TAP_COUNT;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Serial ports of the two instruments. Answer widths are fixed per
/// instrument and not read from the file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSettings {
    pub pressure: DeviceSpec,
    pub environment: DeviceSpec,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            pressure: DeviceSpec::new("pressure scanner", "/dev/ttyUSB0"),
            environment: DeviceSpec::new("density sensor", "/dev/ttyUSB1"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoSettings {
    pub enabled: bool,
    pub seed: Option<u64>,
    pub delay_ms: u64,
}

impl Default for DemoSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            seed: None,
            delay_ms: 100,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresentationConfig {
    pub interval_ms: u64,
    pub label_color: Color,
    pub error_color: Color,
    pub wing_scale_pressure: f64,
    pub wing_scale_coefficient: f64,
    pub reverse_wing: bool,
}

impl Default for PresentationConfig {
    fn default() -> Self {
        let defaults = PresentationSettings::default();
        Self {
            interval_ms: defaults.interval.as_millis() as u64,
            label_color: defaults.label_color,
            error_color: defaults.error_color,
            wing_scale_pressure: defaults.wing_scale_pressure,
            wing_scale_coefficient: defaults.wing_scale_coefficient,
            reverse_wing: defaults.reverse_wing,
        }
    }
}

/// Everything the station reads from `station.yaml`. Missing keys fall back to
/// the defaults below.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    pub devices: DeviceSettings,
    pub demo: DemoSettings,
    pub taps: SetupInput,
    pub flow: FlowConditions,
    pub chord_length: f64,
    pub profile: Option<PathBuf>,
    pub interpolation_points: usize,
    pub measurements_per_save: usize,
    pub data_dir: PathBuf,
    pub pace_ms: Option<u64>,
    pub presentation: PresentationConfig,
    pub bind: SocketAddr,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            devices: DeviceSettings::default(),
            demo: DemoSettings::default(),
            taps: default_taps(),
            flow: FlowConditions::default(),
            chord_length: 0.2,
            profile: None,
            interpolation_points: 200,
            measurements_per_save: 20,
            data_dir: PathBuf::from("data"),
            pace_ms: None,
            presentation: PresentationConfig::default(),
            bind: SocketAddr::from(([127, 0, 0, 1], 9000)),
        }
    }
}

/// Taps 0-7 on the upper surface, 8-15 on the lower one, all enabled.
fn default_taps() -> SetupInput {
    let chordwise = [0.0, 0.05, 0.1, 0.2, 0.3, 0.45, 0.6, 0.8];
    let mut tap_coordinates = [0.0; TAP_COUNT];
    tap_coordinates[..8].copy_from_slice(&chordwise);
    tap_coordinates[8..].copy_from_slice(&chordwise);
    let mut tap_on_top = [false; TAP_COUNT];
    tap_on_top[..8].fill(true);
    SetupInput {
        tap_enabled: [true; TAP_COUNT],
        tap_on_top,
        tap_coordinates,
    }
}

impl StationConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading station config {}", path_ref.display()))?;
        let config: StationConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing station config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn presentation_settings(&self) -> PresentationSettings {
        let presentation = &self.presentation;
        PresentationSettings {
            interval: Duration::from_millis(presentation.interval_ms.max(1)),
            label_color: presentation.label_color,
            error_color: presentation.error_color,
            wing_scale_pressure: presentation.wing_scale_pressure,
            wing_scale_coefficient: presentation.wing_scale_coefficient,
            reverse_wing: presentation.reverse_wing,
            demo: self.demo.enabled,
        }
    }

    pub fn demo_delay(&self) -> Duration {
        Duration::from_millis(self.demo.delay_ms)
    }

    pub fn pace(&self) -> Option<Duration> {
        self.pace_ms.map(Duration::from_millis)
    }
}
