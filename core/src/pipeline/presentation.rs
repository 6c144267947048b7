//! Fixed-cadence rendering of the latest published state into frames.

use crate::model::{CalculationResult, Configuration, Environment, FlowConditions, Reading, Surface};
use crate::pipeline::acquisition::AcquisitionState;
use crate::pipeline::channel::{Notice, NoticeLevel, Publisher, Subscription};
use crate::telemetry::{CycleCounts, LogManager, MetricsRecorder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    Paused,
    PressureView,
    CoefficientView,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayOptions {
    pub mode: DisplayMode,
    pub show_spline: bool,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            mode: DisplayMode::PressureView,
            show_spline: true,
        }
    }
}

/// Shared handle for changing what the presentation task shows.
#[derive(Clone)]
pub struct DisplayControl {
    sender: Arc<watch::Sender<DisplayOptions>>,
}

impl DisplayControl {
    pub fn new(initial: DisplayOptions) -> Self {
        let (sender, _) = watch::channel(initial);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn set(&self, options: DisplayOptions) {
        self.sender.send_replace(options);
    }

    pub fn subscribe(&self) -> watch::Receiver<DisplayOptions> {
        self.sender.subscribe()
    }
}

impl Default for DisplayControl {
    fn default() -> Self {
        Self::new(DisplayOptions::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0 };
    pub const RED: Color = Color { r: 220, g: 30, b: 30 };
}

#[derive(Debug, Clone, PartialEq)]
pub struct PresentationSettings {
    pub interval: Duration,
    pub label_color: Color,
    pub error_color: Color,
    pub wing_scale_pressure: f64,
    pub wing_scale_coefficient: f64,
    pub reverse_wing: bool,
    pub demo: bool,
}

impl Default for PresentationSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(50),
            label_color: Color::BLACK,
            error_color: Color::RED,
            wing_scale_pressure: 1000.0,
            wing_scale_coefficient: 1.0,
            reverse_wing: false,
            demo: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TapPoint {
    pub tap: usize,
    pub x: f64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplineOverlay {
    pub grid: Vec<f64>,
    pub spline_top: Vec<f64>,
    pub spline_bottom: Vec<f64>,
    pub wing_top: Vec<(f64, f64)>,
    pub wing_bottom: Vec<(f64, f64)>,
}

/// Everything a display needs for one refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub frame: u64,
    pub mode: DisplayMode,
    pub show_spline: bool,
    pub demo: bool,
    pub reading_sequence: Option<u64>,
    pub environment: Option<Environment>,
    pub flow: FlowConditions,
    pub profile_name: String,
    pub top: Vec<TapPoint>,
    pub bottom: Vec<TapPoint>,
    pub lift: Option<f64>,
    pub lift_label: String,
    pub overlay: Option<SplineOverlay>,
    pub acquisition: AcquisitionState,
    pub notice: Option<Notice>,
    pub notice_color: Color,
    pub warning: Option<String>,
    pub calculation: CycleCounts,
}

/// Destination for rendered frames.
pub trait FrameSink: Send {
    fn present(&mut self, frame: &Frame);
}

impl FrameSink for Publisher<Frame> {
    fn present(&mut self, frame: &Frame) {
        self.publish(frame.clone());
    }
}

/// Snapshot of the published state taken at the start of a tick.
pub struct FrameInputs<'a> {
    pub reading: Option<&'a Reading>,
    pub result: Option<&'a CalculationResult>,
    pub config: &'a Configuration,
    pub acquisition: AcquisitionState,
    pub notice: Option<&'a Notice>,
    pub calculation: CycleCounts,
}

/// Builds the next frame. While paused the measured values of `previous` are
/// carried over and only status fields move.
pub fn render(
    frame: u64,
    previous: Option<&Frame>,
    inputs: &FrameInputs<'_>,
    options: DisplayOptions,
    settings: &PresentationSettings,
) -> Frame {
    let notice_color = match inputs.notice.map(|notice| notice.level) {
        Some(NoticeLevel::Error) => settings.error_color,
        _ => settings.label_color,
    };

    if options.mode == DisplayMode::Paused {
        if let Some(previous) = previous {
            return Frame {
                frame,
                mode: DisplayMode::Paused,
                acquisition: inputs.acquisition.clone(),
                notice: inputs.notice.cloned(),
                notice_color,
                calculation: inputs.calculation,
                ..previous.clone()
            };
        }
    }

    let mut rendered = Frame {
        frame,
        mode: options.mode,
        show_spline: options.show_spline,
        demo: settings.demo,
        reading_sequence: inputs.reading.map(|reading| reading.sequence),
        environment: inputs.reading.map(|reading| reading.environment),
        flow: inputs.config.flow,
        profile_name: inputs.config.wing.name.clone(),
        top: Vec::new(),
        bottom: Vec::new(),
        lift: None,
        lift_label: "-".into(),
        overlay: None,
        acquisition: inputs.acquisition.clone(),
        notice: inputs.notice.cloned(),
        notice_color,
        warning: None,
        calculation: inputs.calculation,
    };
    if options.mode == DisplayMode::Paused {
        return rendered;
    }

    let (scale, wing_scale) = match options.mode {
        DisplayMode::CoefficientView => {
            let Some(reading) = inputs.reading else {
                return rendered;
            };
            let velocity = inputs.config.flow.velocity;
            let dynamic_pressure = 0.5 * velocity * velocity * reading.environment.density;
            if !(dynamic_pressure.is_finite() && dynamic_pressure > 0.0) {
                rendered.warning = Some(format!(
                    "dynamic pressure {dynamic_pressure} is not positive; coefficients hidden"
                ));
                return rendered;
            }
            (dynamic_pressure, settings.wing_scale_coefficient)
        }
        _ => (1.0, settings.wing_scale_pressure),
    };

    if let Some(reading) = inputs.reading {
        rendered.top = surface_taps(inputs.config, reading, Surface::Top, scale);
        rendered.bottom = surface_taps(inputs.config, reading, Surface::Bottom, scale);
    }

    if let Some(result) = inputs.result.filter(|result| result.valid) {
        let lift = result.lift / scale;
        rendered.lift = Some(lift);
        rendered.lift_label = format!("{lift:.2}");
        if options.show_spline {
            let sign = if settings.reverse_wing { -1.0 } else { 1.0 };
            rendered.overlay = Some(SplineOverlay {
                grid: result.interpolation_grid.clone(),
                spline_top: result.spline_top.iter().map(|p| p / scale).collect(),
                spline_bottom: result.spline_bottom.iter().map(|p| p / scale).collect(),
                wing_top: normalise_wing(&result.wing_sample_top, wing_scale * sign),
                wing_bottom: normalise_wing(&result.wing_sample_bottom, wing_scale * sign),
            });
        }
    }
    rendered
}

fn surface_taps(
    config: &Configuration,
    reading: &Reading,
    surface: Surface,
    scale: f64,
) -> Vec<TapPoint> {
    let mut taps: Vec<TapPoint> = config
        .mask(surface)
        .indices()
        .map(|tap| TapPoint {
            tap,
            x: config.tap_coordinates[tap],
            value: reading.pressure[tap] / scale,
        })
        .collect();
    taps.sort_by(|a, b| a.x.total_cmp(&b.x));
    taps
}

/// Chordwise positions are divided by the trailing-edge x; heights are only
/// scaled.
fn normalise_wing(curve: &[(f64, f64)], scale: f64) -> Vec<(f64, f64)> {
    let Some(&(last_x, _)) = curve.last() else {
        return Vec::new();
    };
    if last_x == 0.0 {
        return Vec::new();
    }
    curve
        .iter()
        .map(|&(x, y)| (x / last_x, y * scale))
        .collect()
}

/// Read sides of everything a frame is built from.
#[derive(Clone)]
pub struct PresentationLinks {
    pub readings: Subscription<Reading>,
    pub results: Subscription<CalculationResult>,
    pub configuration: watch::Receiver<Arc<Configuration>>,
    pub state: Subscription<AcquisitionState>,
    pub notices: Subscription<Notice>,
    pub display: watch::Receiver<DisplayOptions>,
    pub metrics: Arc<MetricsRecorder>,
}

/// Timer-driven renderer. Never waits on the other tasks.
pub struct PresentationTask<K: FrameSink> {
    links: PresentationLinks,
    settings: PresentationSettings,
    sink: K,
    previous: Option<Frame>,
    frames: u64,
    logger: LogManager,
}

impl<K: FrameSink> PresentationTask<K> {
    pub fn new(links: PresentationLinks, settings: PresentationSettings, sink: K) -> Self {
        Self {
            links,
            settings,
            sink,
            previous: None,
            frames: 0,
            logger: LogManager::new("presentation"),
        }
    }

    /// Renders and presents one frame from whatever is published right now.
    pub fn tick(&mut self) -> &Frame {
        let reading = self.links.readings.latest();
        let result = self.links.results.latest();
        let config = Arc::clone(&self.links.configuration.borrow());
        let notice = self.links.notices.latest();
        let options = *self.links.display.borrow();
        let inputs = FrameInputs {
            reading: reading.as_deref(),
            result: result.as_deref(),
            config: &config,
            acquisition: self
                .links
                .state
                .latest()
                .map(|state| AcquisitionState::clone(&state))
                .unwrap_or(AcquisitionState::Idle),
            notice: notice.as_deref(),
            calculation: self.links.metrics.snapshot(),
        };

        self.frames += 1;
        let frame = render(
            self.frames,
            self.previous.as_ref(),
            &inputs,
            options,
            &self.settings,
        );
        if let Some(warning) = &frame.warning {
            let repeated = self
                .previous
                .as_ref()
                .is_some_and(|previous| previous.warning.as_ref() == Some(warning));
            if !repeated {
                self.logger.warn(warning);
            }
        }
        self.sink.present(&frame);
        self.previous.insert(frame)
    }

    pub async fn run(mut self) {
        let mut interval = tokio::time::interval(self.settings.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.logger.record(&format!(
            "presenting every {} ms",
            self.settings.interval.as_millis()
        ));
        loop {
            interval.tick().await;
            self.tick();
        }
    }
}

impl<K: FrameSink + 'static> PresentationTask<K> {
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::config::tests::sample_configuration;
    use crate::pipeline::broadcast::ConfigurationBroadcaster;
    use crate::prelude::TAP_COUNT;

    struct Rig {
        readings: Publisher<Reading>,
        results: Publisher<CalculationResult>,
        notices: Publisher<Notice>,
        display: DisplayControl,
        _broadcaster: ConfigurationBroadcaster,
        task: PresentationTask<Publisher<Frame>>,
        frames: Publisher<Frame>,
    }

    fn rig() -> Rig {
        let readings = Publisher::new();
        let results = Publisher::new();
        let notices = Publisher::new();
        let state = Publisher::new();
        state.publish(AcquisitionState::Running);
        let display = DisplayControl::default();
        let broadcaster = ConfigurationBroadcaster::new(sample_configuration()).unwrap();
        let frames = Publisher::new();
        let links = PresentationLinks {
            readings: readings.subscribe(),
            results: results.subscribe(),
            configuration: broadcaster.subscribe(),
            state: state.subscribe(),
            notices: notices.subscribe(),
            display: display.subscribe(),
            metrics: Arc::new(MetricsRecorder::new()),
        };
        let task = PresentationTask::new(links, PresentationSettings::default(), frames.clone());
        Rig {
            readings,
            results,
            notices,
            display,
            _broadcaster: broadcaster,
            task,
            frames,
        }
    }

    fn reading(sequence: u64, value: f64, density: f64) -> Reading {
        let environment = Environment {
            temperature: 20.0,
            ambient_pressure: 101_300.0,
            humidity: 40.0,
            density,
        };
        Reading::new(sequence, [value; TAP_COUNT], environment)
    }

    fn valid_result() -> CalculationResult {
        CalculationResult {
            sequence: 1,
            lift: 48.0,
            spline_top: vec![-240.0, -120.0],
            spline_bottom: vec![120.0, 0.0],
            interpolation_grid: vec![0.0, 1.0],
            wing_sample_top: vec![(0.0, 0.0), (0.5, 0.05), (2.0, 0.0)],
            wing_sample_bottom: vec![(0.0, 0.0), (2.0, 0.0)],
            valid: true,
        }
    }

    #[test]
    fn pressure_view_lists_active_taps_per_surface() {
        let mut rig = rig();
        rig.readings.publish(reading(1, -120.0, 1.2));
        let frame = rig.task.tick().clone();
        assert_eq!(frame.top.len(), 8);
        assert_eq!(frame.bottom.len(), 8);
        assert!(frame.top.iter().all(|tap| tap.value == -120.0));
        assert_eq!(frame.bottom[0].tap, 8);
        assert_eq!(frame.acquisition, AcquisitionState::Running);
        assert_eq!(rig.frames.latest().as_deref(), Some(&frame));
    }

    #[test]
    fn coefficient_view_divides_by_dynamic_pressure() {
        let mut rig = rig();
        rig.display.set(DisplayOptions {
            mode: DisplayMode::CoefficientView,
            show_spline: true,
        });
        // q = 0.5 * 20^2 * 1.2 = 240
        rig.readings.publish(reading(1, -120.0, 1.2));
        rig.results.publish(valid_result());
        let frame = rig.task.tick().clone();

        assert!(frame.top.iter().all(|tap| (tap.value + 0.5).abs() < 1e-12));
        assert!((frame.lift.unwrap() - 0.2).abs() < 1e-12);
        assert_eq!(frame.lift_label, "0.20");
        let overlay = frame.overlay.unwrap();
        assert!((overlay.spline_top[0] + 1.0).abs() < 1e-12);
        assert_eq!(overlay.wing_top[2].0, 1.0);
        assert!(frame.warning.is_none());
    }

    #[test]
    fn non_positive_dynamic_pressure_hides_values() {
        let mut rig = rig();
        rig.display.set(DisplayOptions {
            mode: DisplayMode::CoefficientView,
            show_spline: true,
        });
        rig.readings.publish(reading(1, -120.0, 0.0));
        rig.results.publish(valid_result());
        let frame = rig.task.tick();
        assert!(frame.top.is_empty());
        assert!(frame.lift.is_none());
        assert!(frame.overlay.is_none());
        assert!(frame.warning.is_some());
    }

    #[test]
    fn overlay_requires_a_valid_result_and_the_flag() {
        let mut rig = rig();
        rig.readings.publish(reading(1, -120.0, 1.2));
        rig.results.publish(CalculationResult::pending());
        assert!(rig.task.tick().overlay.is_none());

        rig.results.publish(valid_result());
        assert!(rig.task.tick().overlay.is_some());

        rig.display.set(DisplayOptions {
            mode: DisplayMode::PressureView,
            show_spline: false,
        });
        assert!(rig.task.tick().overlay.is_none());
    }

    #[test]
    fn paused_keeps_values_but_updates_status() {
        let mut rig = rig();
        rig.readings.publish(reading(1, -120.0, 1.2));
        let before = rig.task.tick().clone();

        rig.display.set(DisplayOptions {
            mode: DisplayMode::Paused,
            show_spline: true,
        });
        rig.readings.publish(reading(2, -999.0, 1.2));
        rig.notices.publish(Notice::error("scanner unplugged"));
        let paused = rig.task.tick().clone();

        assert_eq!(paused.mode, DisplayMode::Paused);
        assert_eq!(paused.top, before.top);
        assert_eq!(paused.reading_sequence, Some(1));
        assert_eq!(paused.frame, before.frame + 1);
        assert_eq!(paused.notice_color, Color::RED);

        rig.display.set(DisplayOptions {
            mode: DisplayMode::PressureView,
            show_spline: true,
        });
        assert_eq!(rig.task.tick().reading_sequence, Some(2));
    }

    #[test]
    fn reversed_wing_flips_the_scaled_outline() {
        let settings = PresentationSettings {
            reverse_wing: true,
            wing_scale_pressure: 10.0,
            ..PresentationSettings::default()
        };
        let config = sample_configuration();
        let result = valid_result();
        let inputs = FrameInputs {
            reading: None,
            result: Some(&result),
            config: &config,
            acquisition: AcquisitionState::Idle,
            notice: None,
            calculation: CycleCounts::default(),
        };
        let frame = render(1, None, &inputs, DisplayOptions::default(), &settings);
        let overlay = frame.overlay.unwrap();
        assert_eq!(overlay.wing_top[1], (0.25, -0.5));
        assert_eq!(overlay.wing_top[2], (1.0, 0.0));
    }
}
