use crate::generator::demo::DemoDevice;
use crate::generator::naca::symmetric_profile;
use crate::gui_bridge::model::SetupRequest;
use crate::workflow::config::StationConfig;
use anyhow::{anyhow, bail, Context};
use chrono::{DateTime, Local};
use liftcore::device::{open_serial, DeviceChannel};
use liftcore::model::{CalculationResult, Configuration, FlowConditions, Reading, WingProfile};
use liftcore::pipeline::{
    AcquisitionExit, AcquisitionHandle, AcquisitionLinks, AcquisitionSettings, AcquisitionState,
    AcquisitionTask, CalculationTask, ConfigurationBroadcaster, DisplayControl, DisplayOptions,
    Frame, Notice, PresentationLinks, PresentationTask, Publisher,
};
use liftcore::prelude::{ENVIRONMENT_ARITY, PRESSURE_ARITY};
use liftcore::processing::LiftStage;
use liftcore::profile::load_profile;
use liftcore::storage::{default_log_path, CsvLog};
use liftcore::telemetry::MetricsRecorder;
use log::{info, warn};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;

enum Acquisition {
    Unarmed,
    Armed(AcquisitionTask),
    Running(AcquisitionHandle),
}

/// Owns the pipeline channels and the acquisition slot, and carries out the
/// operator's setup/start/stop/save requests.
pub struct Runner {
    config: StationConfig,
    broadcaster: ConfigurationBroadcaster,
    readings: Publisher<Reading>,
    results: Publisher<CalculationResult>,
    state: Publisher<AcquisitionState>,
    notices: Publisher<Notice>,
    frames: Publisher<Frame>,
    display: DisplayControl,
    metrics: Arc<MetricsRecorder>,
    log: CsvLog,
    acquisition: Mutex<Acquisition>,
}

impl Runner {
    pub fn new(config: StationConfig, started: DateTime<Local>) -> anyhow::Result<Self> {
        let wing = wing_profile(config.profile.as_deref(), config.interpolation_points)?;
        let initial = config
            .taps
            .validate()
            .context("validating configured tap layout")?
            .into_configuration(
                config.flow,
                config.chord_length,
                wing,
                config.interpolation_points,
            )
            .context("building initial configuration")?;
        let broadcaster =
            ConfigurationBroadcaster::new(initial).context("publishing initial configuration")?;
        let log = CsvLog::new(default_log_path(&config.data_dir, started));
        let state = Publisher::new();
        state.publish(AcquisitionState::Idle);

        Ok(Self {
            config,
            broadcaster,
            readings: Publisher::new(),
            results: Publisher::new(),
            state,
            notices: Publisher::new(),
            frames: Publisher::new(),
            display: DisplayControl::default(),
            metrics: Arc::new(MetricsRecorder::new()),
            log,
            acquisition: Mutex::new(Acquisition::Unarmed),
        })
    }

    /// Starts the calculation and presentation tasks on the current runtime.
    pub fn spawn_tasks(&self) -> Vec<JoinHandle<()>> {
        let calculation = CalculationTask::new(
            LiftStage::new(),
            self.readings.subscribe(),
            self.broadcaster.subscribe(),
            self.results.clone(),
            Arc::clone(&self.metrics),
        )
        .spawn();
        let calculation = tokio::spawn(async move {
            if let Err(err) = calculation.await {
                warn!("calculation task ended abnormally: {err}");
            }
        });

        let links = PresentationLinks {
            readings: self.readings.subscribe(),
            results: self.results.subscribe(),
            configuration: self.broadcaster.subscribe(),
            state: self.state.subscribe(),
            notices: self.notices.subscribe(),
            display: self.display.subscribe(),
            metrics: Arc::clone(&self.metrics),
        };
        let presentation = PresentationTask::new(
            links,
            self.config.presentation_settings(),
            self.frames.clone(),
        )
        .spawn();
        vec![calculation, presentation]
    }

    /// Validates the request, connects and probes both instruments and arms
    /// acquisition with the new configuration. Blocks on device I/O.
    pub fn setup(&self, request: SetupRequest) -> anyhow::Result<()> {
        let outcome = self.try_setup(request);
        match &outcome {
            Ok(()) => self.notify(Notice::info("Setup complete, press start to acquire.")),
            Err(err) => self.notify(Notice::error(format!("Setup failed: {err:#}"))),
        }
        outcome
    }

    fn try_setup(&self, request: SetupRequest) -> anyhow::Result<()> {
        let taps = request.taps.unwrap_or_else(|| self.config.taps.clone());
        let layout = taps.validate().context("invalid tap layout")?;
        let wing = match request.profile.as_deref() {
            Some(path) => wing_profile(Some(path), self.config.interpolation_points)?,
            None => self.broadcaster.current().wing.clone(),
        };
        let config = layout
            .into_configuration(
                self.broadcaster.current().flow,
                request.chord_length.unwrap_or(self.config.chord_length),
                wing,
                self.config.interpolation_points,
            )
            .context("invalid configuration")?;

        let mut slot = self.slot()?;
        Self::release(&mut slot);

        let demo = request.demo.unwrap_or(self.config.demo.enabled);
        let (pressure, environment) = self.connect(
            demo,
            request.pressure_port.as_deref(),
            request.environment_port.as_deref(),
        )?;

        self.broadcaster.apply(config)?;
        self.arm(&mut slot, pressure, environment);
        info!("setup complete (demo: {demo})");
        Ok(())
    }

    fn arm(
        &self,
        slot: &mut Acquisition,
        pressure: Box<dyn DeviceChannel>,
        environment: Box<dyn DeviceChannel>,
    ) {
        *slot = Acquisition::Armed(AcquisitionTask::new(
            pressure,
            environment,
            self.acquisition_links(),
            AcquisitionSettings {
                log: self.log.clone(),
                pace: self.config.pace(),
            },
        ));
    }

    fn connect(
        &self,
        demo: bool,
        pressure_port: Option<&str>,
        environment_port: Option<&str>,
    ) -> anyhow::Result<(Box<dyn DeviceChannel>, Box<dyn DeviceChannel>)> {
        let (mut pressure, mut environment) = if demo {
            let delay = self.config.demo_delay();
            let seed = self.config.demo.seed;
            let pressure: Box<dyn DeviceChannel> = Box::new(DemoDevice::pressure(delay, seed));
            let environment: Box<dyn DeviceChannel> =
                Box::new(DemoDevice::environment(delay, seed));
            (pressure, environment)
        } else {
            let mut pressure_spec = self.config.devices.pressure.clone();
            let mut environment_spec = self.config.devices.environment.clone();
            if let Some(port) = pressure_port {
                pressure_spec.port = port.to_string();
            }
            if let Some(port) = environment_port {
                environment_spec.port = port.to_string();
            }
            let pressure: Box<dyn DeviceChannel> =
                Box::new(open_serial(&pressure_spec, PRESSURE_ARITY)?);
            let environment: Box<dyn DeviceChannel> =
                match open_serial(&environment_spec, ENVIRONMENT_ARITY) {
                    Ok(device) => Box::new(device),
                    Err(err) => {
                        let mut pressure = pressure;
                        pressure.close();
                        return Err(err.into());
                    }
                };
            (pressure, environment)
        };

        let probe = pressure.query().and_then(|_| environment.query());
        if let Err(err) = probe {
            pressure.close();
            environment.close();
            return Err(anyhow::Error::new(err).context("probing instruments"));
        }
        Ok((pressure, environment))
    }

    pub fn start(&self) -> anyhow::Result<()> {
        let mut slot = self.slot()?;
        if let Acquisition::Running(handle) = &*slot {
            if !handle.is_finished() {
                return Ok(());
            }
        }
        match std::mem::replace(&mut *slot, Acquisition::Unarmed) {
            Acquisition::Armed(task) => {
                let handle = task.start().context("spawning acquisition thread")?;
                *slot = Acquisition::Running(handle);
                self.notify(Notice::info("Acquisition running."));
                Ok(())
            }
            Acquisition::Running(handle) => {
                Self::settle(&mut slot, handle.join());
                bail!("acquisition stopped after a fault, rerun setup")
            }
            Acquisition::Unarmed => bail!("no instruments connected, run setup first"),
        }
    }

    pub fn stop(&self) -> anyhow::Result<()> {
        let mut slot = self.slot()?;
        match std::mem::replace(&mut *slot, Acquisition::Unarmed) {
            Acquisition::Running(handle) => {
                handle.stop();
                Self::settle(&mut slot, handle.join());
                Ok(())
            }
            other => {
                *slot = other;
                Ok(())
            }
        }
    }

    pub fn save(&self, samples: Option<usize>) -> anyhow::Result<()> {
        let samples = samples.unwrap_or(self.config.measurements_per_save);
        let slot = self.slot()?;
        match &*slot {
            Acquisition::Running(handle) if !handle.is_finished() => {
                if handle.save_averaged(samples) {
                    Ok(())
                } else {
                    bail!("acquisition is no longer running")
                }
            }
            _ => bail!("start acquisition before saving"),
        }
    }

    pub fn update_flow(&self, flow: FlowConditions) -> anyhow::Result<()> {
        self.broadcaster
            .update_flow(flow)
            .context("rejected flow conditions")
    }

    pub fn set_display(&self, options: DisplayOptions) {
        self.display.set(options);
    }

    pub fn frame(&self) -> Option<Arc<Frame>> {
        self.frames.latest()
    }

    pub fn configuration(&self) -> Arc<Configuration> {
        self.broadcaster.current()
    }

    pub fn log_path(&self) -> &Path {
        self.log.path()
    }

    /// Stops acquisition and releases the instruments.
    pub fn shutdown(&self) {
        match self.slot() {
            Ok(mut slot) => Self::release(&mut slot),
            Err(err) => warn!("shutdown: {err}"),
        }
    }

    fn acquisition_links(&self) -> AcquisitionLinks {
        AcquisitionLinks {
            readings: self.readings.clone(),
            results: self.results.subscribe(),
            configuration: self.broadcaster.subscribe(),
            state: self.state.clone(),
            notices: self.notices.clone(),
        }
    }

    fn slot(&self) -> anyhow::Result<MutexGuard<'_, Acquisition>> {
        self.acquisition
            .lock()
            .map_err(|_| anyhow!("acquisition slot poisoned"))
    }

    fn release(slot: &mut Acquisition) {
        match std::mem::replace(slot, Acquisition::Unarmed) {
            Acquisition::Running(handle) => {
                handle.stop();
                if let AcquisitionExit::Stopped(task) = handle.join() {
                    task.close();
                }
            }
            Acquisition::Armed(task) => task.close(),
            Acquisition::Unarmed => {}
        }
    }

    fn settle(slot: &mut Acquisition, exit: AcquisitionExit) {
        *slot = match exit {
            AcquisitionExit::Stopped(task) => Acquisition::Armed(task),
            AcquisitionExit::Faulted(err) => {
                warn!("acquisition ended with a fault: {err}");
                Acquisition::Unarmed
            }
            AcquisitionExit::Panicked => {
                warn!("acquisition thread panicked");
                Acquisition::Unarmed
            }
        };
    }

    fn notify(&self, notice: Notice) {
        self.notices.publish(notice);
    }
}

fn wing_profile(path: Option<&Path>, points: usize) -> anyhow::Result<WingProfile> {
    match path {
        Some(path) => load_profile(path)
            .with_context(|| format!("loading wing profile {}", path.display())),
        None => Ok(symmetric_profile(0.12, points.max(2))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use liftcore::model::SetupInput;
    use liftcore::pipeline::NoticeLevel;
    use liftcore::prelude::{DeviceError, ProtocolError};
    use std::time::{Duration, Instant};
    use tempfile::tempdir;

    fn demo_runner(dir: &Path) -> Runner {
        let mut config = StationConfig::default();
        config.demo.enabled = true;
        config.demo.seed = Some(11);
        config.demo.delay_ms = 1;
        config.data_dir = dir.to_path_buf();
        config.interpolation_points = 50;
        config.presentation.interval_ms = 5;
        Runner::new(config, Local::now()).unwrap()
    }

    /// Demo scanner that starts answering one value short after `good` queries.
    struct TruncatingScanner {
        inner: DemoDevice,
        good: usize,
    }

    impl DeviceChannel for TruncatingScanner {
        fn name(&self) -> &str {
            self.inner.name()
        }

        fn arity(&self) -> usize {
            self.inner.arity()
        }

        fn query(&mut self) -> Result<Vec<f64>, DeviceError> {
            if self.good == 0 {
                return Err(DeviceError::Protocol {
                    device: self.name().to_string(),
                    error: ProtocolError::ShapeMismatch {
                        expected: PRESSURE_ARITY,
                        received: PRESSURE_ARITY - 1,
                    },
                });
            }
            self.good -= 1;
            self.inner.query()
        }

        fn close(&mut self) {
            self.inner.close()
        }
    }

    fn wait_until(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn start_requires_setup() {
        let dir = tempdir().unwrap();
        let runner = demo_runner(dir.path());
        assert!(runner.start().is_err());
        assert!(runner.save(None).is_err());
        assert!(runner.stop().is_ok());
    }

    #[test]
    fn rejected_setup_keeps_the_configuration() {
        let dir = tempdir().unwrap();
        let runner = demo_runner(dir.path());
        let before = runner.configuration();
        let mut taps: SetupInput = StationConfig::default().taps;
        taps.tap_enabled = [false; 16];
        taps.tap_enabled[0] = true;
        let request = SetupRequest {
            taps: Some(taps),
            ..SetupRequest::default()
        };
        assert!(runner.setup(request).is_err());
        assert_eq!(runner.configuration(), before);
        assert_eq!(
            runner.notices.latest().map(|notice| notice.level),
            Some(NoticeLevel::Error)
        );
    }

    #[test]
    fn missing_serial_port_blocks_running() {
        let dir = tempdir().unwrap();
        let runner = demo_runner(dir.path());
        let request = SetupRequest {
            demo: Some(false),
            pressure_port: Some("/dev/does-not-exist-station".into()),
            ..SetupRequest::default()
        };
        assert!(runner.setup(request).is_err());
        assert!(runner.start().is_err());
        assert!(runner.setup(SetupRequest::default()).is_ok());
        assert!(runner.start().is_ok());
        runner.shutdown();
    }

    #[test]
    fn faulted_acquisition_needs_a_new_setup() {
        let dir = tempdir().unwrap();
        let runner = demo_runner(dir.path());
        let delay = Duration::from_millis(1);
        {
            let mut slot = runner.slot().unwrap();
            runner.arm(
                &mut slot,
                Box::new(TruncatingScanner {
                    inner: DemoDevice::pressure(delay, Some(1)),
                    good: 2,
                }),
                Box::new(DemoDevice::environment(delay, Some(1))),
            );
        }
        runner.start().unwrap();
        wait_until(|| {
            matches!(
                &*runner.slot().unwrap(),
                Acquisition::Running(handle) if handle.is_finished()
            )
        });
        assert!(matches!(
            runner.state.latest().as_deref(),
            Some(AcquisitionState::Faulted { .. })
        ));

        let save = runner.save(Some(3)).unwrap_err();
        assert_eq!(save.to_string(), "start acquisition before saving");
        let start = runner.start().unwrap_err();
        assert_eq!(start.to_string(), "acquisition stopped after a fault, rerun setup");
        let again = runner.start().unwrap_err();
        assert_eq!(again.to_string(), "no instruments connected, run setup first");

        runner.setup(SetupRequest::default()).unwrap();
        runner.start().unwrap();
        runner.shutdown();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn demo_session_saves_an_averaged_row() {
        let dir = tempdir().unwrap();
        let runner = Arc::new(demo_runner(dir.path()));
        let tasks = runner.spawn_tasks();

        let worker = Arc::clone(&runner);
        tokio::task::spawn_blocking(move || {
            worker.setup(SetupRequest::default()).unwrap();
            worker.start().unwrap();
            wait_until(|| {
                worker
                    .frame()
                    .is_some_and(|frame| frame.lift.is_some() && frame.demo)
            });
            worker.save(Some(3)).unwrap();
            wait_until(|| worker.log_path().exists());
            wait_until(|| {
                worker
                    .notices
                    .latest()
                    .is_some_and(|notice| notice.text.starts_with("saved"))
            });
            worker.stop().unwrap();
            assert_eq!(
                worker.state.latest().as_deref(),
                Some(&AcquisitionState::Idle)
            );
            worker.shutdown();
        })
        .await
        .unwrap();

        for task in tasks {
            task.abort();
        }
        let saved = std::fs::read_to_string(runner.log_path()).unwrap();
        let lines: Vec<&str> = saved.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("time,temperature"));
        assert_eq!(lines[1].split(',').nth(9), Some("3"));
    }
}
