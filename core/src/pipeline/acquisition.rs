//! Owns both instruments and turns them into a stream of [`Reading`]s.

use crate::device::DeviceChannel;
use crate::math::{MatrixHelper, StatsHelper};
use crate::model::{CalculationResult, Configuration, Environment, PersistedRecord, Reading};
use crate::pipeline::channel::{Notice, NoticeLevel, Publisher, Subscription};
use crate::prelude::{DeviceError, ProtocolError, ENVIRONMENT_ARITY, PRESSURE_ARITY, TAP_COUNT};
use crate::storage::CsvLog;
use crate::telemetry::LogManager;
use serde::{Deserialize, Serialize};
use std::io;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AcquisitionState {
    Idle,
    Running,
    BatchAveraging { target: usize, collected: usize },
    Faulted { reason: String },
}

impl AcquisitionState {
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            AcquisitionState::Running | AcquisitionState::BatchAveraging { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionCommand {
    Stop,
    SaveAveraged { samples: usize },
}

/// Channels the acquisition loop reads from and writes to.
#[derive(Clone)]
pub struct AcquisitionLinks {
    pub readings: Publisher<Reading>,
    pub results: Subscription<CalculationResult>,
    pub configuration: watch::Receiver<Arc<Configuration>>,
    pub state: Publisher<AcquisitionState>,
    pub notices: Publisher<Notice>,
}

#[derive(Debug, Clone)]
pub struct AcquisitionSettings {
    pub log: CsvLog,
    /// Sleep between cycles, on top of the device round trips.
    pub pace: Option<Duration>,
}

/// How the acquisition thread ended.
pub enum AcquisitionExit {
    /// Stopped on request; the devices are still open and can be restarted.
    Stopped(AcquisitionTask),
    Faulted(DeviceError),
    Panicked,
}

pub struct AcquisitionTask {
    pressure: Box<dyn DeviceChannel>,
    environment: Box<dyn DeviceChannel>,
    links: AcquisitionLinks,
    settings: AcquisitionSettings,
    sequence: u64,
    logger: LogManager,
}

/// Handle to a running acquisition thread.
pub struct AcquisitionHandle {
    commands: Sender<AcquisitionCommand>,
    thread: JoinHandle<AcquisitionExit>,
}

impl AcquisitionHandle {
    /// Requests a cooperative stop; the current cycle completes first.
    pub fn stop(&self) -> bool {
        self.commands.send(AcquisitionCommand::Stop).is_ok()
    }

    pub fn save_averaged(&self, samples: usize) -> bool {
        self.commands
            .send(AcquisitionCommand::SaveAveraged { samples })
            .is_ok()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    pub fn join(self) -> AcquisitionExit {
        self.thread.join().unwrap_or(AcquisitionExit::Panicked)
    }
}

struct Batch {
    target: usize,
    config: Arc<Configuration>,
    started: Instant,
    pressure: Vec<Vec<f64>>,
    environment: Vec<Vec<f64>>,
    lift: Vec<f64>,
}

impl Batch {
    fn new(target: usize, config: Arc<Configuration>) -> Self {
        Self {
            target,
            config,
            started: Instant::now(),
            pressure: Vec::with_capacity(target),
            environment: Vec::with_capacity(target),
            lift: Vec::with_capacity(target),
        }
    }

    fn push(&mut self, reading: &Reading, lift: f64) {
        self.pressure.push(reading.pressure.to_vec());
        self.environment
            .push(reading.environment.to_values().to_vec());
        self.lift.push(lift);
    }

    fn collected(&self) -> usize {
        self.lift.len()
    }

    fn is_complete(&self) -> bool {
        self.collected() >= self.target
    }

    fn into_record(self) -> Option<PersistedRecord> {
        let pressure = MatrixHelper::stack_rows(&self.pressure)?;
        let environment = MatrixHelper::stack_rows(&self.environment)?;
        let pressure: [f64; TAP_COUNT] = MatrixHelper::column_means(pressure.view())?
            .to_vec()
            .try_into()
            .ok()?;
        let environment: [f64; ENVIRONMENT_ARITY] =
            MatrixHelper::column_means(environment.view())?
                .to_vec()
                .try_into()
                .ok()?;
        let lift = StatsHelper::mean(&self.lift)?;
        Some(PersistedRecord::from_means(
            chrono::Local::now().format("%H:%M:%S").to_string(),
            &self.config,
            Environment::from_values(environment),
            pressure,
            lift,
            self.target,
            self.started.elapsed().as_secs_f64(),
        ))
    }
}

impl AcquisitionTask {
    pub fn new(
        pressure: Box<dyn DeviceChannel>,
        environment: Box<dyn DeviceChannel>,
        links: AcquisitionLinks,
        settings: AcquisitionSettings,
    ) -> Self {
        links.state.publish(AcquisitionState::Idle);
        Self {
            pressure,
            environment,
            links,
            settings,
            sequence: 0,
            logger: LogManager::new("acquisition"),
        }
    }

    pub fn start(self) -> io::Result<AcquisitionHandle> {
        let (commands, inbox) = mpsc::channel();
        let thread = thread::Builder::new()
            .name("acquisition".into())
            .spawn(move || self.run(inbox))?;
        Ok(AcquisitionHandle { commands, thread })
    }

    /// Releases both devices. The task cannot be restarted afterwards.
    pub fn close(mut self) {
        self.pressure.close();
        self.environment.close();
        self.links.state.publish(AcquisitionState::Idle);
    }

    fn run(mut self, inbox: Receiver<AcquisitionCommand>) -> AcquisitionExit {
        self.set_state(AcquisitionState::Running);
        self.logger.record(&format!(
            "acquisition running ({} + {})",
            self.pressure.name(),
            self.environment.name()
        ));
        let mut batch: Option<Batch> = None;

        loop {
            loop {
                match inbox.try_recv() {
                    Ok(AcquisitionCommand::SaveAveraged { samples }) => {
                        self.begin_batch(&mut batch, samples)
                    }
                    Ok(AcquisitionCommand::Stop) | Err(TryRecvError::Disconnected) => {
                        if batch.is_some() {
                            self.notice(Notice::error("stopped before the measurement was saved"));
                        }
                        self.set_state(AcquisitionState::Idle);
                        self.logger.record("acquisition stopped");
                        return AcquisitionExit::Stopped(self);
                    }
                    Err(TryRecvError::Empty) => break,
                }
            }

            let reading = match self.cycle() {
                Ok(reading) => reading,
                Err(error) => return self.fault(error),
            };

            if let Some(active) = batch.as_mut() {
                active.push(&reading, self.latest_lift());
                if active.is_complete() {
                    if let Some(done) = batch.take() {
                        self.finish_batch(done);
                    }
                    self.set_state(AcquisitionState::Running);
                } else {
                    self.set_state(AcquisitionState::BatchAveraging {
                        target: active.target,
                        collected: active.collected(),
                    });
                }
            }

            if let Some(pace) = self.settings.pace {
                thread::sleep(pace);
            }
        }
    }

    /// One query per instrument, merged and published.
    fn cycle(&mut self) -> Result<Arc<Reading>, DeviceError> {
        let pressure = self.pressure.query()?;
        let environment = self.environment.query()?;
        let reading = Reading::from_slices(self.sequence + 1, &pressure, &environment)
            .ok_or_else(|| {
                let (device, expected, received) = if pressure.len() != PRESSURE_ARITY {
                    (self.pressure.name(), PRESSURE_ARITY, pressure.len())
                } else {
                    (self.environment.name(), ENVIRONMENT_ARITY, environment.len())
                };
                DeviceError::Protocol {
                    device: device.to_string(),
                    error: ProtocolError::ShapeMismatch { expected, received },
                }
            })?;
        self.sequence = reading.sequence;
        self.logger
            .detail(&format!("published reading {}", reading.sequence));
        let reading = Arc::new(reading);
        self.links.readings.publish_shared(Arc::clone(&reading));
        Ok(reading)
    }

    fn begin_batch(&mut self, batch: &mut Option<Batch>, samples: usize) {
        if batch.is_some() {
            self.notice(Notice::error("a measurement is already being averaged"));
            return;
        }
        if samples == 0 {
            self.notice(Notice::error("number of measurements must be at least 1"));
            return;
        }
        let config = Arc::clone(&self.links.configuration.borrow());
        self.logger
            .record(&format!("averaging {samples} measurements"));
        *batch = Some(Batch::new(samples, config));
        self.set_state(AcquisitionState::BatchAveraging {
            target: samples,
            collected: 0,
        });
    }

    fn finish_batch(&mut self, batch: Batch) {
        let samples = batch.target;
        let Some(record) = batch.into_record() else {
            self.notice(Notice::error("could not average the collected measurements"));
            return;
        };
        match self.settings.log.append(&record) {
            Ok(()) => self.notice(Notice::info(format!(
                "saved mean of {samples} measurements to {}",
                self.settings.log.path().display()
            ))),
            Err(error) => self.notice(Notice::error(format!("saving failed: {error}"))),
        }
    }

    /// Latest valid lift, or zero before the first successful calculation.
    fn latest_lift(&self) -> f64 {
        self.links
            .results
            .latest()
            .filter(|result| result.valid)
            .map(|result| result.lift)
            .unwrap_or(0.0)
    }

    fn fault(mut self, error: DeviceError) -> AcquisitionExit {
        self.pressure.close();
        self.environment.close();
        let reason = error.to_string();
        self.logger.error(&format!("acquisition faulted: {reason}"));
        self.set_state(AcquisitionState::Faulted {
            reason: reason.clone(),
        });
        self.notice(Notice::error(format!(
            "{reason}. Check the connections and rerun setup."
        )));
        AcquisitionExit::Faulted(error)
    }

    fn set_state(&self, state: AcquisitionState) {
        self.links.state.publish(state);
    }

    fn notice(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info => self.logger.record(&notice.text),
            NoticeLevel::Error => self.logger.error(&notice.text),
        }
        self.links.notices.publish(notice);
    }
}
