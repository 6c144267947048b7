use crate::model::{CalculationResult, Configuration, Reading};
use crate::pipeline::channel::{Publisher, Subscription};
use crate::prelude::ProcessingStage;
use crate::telemetry::{LogManager, MetricsRecorder};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Runs a [`ProcessingStage`] once per published reading.
///
/// At most one run is in flight; readings published during a run collapse to
/// the newest. A failed cycle is skipped and the last published result stays
/// current.
pub struct CalculationTask<S: ProcessingStage> {
    stage: S,
    readings: Subscription<Reading>,
    configuration: watch::Receiver<Arc<Configuration>>,
    results: Publisher<CalculationResult>,
    metrics: Arc<MetricsRecorder>,
    logger: LogManager,
}

impl<S: ProcessingStage> CalculationTask<S> {
    pub fn new(
        stage: S,
        readings: Subscription<Reading>,
        configuration: watch::Receiver<Arc<Configuration>>,
        results: Publisher<CalculationResult>,
        metrics: Arc<MetricsRecorder>,
    ) -> Self {
        Self {
            stage,
            readings,
            configuration,
            results,
            metrics,
            logger: LogManager::new("calculation"),
        }
    }

    /// Loops until every reading publisher is dropped, then hands the stage
    /// back after cleanup.
    pub async fn run(mut self) -> S {
        self.reconfigure();
        while let Some(reading) = self.readings.changed().await {
            if self.configuration.has_changed().unwrap_or(false) {
                self.reconfigure();
            }
            self.process(&reading);
        }
        self.stage.cleanup();
        self.logger.record("calculation task finished");
        self.stage
    }

    fn reconfigure(&mut self) {
        let config = Arc::clone(&self.configuration.borrow_and_update());
        match self.stage.initialize(&config) {
            Ok(()) => self.logger.record("stage initialized for new configuration"),
            Err(error) => {
                self.stage.cleanup();
                self.logger
                    .warn(&format!("configuration rejected by stage: {error}"));
            }
        }
    }

    fn process(&mut self, reading: &Reading) {
        match self.stage.execute(reading) {
            Ok(result) => {
                self.metrics.record_processed();
                self.logger.detail(&format!(
                    "reading {} -> lift {:.3}",
                    reading.sequence, result.lift
                ));
                self.results.publish(result);
            }
            Err(error) => {
                self.metrics.record_error();
                self.logger.warn(&format!(
                    "skipping reading {}: {error}",
                    reading.sequence
                ));
            }
        }
    }
}

impl<S: ProcessingStage + Send + 'static> CalculationTask<S> {
    pub fn spawn(self) -> JoinHandle<S> {
        tokio::spawn(self.run())
    }
}
