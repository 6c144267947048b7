use liftcore::device::DeviceChannel;
use liftcore::prelude::{DeviceError, ENVIRONMENT_ARITY, PRESSURE_ARITY};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::thread;
use std::time::Duration;

/// Scanner baseline in Pa, tap 0 first.
pub const DEMO_PRESSURE: [f64; PRESSURE_ARITY] = [
    -544.748169, -2236.290039, -2460.624512, -2423.094482, -2175.291016, -1864.910034,
    -967.708191, -331.208191, -237.724548, -185.575455, 786.495483, 550.785461, 362.640900,
    269.612732, 181.036362, 53.290001,
];
const DEMO_PRESSURE_NOISE: f64 = 100.0;

/// Temperature, ambient pressure, humidity, density.
pub const DEMO_ENVIRONMENT: [f64; ENVIRONMENT_ARITY] = [20.0, 101_300.0, 40.0, 1.204];
const DEMO_ENVIRONMENT_NOISE: [f64; ENVIRONMENT_ARITY] = [10.0, 100.0, 10.0, 1.0];

/// Stand-in instrument: baseline plus uniform noise, answered after a fixed delay.
pub struct DemoDevice {
    name: String,
    baseline: Vec<f64>,
    noise: Vec<f64>,
    delay: Duration,
    rng: StdRng,
    closed: bool,
}

impl DemoDevice {
    pub fn new(
        name: impl Into<String>,
        baseline: Vec<f64>,
        noise: Vec<f64>,
        delay: Duration,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            name: name.into(),
            baseline,
            noise,
            delay,
            rng,
            closed: false,
        }
    }

    pub fn pressure(delay: Duration, seed: Option<u64>) -> Self {
        Self::new(
            "demo pressure scanner",
            DEMO_PRESSURE.to_vec(),
            vec![DEMO_PRESSURE_NOISE; PRESSURE_ARITY],
            delay,
            seed,
        )
    }

    pub fn environment(delay: Duration, seed: Option<u64>) -> Self {
        Self::new(
            "demo density sensor",
            DEMO_ENVIRONMENT.to_vec(),
            DEMO_ENVIRONMENT_NOISE.to_vec(),
            delay,
            // Distinct stream from the scanner when both share a seed.
            seed.map(|seed| seed.wrapping_add(1)),
        )
    }
}

impl DeviceChannel for DemoDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn arity(&self) -> usize {
        self.baseline.len()
    }

    fn query(&mut self) -> Result<Vec<f64>, DeviceError> {
        if self.closed {
            return Err(DeviceError::Closed(self.name.clone()));
        }
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        let rng = &mut self.rng;
        Ok(self
            .baseline
            .iter()
            .zip(&self.noise)
            .map(|(base, amplitude)| base + rng.gen::<f64>() * amplitude)
            .collect())
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
