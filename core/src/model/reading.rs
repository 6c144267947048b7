use crate::prelude::{ENVIRONMENT_ARITY, TAP_COUNT};
use serde::{Deserialize, Serialize};

/// Ambient conditions reported by the density sensor, in wire order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub temperature: f64,
    pub ambient_pressure: f64,
    pub humidity: f64,
    pub density: f64,
}

impl Environment {
    pub fn from_values(values: [f64; ENVIRONMENT_ARITY]) -> Self {
        Self {
            temperature: values[0],
            ambient_pressure: values[1],
            humidity: values[2],
            density: values[3],
        }
    }

    pub fn to_values(&self) -> [f64; ENVIRONMENT_ARITY] {
        [
            self.temperature,
            self.ambient_pressure,
            self.humidity,
            self.density,
        ]
    }
}

/// One merged sample of both instruments. Immutable once published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub sequence: u64,
    pub pressure: [f64; TAP_COUNT],
    pub environment: Environment,
}

impl Reading {
    pub fn new(sequence: u64, pressure: [f64; TAP_COUNT], environment: Environment) -> Self {
        Self {
            sequence,
            pressure,
            environment,
        }
    }

    /// Builds a reading from raw device answers. Lengths must already match
    /// the declared arities.
    pub fn from_slices(sequence: u64, pressure: &[f64], environment: &[f64]) -> Option<Self> {
        let pressure: [f64; TAP_COUNT] = pressure.try_into().ok()?;
        let environment: [f64; ENVIRONMENT_ARITY] = environment.try_into().ok()?;
        Some(Self::new(
            sequence,
            pressure,
            Environment::from_values(environment),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_slices_rejects_wrong_lengths() {
        assert!(Reading::from_slices(1, &[0.0; 15], &[0.0; 4]).is_none());
        assert!(Reading::from_slices(1, &[0.0; 16], &[0.0; 5]).is_none());
    }

    #[test]
    fn environment_keeps_wire_order() {
        let reading = Reading::from_slices(3, &[1.0; 16], &[20.0, 101300.0, 40.0, 1.204]).unwrap();
        assert_eq!(reading.environment.temperature, 20.0);
        assert_eq!(reading.environment.ambient_pressure, 101300.0);
        assert_eq!(reading.environment.humidity, 40.0);
        assert_eq!(reading.environment.density, 1.204);
        assert_eq!(reading.environment.to_values(), [20.0, 101300.0, 40.0, 1.204]);
    }
}
