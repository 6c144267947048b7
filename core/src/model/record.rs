use crate::model::config::{Configuration, FlowConditions};
use crate::model::reading::Environment;
use crate::prelude::TAP_COUNT;

/// One averaged measurement as written to the CSV log.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedRecord {
    pub timestamp: String,
    pub environment: Environment,
    pub flow: FlowConditions,
    pub lift: f64,
    pub samples: usize,
    pub elapsed_secs: f64,
    pub pressure: [f64; TAP_COUNT],
    pub tap_coordinates: [f64; TAP_COUNT],
    pub mask_top: String,
    pub mask_bottom: String,
}

impl PersistedRecord {
    /// Column names in row order.
    pub fn header() -> Vec<String> {
        let mut header: Vec<String> = [
            "time",
            "temperature",
            "ambient_pressure",
            "humidity",
            "density",
            "angle_of_attack",
            "velocity",
            "lift",
            "width",
            "measurements",
            "duration_s",
        ]
        .iter()
        .map(|name| name.to_string())
        .collect();
        header.extend((0..TAP_COUNT).map(|tap| format!("p{tap}")));
        header.extend((0..TAP_COUNT).map(|tap| format!("x{tap}")));
        header.push("mask_top".into());
        header.push("mask_bottom".into());
        header
    }

    pub fn from_means(
        timestamp: String,
        config: &Configuration,
        environment: Environment,
        pressure: [f64; TAP_COUNT],
        lift: f64,
        samples: usize,
        elapsed_secs: f64,
    ) -> Self {
        Self {
            timestamp,
            environment,
            flow: config.flow,
            lift,
            samples,
            elapsed_secs,
            pressure,
            tap_coordinates: config.tap_coordinates,
            mask_top: config.active_mask_top.bit_string(),
            mask_bottom: config.active_mask_bottom.bit_string(),
        }
    }

    pub fn to_fields(&self) -> Vec<String> {
        let mut fields = vec![self.timestamp.clone()];
        fields.extend(self.environment.to_values().iter().map(f64::to_string));
        fields.push(self.flow.angle_of_attack_deg.to_string());
        fields.push(self.flow.velocity.to_string());
        fields.push(self.lift.to_string());
        fields.push(self.flow.width.to_string());
        fields.push(self.samples.to_string());
        fields.push(self.elapsed_secs.to_string());
        fields.extend(self.pressure.iter().map(f64::to_string));
        fields.extend(self.tap_coordinates.iter().map(f64::to_string));
        fields.push(self.mask_top.clone());
        fields.push(self.mask_bottom.clone());
        fields
    }
}
