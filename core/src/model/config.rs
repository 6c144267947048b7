use crate::prelude::{ConfigurationError, TAP_COUNT};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Aerodynamic side of the wing profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Surface {
    Top,
    Bottom,
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Surface::Top => f.write_str("top"),
            Surface::Bottom => f.write_str("bottom"),
        }
    }
}

/// Selection of physical taps, one slot per tap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapMask([bool; TAP_COUNT]);

impl TapMask {
    pub fn new(bits: [bool; TAP_COUNT]) -> Self {
        Self(bits)
    }

    pub fn from_indices(indices: &[usize]) -> Self {
        let mut bits = [false; TAP_COUNT];
        for &index in indices {
            if index < TAP_COUNT {
                bits[index] = true;
            }
        }
        Self(bits)
    }

    pub fn contains(&self, tap: usize) -> bool {
        self.0.get(tap).copied().unwrap_or(false)
    }

    pub fn count(&self) -> usize {
        self.0.iter().filter(|&&bit| bit).count()
    }

    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.0
            .iter()
            .enumerate()
            .filter_map(|(index, &bit)| bit.then_some(index))
    }

    pub fn is_disjoint(&self, other: &TapMask) -> bool {
        self.overlap(other).is_none()
    }

    /// First tap selected by both masks, if any.
    pub fn overlap(&self, other: &TapMask) -> Option<usize> {
        (0..TAP_COUNT).find(|&tap| self.0[tap] && other.0[tap])
    }

    /// `'1'`/`'0'` per tap, tap 0 first.
    pub fn bit_string(&self) -> String {
        self.0.iter().map(|&bit| if bit { '1' } else { '0' }).collect()
    }
}

/// User-adjustable tunnel conditions. Angle is in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlowConditions {
    pub angle_of_attack_deg: f64,
    pub velocity: f64,
    pub width: f64,
}

impl Default for FlowConditions {
    fn default() -> Self {
        Self {
            angle_of_attack_deg: 0.0,
            velocity: 20.0,
            width: 0.5,
        }
    }
}

impl FlowConditions {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let fields = [
            ("angle of attack", self.angle_of_attack_deg),
            ("velocity", self.velocity),
            ("width", self.width),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(ConfigurationError::InvalidFlow(format!(
                    "{name} must be finite"
                )));
            }
        }
        if self.width < 0.0 {
            return Err(ConfigurationError::InvalidFlow(
                "width must not be negative".into(),
            ));
        }
        Ok(())
    }
}

/// Wing outline split into its two surfaces, each strictly increasing in x.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WingProfile {
    pub name: String,
    pub top: Vec<(f64, f64)>,
    pub bottom: Vec<(f64, f64)>,
}

impl WingProfile {
    pub fn surface(&self, surface: Surface) -> &[(f64, f64)] {
        match surface {
            Surface::Top => &self.top,
            Surface::Bottom => &self.bottom,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        for surface in [Surface::Top, Surface::Bottom] {
            let curve = self.surface(surface);
            if curve.len() < 2 {
                return Err(ConfigurationError::InvalidWing(format!(
                    "{surface} curve needs at least two points"
                )));
            }
            if curve.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
                return Err(ConfigurationError::InvalidWing(format!(
                    "{surface} curve contains non-finite coordinates"
                )));
            }
            if curve.windows(2).any(|pair| pair[1].0 <= pair[0].0) {
                return Err(ConfigurationError::InvalidWing(format!(
                    "{surface} curve x-coordinates are not strictly increasing"
                )));
            }
        }
        Ok(())
    }
}

/// Everything the three tasks need to interpret a reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    pub tap_coordinates: [f64; TAP_COUNT],
    pub active_mask_top: TapMask,
    pub active_mask_bottom: TapMask,
    pub flow: FlowConditions,
    pub chord_length: f64,
    pub wing: WingProfile,
    pub interpolation_points: usize,
}

impl Configuration {
    pub fn mask(&self, surface: Surface) -> &TapMask {
        match surface {
            Surface::Top => &self.active_mask_top,
            Surface::Bottom => &self.active_mask_bottom,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if let Some(tap) = self.active_mask_top.overlap(&self.active_mask_bottom) {
            return Err(ConfigurationError::OverlappingMasks { tap });
        }
        for surface in [Surface::Top, Surface::Bottom] {
            let mask = self.mask(surface);
            if mask.count() < 2 {
                return Err(ConfigurationError::InsufficientTaps {
                    surface,
                    count: mask.count(),
                });
            }
            let mut seen: Vec<f64> = Vec::with_capacity(mask.count());
            for tap in mask.indices() {
                let coordinate = self.tap_coordinates[tap];
                if !(0.0..=1.0).contains(&coordinate) {
                    return Err(ConfigurationError::CoordinateOutOfRange { tap, coordinate });
                }
                if seen.contains(&coordinate) {
                    return Err(ConfigurationError::DuplicateCoordinate {
                        surface,
                        coordinate,
                    });
                }
                seen.push(coordinate);
            }
        }
        if !self.chord_length.is_finite() || self.chord_length <= 0.0 {
            return Err(ConfigurationError::InvalidWing(format!(
                "chord length {} must be positive",
                self.chord_length
            )));
        }
        if self.interpolation_points < 2 {
            return Err(ConfigurationError::InvalidGrid(self.interpolation_points));
        }
        self.flow.validate()?;
        self.wing.validate()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Symmetric diamond-ish wing used across the crate's tests.
    pub(crate) fn symmetric_wing() -> WingProfile {
        let top = vec![(0.0, 0.0), (0.25, 0.06), (0.5, 0.05), (0.75, 0.03), (1.0, 0.0)];
        let bottom = top.iter().map(|&(x, y)| (x, -y)).collect();
        WingProfile {
            name: "TEST0012".into(),
            top,
            bottom,
        }
    }

    pub(crate) fn sample_configuration() -> Configuration {
        let mut tap_coordinates = [0.0; TAP_COUNT];
        let top = [0.0, 0.05, 0.1, 0.2, 0.3, 0.45, 0.6, 0.8];
        let bottom = [0.0, 0.05, 0.1, 0.2, 0.3, 0.45, 0.6, 0.8];
        tap_coordinates[..8].copy_from_slice(&top);
        tap_coordinates[8..].copy_from_slice(&bottom);
        Configuration {
            tap_coordinates,
            active_mask_top: TapMask::from_indices(&[0, 1, 2, 3, 4, 5, 6, 7]),
            active_mask_bottom: TapMask::from_indices(&[8, 9, 10, 11, 12, 13, 14, 15]),
            flow: FlowConditions::default(),
            chord_length: 0.2,
            wing: symmetric_wing(),
            interpolation_points: 101,
        }
    }

    #[test]
    fn mask_bit_string_is_tap_ordered() {
        let mask = TapMask::from_indices(&[0, 2, 15]);
        assert_eq!(mask.bit_string(), "1010000000000001");
        assert_eq!(mask.count(), 3);
        assert_eq!(mask.indices().collect::<Vec<_>>(), vec![0, 2, 15]);
        assert!(mask.is_disjoint(&TapMask::from_indices(&[1, 3])));
        assert!(!mask.is_disjoint(&TapMask::from_indices(&[2])));
    }

    #[test]
    fn sample_configuration_is_valid() {
        assert_eq!(sample_configuration().validate(), Ok(()));
    }

    #[test]
    fn overlapping_masks_are_rejected() {
        let mut config = sample_configuration();
        config.active_mask_bottom = TapMask::from_indices(&[7, 8, 9]);
        assert_eq!(
            config.validate(),
            Err(ConfigurationError::OverlappingMasks { tap: 7 })
        );
    }

    #[test]
    fn duplicate_coordinate_on_one_surface_is_rejected() {
        let mut config = sample_configuration();
        config.tap_coordinates[3] = 0.1;
        assert_eq!(
            config.validate(),
            Err(ConfigurationError::DuplicateCoordinate {
                surface: Surface::Top,
                coordinate: 0.1
            })
        );
    }

    #[test]
    fn non_monotonic_wing_is_rejected() {
        let mut config = sample_configuration();
        config.wing.bottom.swap(1, 2);
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidWing(_))
        ));
    }

    #[test]
    fn non_finite_flow_is_rejected() {
        let flow = FlowConditions {
            velocity: f64::NAN,
            ..FlowConditions::default()
        };
        assert!(flow.validate().is_err());
    }
}
