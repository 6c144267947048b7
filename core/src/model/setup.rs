use crate::model::config::{Configuration, FlowConditions, Surface, TapMask, WingProfile};
use crate::prelude::{ConfigurationError, TAP_COUNT};
use serde::{Deserialize, Serialize};

/// Raw tap form as entered during setup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupInput {
    pub tap_enabled: [bool; TAP_COUNT],
    pub tap_on_top: [bool; TAP_COUNT],
    pub tap_coordinates: [f64; TAP_COUNT],
}

/// Tap masks and coordinates that passed setup validation.
#[derive(Debug, Clone, PartialEq)]
pub struct TapLayout {
    pub tap_coordinates: [f64; TAP_COUNT],
    pub mask_top: TapMask,
    pub mask_bottom: TapMask,
}

impl SetupInput {
    /// Derives the disjoint surface masks and checks the setup rules.
    pub fn validate(&self) -> Result<TapLayout, ConfigurationError> {
        let mut top = [false; TAP_COUNT];
        let mut bottom = [false; TAP_COUNT];
        for tap in 0..TAP_COUNT {
            top[tap] = self.tap_enabled[tap] && self.tap_on_top[tap];
            bottom[tap] = self.tap_enabled[tap] && !self.tap_on_top[tap];
        }
        let layout = TapLayout {
            tap_coordinates: self.tap_coordinates,
            mask_top: TapMask::new(top),
            mask_bottom: TapMask::new(bottom),
        };

        let surfaces = [
            (Surface::Top, &layout.mask_top),
            (Surface::Bottom, &layout.mask_bottom),
        ];
        for (surface, mask) in surfaces {
            if mask.count() < 2 {
                return Err(ConfigurationError::InsufficientTaps {
                    surface,
                    count: mask.count(),
                });
            }
        }
        for (surface, mask) in surfaces {
            let mut seen: Vec<f64> = Vec::new();
            for tap in mask.indices() {
                let coordinate = self.tap_coordinates[tap];
                if !coordinate.is_finite() || !(0.0..=1.0).contains(&coordinate) {
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
        Ok(layout)
    }
}

impl TapLayout {
    pub fn into_configuration(
        self,
        flow: FlowConditions,
        chord_length: f64,
        wing: WingProfile,
        interpolation_points: usize,
    ) -> Result<Configuration, ConfigurationError> {
        let config = Configuration {
            tap_coordinates: self.tap_coordinates,
            active_mask_top: self.mask_top,
            active_mask_bottom: self.mask_bottom,
            flow,
            chord_length,
            wing,
            interpolation_points,
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::config::tests::symmetric_wing;

    fn input() -> SetupInput {
        let mut tap_on_top = [false; TAP_COUNT];
        tap_on_top[..8].fill(true);
        let mut tap_coordinates = [0.0; TAP_COUNT];
        for tap in 0..8 {
            tap_coordinates[tap] = tap as f64 * 0.1;
            tap_coordinates[tap + 8] = tap as f64 * 0.1 + 0.05;
        }
        SetupInput {
            tap_enabled: [true; TAP_COUNT],
            tap_on_top,
            tap_coordinates,
        }
    }

    #[test]
    fn masks_follow_enable_and_surface_flags() {
        let mut form = input();
        form.tap_enabled[3] = false;
        form.tap_enabled[12] = false;
        let layout = form.validate().unwrap();
        assert_eq!(layout.mask_top.bit_string(), "1110111100000000");
        assert_eq!(layout.mask_bottom.bit_string(), "0000000011110111");
        assert_eq!(layout.mask_top.overlap(&layout.mask_bottom), None);
    }

    #[test]
    fn single_active_tap_on_a_surface_is_rejected() {
        let mut form = input();
        form.tap_enabled[9..].fill(false);
        assert_eq!(
            form.validate(),
            Err(ConfigurationError::InsufficientTaps {
                surface: Surface::Bottom,
                count: 1
            })
        );
    }

    #[test]
    fn duplicate_active_coordinates_are_rejected() {
        let mut form = input();
        form.tap_coordinates[5] = form.tap_coordinates[2];
        assert!(matches!(
            form.validate(),
            Err(ConfigurationError::DuplicateCoordinate {
                surface: Surface::Top,
                ..
            })
        ));
    }

    #[test]
    fn duplicate_on_disabled_tap_is_ignored() {
        let mut form = input();
        form.tap_coordinates[5] = form.tap_coordinates[2];
        form.tap_enabled[5] = false;
        assert!(form.validate().is_ok());
    }

    #[test]
    fn same_coordinate_on_opposite_surfaces_is_allowed() {
        let mut form = input();
        form.tap_coordinates[9] = form.tap_coordinates[1];
        assert!(form.validate().is_ok());
    }

    #[test]
    fn layout_builds_a_valid_configuration() {
        let config = input()
            .validate()
            .unwrap()
            .into_configuration(FlowConditions::default(), 0.2, symmetric_wing(), 50)
            .unwrap();
        assert_eq!(config.active_mask_top.count(), 8);
        assert_eq!(config.interpolation_points, 50);
    }
}
