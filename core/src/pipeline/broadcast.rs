use crate::model::{Configuration, FlowConditions};
use crate::prelude::ConfigurationError;
use crate::telemetry::LogManager;
use std::sync::Arc;
use tokio::sync::watch;

/// Holds the one current [`Configuration`] and fans it out to the tasks.
///
/// Every accepted change replaces the whole value, so subscribers never see a
/// half-updated configuration. Once `apply` or `update_flow` returns, the new
/// value is what every subscriber's `borrow` yields.
pub struct ConfigurationBroadcaster {
    sender: watch::Sender<Arc<Configuration>>,
    logger: LogManager,
}

impl ConfigurationBroadcaster {
    pub fn new(initial: Configuration) -> Result<Self, ConfigurationError> {
        initial.validate()?;
        let (sender, _) = watch::channel(Arc::new(initial));
        Ok(Self {
            sender,
            logger: LogManager::new("broadcast"),
        })
    }

    pub fn apply(&self, config: Configuration) -> Result<(), ConfigurationError> {
        config.validate()?;
        self.sender.send_replace(Arc::new(config));
        self.logger.record("configuration replaced");
        Ok(())
    }

    /// Replaces angle, velocity and width in one step.
    pub fn update_flow(&self, flow: FlowConditions) -> Result<(), ConfigurationError> {
        flow.validate()?;
        self.sender.send_modify(|current| {
            let mut next = Configuration::clone(current);
            next.flow = flow;
            *current = Arc::new(next);
        });
        self.logger.detail(&format!(
            "flow updated: angle {} deg, velocity {}, width {}",
            flow.angle_of_attack_deg, flow.velocity, flow.width
        ));
        Ok(())
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Configuration>> {
        self.sender.subscribe()
    }

    pub fn current(&self) -> Arc<Configuration> {
        Arc::clone(&self.sender.borrow())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::config::tests::sample_configuration;
    use crate::model::TapMask;

    #[test]
    fn apply_is_visible_to_existing_subscribers() {
        let broadcaster = ConfigurationBroadcaster::new(sample_configuration()).unwrap();
        let mut receiver = broadcaster.subscribe();
        let mut next = sample_configuration();
        next.chord_length = 0.3;
        broadcaster.apply(next).unwrap();
        assert!(receiver.has_changed().unwrap());
        assert_eq!(receiver.borrow_and_update().chord_length, 0.3);
    }

    #[test]
    fn invalid_configuration_leaves_current_untouched() {
        let broadcaster = ConfigurationBroadcaster::new(sample_configuration()).unwrap();
        let receiver = broadcaster.subscribe();
        let mut bad = sample_configuration();
        bad.active_mask_top = TapMask::from_indices(&[0]);
        assert!(broadcaster.apply(bad).is_err());
        assert!(!receiver.has_changed().unwrap());
        assert_eq!(*broadcaster.current(), sample_configuration());
    }

    #[test]
    fn flow_update_replaces_only_flow() {
        let broadcaster = ConfigurationBroadcaster::new(sample_configuration()).unwrap();
        let flow = FlowConditions {
            angle_of_attack_deg: 4.0,
            velocity: 25.0,
            width: 0.4,
        };
        broadcaster.update_flow(flow).unwrap();
        let current = broadcaster.current();
        assert_eq!(current.flow, flow);
        assert_eq!(current.tap_coordinates, sample_configuration().tap_coordinates);

        let rejected = FlowConditions {
            velocity: f64::INFINITY,
            ..flow
        };
        assert!(broadcaster.update_flow(rejected).is_err());
        assert_eq!(broadcaster.current().flow, flow);
    }
}
