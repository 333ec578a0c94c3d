//! Fire policies: when an asserted reading turns into a fire request.

use crate::config::{ActivationPolicyKind, Config};
use std::time::Duration;
use tokio::time::Instant;

/// Decides, per poll, whether the monitor fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FirePolicy {
    /// Fire on every asserted poll. The coordinator's guard is the only gate.
    Edge,
    /// Fire on an asserted poll only if more than `cooldown` has passed
    /// since the last fire.
    Threshold {
        cooldown: Duration,
        last_fire: Option<Instant>,
    },
}

impl FirePolicy {
    #[must_use]
    pub fn threshold(cooldown: Duration) -> Self {
        Self::Threshold {
            cooldown,
            last_fire: None,
        }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        match config.activation_policy {
            ActivationPolicyKind::Edge => Self::Edge,
            ActivationPolicyKind::Threshold => Self::threshold(config.activation_cooldown),
        }
    }

    /// Evaluate one poll. Records the fire time when returning `true`.
    pub fn should_fire(&mut self, asserted: bool, now: Instant) -> bool {
        if !asserted {
            return false;
        }

        match self {
            Self::Edge => true,
            Self::Threshold {
                cooldown,
                last_fire,
            } => {
                let cooled_down = match *last_fire {
                    None => true,
                    Some(last) => now.saturating_duration_since(last) > *cooldown,
                };
                if cooled_down {
                    *last_fire = Some(now);
                }
                cooled_down
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_fires_on_every_asserted_poll() {
        let mut policy = FirePolicy::Edge;
        let now = Instant::now();

        assert!(policy.should_fire(true, now));
        assert!(policy.should_fire(true, now));
        assert!(!policy.should_fire(false, now));
    }

    #[test]
    fn test_threshold_first_assertion_fires() {
        let mut policy = FirePolicy::threshold(Duration::from_secs(5));
        assert!(policy.should_fire(true, Instant::now()));
    }

    #[test]
    fn test_threshold_respects_cooldown_strictly() {
        let mut policy = FirePolicy::threshold(Duration::from_secs(5));
        let start = Instant::now();

        assert!(policy.should_fire(true, start));
        assert!(!policy.should_fire(true, start + Duration::from_secs(1)));
        assert!(!policy.should_fire(true, start + Duration::from_secs(5)));
        assert!(policy.should_fire(true, start + Duration::from_millis(5001)));
        // Cooldown restarts from the latest fire
        assert!(!policy.should_fire(true, start + Duration::from_secs(6)));
    }

    #[test]
    fn test_threshold_ignores_unasserted_polls() {
        let mut policy = FirePolicy::threshold(Duration::from_secs(5));
        let start = Instant::now();

        assert!(!policy.should_fire(false, start));
        assert!(policy.should_fire(true, start + Duration::from_secs(1)));
    }
}
