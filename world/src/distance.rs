//! Robot-to-wanderer distance tracking and the reward derived from it.

use arena_level_core::{LevelConfig, FAR_DISTANCE};

/// Current and previous minimum distance between robot and nearest wanderer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DistanceRecord {
    current: f32,
    previous: f32,
}

impl DistanceRecord {
    /// Record holding the far sentinel in both slots.
    #[must_use]
    pub const fn far() -> Self {
        Self {
            current: FAR_DISTANCE,
            previous: FAR_DISTANCE,
        }
    }

    /// Distance measured by the most recent update.
    #[must_use]
    pub const fn current(&self) -> f32 {
        self.current
    }

    /// Distance measured by the update before the most recent one.
    #[must_use]
    pub const fn previous(&self) -> f32 {
        self.previous
    }

    pub(crate) fn advance(&mut self, measured: f32) {
        self.previous = self.current;
        self.current = measured;
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::far();
    }
}

impl Default for DistanceRecord {
    fn default() -> Self {
        Self::far()
    }
}

/// Reward for the completed step.
///
/// Distance terms only apply while the closest wanderer is inside the safety
/// distance and a previous measurement exists; an unchanged distance earns
/// nothing.
pub(crate) fn step_reward(
    record: &DistanceRecord,
    human_contact: bool,
    config: &LevelConfig,
) -> f32 {
    let mut reward = 0.0;

    if record.previous.is_finite() && record.current < config.safety_distance {
        if record.current < record.previous {
            reward += config.reward_distance_decreased;
        } else if record.current > record.previous {
            reward += config.reward_distance_increased;
        }
    }

    if human_contact {
        reward += config.reward_human_contact;
    }

    reward
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(previous: f32, current: f32) -> DistanceRecord {
        let mut record = DistanceRecord::far();
        record.advance(previous);
        record.advance(current);
        record
    }

    #[test]
    fn approaching_inside_safety_distance_is_penalised() {
        let config = LevelConfig::default();
        let reward = step_reward(&record(1.0, 0.8), false, &config);
        assert_eq!(reward, config.reward_distance_decreased);
    }

    #[test]
    fn retreating_inside_safety_distance_is_rewarded() {
        let config = LevelConfig::default();
        let reward = step_reward(&record(0.5, 0.9), false, &config);
        assert_eq!(reward, config.reward_distance_increased);
    }

    #[test]
    fn distant_or_static_wanderers_earn_nothing() {
        let config = LevelConfig::default();
        assert_eq!(step_reward(&record(5.0, 4.0), false, &config), 0.0);
        assert_eq!(step_reward(&record(0.7, 0.7), false, &config), 0.0);
        assert_eq!(step_reward(&DistanceRecord::far(), false, &config), 0.0);
    }

    #[test]
    fn first_measurement_after_reset_earns_no_distance_term() {
        let config = LevelConfig::default();
        let mut first = DistanceRecord::far();
        first.advance(0.5);

        assert_eq!(step_reward(&first, false, &config), 0.0);
        assert_eq!(
            step_reward(&first, true, &config),
            config.reward_human_contact
        );
    }

    #[test]
    fn contact_adds_penalty_on_top_of_distance_terms() {
        let config = LevelConfig::default();
        let reward = step_reward(&record(0.4, 0.1), true, &config);
        assert_eq!(
            reward,
            config.reward_distance_decreased + config.reward_human_contact
        );
    }
}
