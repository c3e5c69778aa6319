use std::time::Duration;

use sim_messages::Timestamp;

/// 2020-01-01T00:00:00Z
const DEFAULT_START_SECONDS: i64 = 1_577_836_800;

/// Settings of the simulation manager.
#[derive(Clone, Debug, PartialEq)]
pub struct ManagerConfig {
    pub simulation_id: String,
    pub manager_name: String,
    /// Process ids that must answer every epoch.
    pub components: Vec<String>,
    pub simulation_name: Option<String>,
    pub simulation_description: Option<String>,
    pub initial_start_time: Timestamp,
    pub epoch_length: Duration,
    pub max_epochs: u64,
    /// Base response deadline; attempt `k` waits `(k + 1)` times this long.
    pub epoch_timer_interval: Duration,
    pub max_epoch_resends: u32,
    /// Upper bound for flushing the final stop message and closing the bus.
    pub stop_grace_period: Duration,
    pub epoch_topic: String,
    pub simulation_state_topic: String,
    pub status_topic: String,
    pub error_topic: String,
}

impl ManagerConfig {
    pub fn new<I, S>(simulation_id: impl Into<String>, components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            simulation_id: simulation_id.into(),
            components: components.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Time window `[start, end)` of `epoch`, counting from 1.
    ///
    /// `None` when the window ends past what a timestamp can carry.
    pub fn epoch_window(&self, epoch: u64) -> Option<(Timestamp, Timestamp)> {
        let length = i64::try_from(self.epoch_length.as_secs()).ok()?;
        let offset = i64::try_from(epoch.saturating_sub(1)).ok()?;
        let start = self.initial_start_time.plus_seconds(offset.checked_mul(length)?)?;
        Some((start, start.plus_seconds(length)?))
    }

    /// Response deadline for resend attempt `attempt` (0 for the first send).
    pub fn deadline(&self, attempt: u32) -> Duration {
        self.epoch_timer_interval.saturating_mul(attempt.saturating_add(1))
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            simulation_id: "2020-01-01T00:00:00.000Z".to_owned(),
            manager_name: "manager".to_owned(),
            components: Vec::new(),
            simulation_name: None,
            simulation_description: None,
            initial_start_time: Timestamp::from_unix_seconds(DEFAULT_START_SECONDS)
                .unwrap_or_else(Timestamp::now),
            epoch_length: Duration::from_secs(3600),
            max_epochs: 5,
            epoch_timer_interval: Duration::from_secs(120),
            max_epoch_resends: 5,
            stop_grace_period: Duration::from_secs(5),
            epoch_topic: "Epoch".to_owned(),
            simulation_state_topic: "SimState".to_owned(),
            status_topic: "Status.Ready".to_owned(),
            error_topic: "Status.Error".to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_are_consecutive() {
        let config = ManagerConfig {
            epoch_length: Duration::from_secs(900),
            ..ManagerConfig::default()
        };
        let (start, end) = config.epoch_window(1).unwrap();
        assert_eq!(start.to_string(), "2020-01-01T00:00:00.000Z");
        assert_eq!(end.to_string(), "2020-01-01T00:15:00.000Z");
        assert_eq!(config.epoch_window(3).unwrap().0.to_string(), "2020-01-01T00:30:00.000Z");
    }

    #[test]
    fn windows_beyond_the_timestamp_range_are_refused() {
        let huge = ManagerConfig {
            epoch_length: Duration::from_secs(10_000_000_000_000),
            ..ManagerConfig::default()
        };
        assert_eq!(huge.epoch_window(2), None);

        let far = ManagerConfig {
            epoch_length: Duration::from_secs(300_000_000_000),
            ..ManagerConfig::default()
        };
        assert_eq!(far.epoch_window(1), None);
        assert_eq!(far.epoch_window(u64::MAX), None);
    }
}
