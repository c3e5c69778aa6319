//! Stand-in component workload used by the `simulation` binary.
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::Map;
use sim_messages::{QuantityBlock, ResultFields};
use sim_runtime::{EpochContext, EpochProcessor};
use tracing::debug;

pub const RESULT_MESSAGE_TYPE: &str = "DemoResult";

/// Sleeps a random time per epoch and publishes how long it took.
pub struct DemoProcessor {
    result_topic: String,
    max_delay: Duration,
    rng: StdRng,
}

impl DemoProcessor {
    pub fn new(component_name: &str, max_delay: Duration) -> Self {
        Self {
            result_topic: format!("Result.{component_name}"),
            max_delay,
            rng: StdRng::from_entropy(),
        }
    }
}

#[async_trait]
impl EpochProcessor for DemoProcessor {
    async fn process_epoch(&mut self, ctx: &mut EpochContext<'_>) -> Result<bool> {
        let max_millis = whole_millis(self.max_delay);
        let delay = Duration::from_millis(self.rng.gen_range(0..=max_millis));
        tokio::time::sleep(delay).await;

        let epoch = ctx.epoch_number();
        let result = ResultFields::new(epoch, ctx.triggering_message_ids())?;
        let mut attributes = Map::new();
        attributes.insert(
            "ProcessingTime".to_owned(),
            QuantityBlock::new(delay.as_secs_f64(), "s").to_json(),
        );
        let message = ctx
            .generator()
            .general(RESULT_MESSAGE_TYPE, Some(result), attributes)?;
        ctx.publish(&self.result_topic, message)?;

        debug!(epoch, delay_ms = whole_millis(delay), "demo epoch done");
        Ok(true)
    }
}

/// Milliseconds in `duration`, saturating at `u64::MAX`.
fn whole_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
