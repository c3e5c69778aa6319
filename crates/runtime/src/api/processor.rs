//! Hook through which a component does its epoch work.

use async_trait::async_trait;

use sim_messages::{EpochMessage, Message, MessageGenerator};

use super::errors::Result;
use crate::bus::BusClient;

/// Component-specific behaviour driven by the component lifecycle.
///
/// `process_epoch` is called once per epoch. Returning `Ok(false)` or an
/// error marks the epoch as failed: the component publishes an error status
/// and stops answering epochs until it is restarted.
#[async_trait]
pub trait EpochProcessor: Send + 'static {
    async fn process_epoch(&mut self, ctx: &mut EpochContext<'_>) -> anyhow::Result<bool>;

    /// Called for messages on the component's additional topics.
    async fn handle_message(
        &mut self,
        _message: Message,
        _topic: &str,
        _ctx: &mut EpochContext<'_>,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

/// What a processor can see and do while handling an epoch or a message.
pub struct EpochContext<'a> {
    epoch_number: u64,
    epoch_message: Option<&'a EpochMessage>,
    generator: &'a mut MessageGenerator,
    bus: &'a BusClient,
}

impl<'a> EpochContext<'a> {
    pub(crate) fn new(
        epoch_number: u64,
        epoch_message: Option<&'a EpochMessage>,
        generator: &'a mut MessageGenerator,
        bus: &'a BusClient,
    ) -> Self {
        Self {
            epoch_number,
            epoch_message,
            generator,
            bus,
        }
    }

    /// The epoch being processed, or the last completed one outside
    /// `process_epoch`.
    pub fn epoch_number(&self) -> u64 {
        self.epoch_number
    }

    pub fn epoch_message(&self) -> Option<&EpochMessage> {
        self.epoch_message
    }

    /// Ids to put in `TriggeringMessageIds` of results for this epoch.
    pub fn triggering_message_ids(&self) -> Vec<String> {
        self.epoch_message
            .map(|epoch| vec![epoch.envelope().message_id().to_owned()])
            .unwrap_or_default()
    }

    pub fn generator(&mut self) -> &mut MessageGenerator {
        &mut *self.generator
    }

    pub fn publish(&self, topic: &str, message: impl Into<Message>) -> Result<()> {
        self.bus.publish(topic, &message.into())
    }
}
