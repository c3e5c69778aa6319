//! Worker task that owns a component's bus client and epoch state.
//!
//! Listener callbacks only forward messages into the worker's inbound
//! channel, so every state transition happens on this one task.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use sim_messages::{
    EpochMessage, Message, MessageFactory, MessageGenerator, SimulationState,
    SimulationStateMessage,
};

use super::config::ComponentConfig;
use super::state::ComponentState;
use crate::api::{ComponentHandle, EpochContext, EpochProcessor, Result};
use crate::bus::{Broker, BusClient, BusConfig};

pub(crate) enum ComponentCommand {
    Restart { reply: oneshot::Sender<bool> },
    Stop { reply: oneshot::Sender<()> },
}

/// Ids of epoch messages already acted on, keyed to their epoch number.
///
/// Epochs older than the last completed one are rejected by number, so their
/// ids are dropped once a newer epoch completes.
#[derive(Debug, Default)]
struct HandledEpochs {
    ids: HashMap<String, u64>,
}

impl HandledEpochs {
    /// False when `message_id` was seen before.
    fn insert(&mut self, message_id: &str, epoch: u64) -> bool {
        if self.ids.contains_key(message_id) {
            return false;
        }
        self.ids.insert(message_id.to_owned(), epoch);
        true
    }

    fn forget_before(&mut self, epoch: u64) {
        self.ids.retain(|_, number| *number >= epoch);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.ids.len()
    }
}

struct Inbound {
    message: Message,
    topic: String,
}

/// A process taking part in a simulation, driven by epoch messages.
pub struct SimulationComponent<P> {
    config: ComponentConfig,
    processor: P,
}

impl<P: EpochProcessor> SimulationComponent<P> {
    pub fn new(config: ComponentConfig, processor: P) -> Self {
        Self { config, processor }
    }

    /// Connects to the bus, subscribes to the control topics, announces
    /// readiness for epoch 0 and hands the component to its worker task.
    pub async fn start(
        self,
        broker: &dyn Broker,
        bus_config: BusConfig,
        factory: Arc<MessageFactory>,
    ) -> Result<ComponentHandle> {
        let Self { config, processor } = self;
        let client = BusClient::connect(broker, bus_config, factory).await?;
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let mut topics = vec![config.epoch_topic.clone(), config.simulation_state_topic.clone()];
        topics.extend(config.other_topics.iter().cloned());
        let subscribed = client
            .add_listener(topics, move |message, topic| {
                if inbound_tx.send(Inbound { message, topic }).is_err() {
                    debug!("component worker gone, message dropped");
                }
                std::future::ready(())
            })
            .await;
        if let Err(error) = subscribed {
            client.close().await;
            return Err(error);
        }

        let (state_tx, state_rx) = watch::channel(ComponentState::Created);
        let mut worker = ComponentWorker {
            generator: MessageGenerator::new(
                config.simulation_id.clone(),
                config.component_name.clone(),
            ),
            config,
            processor,
            client,
            state_tx,
            completed_epoch: 0,
            handled_epochs: HandledEpochs::default(),
        };

        if let Err(error) = worker.send_ready(0, Vec::new()) {
            worker.client.close().await;
            return Err(error);
        }
        worker.set_state(ComponentState::AwaitingStart);
        info!(component = %worker.config.component_name, "component started");

        let name = worker.config.component_name.clone();
        let (command_tx, command_rx) = mpsc::channel(8);
        let join = tokio::spawn(worker.run(command_rx, inbound_rx));
        Ok(ComponentHandle::new(name, command_tx, state_rx, join))
    }
}

struct ComponentWorker<P> {
    config: ComponentConfig,
    processor: P,
    client: BusClient,
    generator: MessageGenerator,
    state_tx: watch::Sender<ComponentState>,
    completed_epoch: u64,
    handled_epochs: HandledEpochs,
}

impl<P: EpochProcessor> ComponentWorker<P> {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<ComponentCommand>,
        mut inbound: mpsc::UnboundedReceiver<Inbound>,
    ) {
        loop {
            tokio::select! {
                Some(command) = commands.recv() => self.handle_command(command).await,
                Some(delivery) = inbound.recv() => self.handle_inbound(delivery).await,
                else => break,
            }
            if self.state().is_stopped() {
                break;
            }
        }
        self.stop().await;
    }

    fn state(&self) -> ComponentState {
        *self.state_tx.borrow()
    }

    fn set_state(&self, state: ComponentState) {
        let previous = self.state_tx.send_replace(state);
        debug!(
            component = %self.config.component_name,
            from = %previous,
            to = %state,
            "component state changed"
        );
    }

    async fn handle_command(&mut self, command: ComponentCommand) {
        match command {
            ComponentCommand::Restart { reply } => {
                let restarted = self.restart();
                if reply.send(restarted).is_err() {
                    debug!("Restart reply channel closed (caller dropped)");
                }
            }
            ComponentCommand::Stop { reply } => {
                self.stop().await;
                if reply.send(()).is_err() {
                    debug!("Stop reply channel closed (caller dropped)");
                }
            }
        }
    }

    async fn handle_inbound(&mut self, Inbound { message, topic }: Inbound) {
        match message.simulation_id() {
            Some(id) if id == self.config.simulation_id => {}
            Some(other) => {
                debug!(simulation_id = other, %topic, "message from another simulation ignored");
                return;
            }
            None if self.is_control_topic(&topic) => {
                warn!(%topic, "invalid message on a control topic ignored");
                return;
            }
            None => {}
        }

        match message {
            Message::Epoch(epoch) => self.on_epoch(epoch).await,
            Message::SimulationState(state) => self.on_simulation_state(state).await,
            other => self.on_other(other, &topic).await,
        }
    }

    fn is_control_topic(&self, topic: &str) -> bool {
        topic == self.config.epoch_topic || topic == self.config.simulation_state_topic
    }

    async fn on_simulation_state(&mut self, message: SimulationStateMessage) {
        match message.simulation_state() {
            SimulationState::Running if self.state() == ComponentState::AwaitingStart => {
                debug!("simulation running, repeating readiness for epoch 0");
                if let Err(error) = self.send_ready(0, Vec::new()) {
                    error!(%error, "failed to publish ready status");
                }
            }
            SimulationState::Running => {}
            SimulationState::Stopped => {
                info!(component = %self.config.component_name, "simulation stopped");
                self.stop().await;
            }
        }
    }

    async fn on_epoch(&mut self, epoch: EpochMessage) {
        let state = self.state();
        if !state.accepts_epochs() {
            debug!(%state, epoch = epoch.epoch_number(), "epoch ignored");
            return;
        }

        let message_id = epoch.envelope().message_id().to_owned();
        let number = epoch.epoch_number();
        if !self.handled_epochs.insert(&message_id, number) {
            debug!(%message_id, "epoch message already handled");
            return;
        }

        if number == 0 {
            return;
        }
        if number <= self.completed_epoch {
            if number == self.completed_epoch {
                info!(epoch = number, "epoch resent, repeating status");
                if let Err(error) = self.send_ready(number, vec![message_id]) {
                    error!(%error, "failed to publish ready status");
                }
            } else {
                debug!(epoch = number, completed = self.completed_epoch, "old epoch ignored");
            }
            return;
        }
        if number > self.completed_epoch + 1 {
            warn!(
                expected = self.completed_epoch + 1,
                received = number,
                "epoch numbers skipped"
            );
        }

        self.set_state(ComponentState::Processing { epoch: number });
        let outcome = {
            let mut ctx =
                EpochContext::new(number, Some(&epoch), &mut self.generator, &self.client);
            self.processor.process_epoch(&mut ctx).await
        };

        let failure = match outcome {
            Ok(true) => None,
            Ok(false) => Some("epoch processing reported failure".to_owned()),
            Err(cause) => Some(format!("{cause:#}")),
        };
        match failure {
            None => {
                self.completed_epoch = number;
                self.handled_epochs.forget_before(number);
                if let Err(error) = self.send_ready(number, vec![message_id]) {
                    error!(%error, "failed to publish ready status");
                }
                self.set_state(ComponentState::Ready { epoch: number });
            }
            Some(description) => {
                error!(epoch = number, %description, "epoch processing failed");
                if let Err(error) = self.send_error(number, vec![message_id], description) {
                    error!(%error, "failed to publish error status");
                }
                self.set_state(ComponentState::Error { epoch: number });
            }
        }
    }

    async fn on_other(&mut self, message: Message, topic: &str) {
        let mut ctx =
            EpochContext::new(self.completed_epoch, None, &mut self.generator, &self.client);
        if let Err(error) = self.processor.handle_message(message, topic, &mut ctx).await {
            let detail = format!("{error:#}");
            warn!(%topic, error = %detail, "message handler failed");
        }
    }

    fn send_ready(&mut self, epoch: u64, triggering: Vec<String>) -> Result<()> {
        let status = self.generator.status_ready(epoch, triggering)?;
        self.client.publish(&self.config.status_topic, &status.into())
    }

    fn send_error(
        &mut self,
        epoch: u64,
        triggering: Vec<String>,
        description: String,
    ) -> Result<()> {
        let status = self.generator.status_error(epoch, triggering, description)?;
        self.client.publish(&self.config.error_topic, &status.into())
    }

    fn restart(&mut self) -> bool {
        let ComponentState::Error { epoch } = self.state() else {
            return false;
        };
        info!(failed_epoch = epoch, resume_after = self.completed_epoch, "component restarted");
        self.set_state(ComponentState::Ready {
            epoch: self.completed_epoch,
        });
        true
    }

    async fn stop(&mut self) {
        self.client.close().await;
        if !self.state().is_stopped() {
            self.set_state(ComponentState::Stopped);
        }
    }
}
