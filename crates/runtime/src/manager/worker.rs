//! Worker task coordinating epochs across all participants.
//!
//! Status messages from the bus and response deadlines from timers arrive on
//! one event channel, so the epoch state machine runs on a single task.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use sim_messages::{
    Message, MessageFactory, MessageGenerator, SimulationState, StatusMessage,
};

use super::config::ManagerConfig;
use super::registry::ParticipantRegistry;
use super::state::{ManagerState, SimulationOutcome};
use crate::api::{ManagerHandle, Result, RuntimeError};
use crate::bus::{Broker, BusClient, BusConfig};
use crate::timer::Timer;

pub(crate) enum ManagerCommand {
    Stop,
}

enum ManagerEvent {
    Status(StatusMessage),
    Deadline { epoch: u64, attempt: u32 },
}

/// Drives a simulation run: start handshake, epochs, resends and stop.
pub struct SimulationManager {
    config: ManagerConfig,
}

impl SimulationManager {
    pub fn new(config: ManagerConfig) -> Self {
        Self { config }
    }

    /// Connects to the bus, subscribes to status replies and starts the run
    /// on a worker task.
    pub async fn start(
        self,
        broker: &dyn Broker,
        bus_config: BusConfig,
        factory: Arc<MessageFactory>,
    ) -> Result<ManagerHandle> {
        let config = self.config;
        let client = BusClient::connect(broker, bus_config, factory).await?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let listener_tx = events_tx.clone();
        let subscribed = client
            .add_listener(
                [config.status_topic.clone(), config.error_topic.clone()],
                move |message, topic| {
                    match message {
                        Message::Status(status) => {
                            if listener_tx.send(ManagerEvent::Status(status)).is_err() {
                                debug!("manager worker gone, status dropped");
                            }
                        }
                        other => debug!(
                            %topic,
                            kind = ?other.message_type(),
                            "non-status message ignored"
                        ),
                    }
                    std::future::ready(())
                },
            )
            .await;
        if let Err(error) = subscribed {
            client.close().await;
            return Err(error);
        }

        let (state_tx, state_rx) = watch::channel(ManagerState::Idle);
        let worker = ManagerWorker {
            generator: MessageGenerator::new(
                config.simulation_id.clone(),
                config.manager_name.clone(),
            ),
            registry: ParticipantRegistry::new(config.components.iter().cloned()),
            config,
            client,
            state_tx,
            events_tx,
            timer: None,
            epoch: 0,
            attempt: 0,
            epoch_triggering_ids: Vec::new(),
        };

        let (command_tx, command_rx) = mpsc::channel(4);
        let join = tokio::spawn(worker.run(command_rx, events_rx));
        Ok(ManagerHandle::new(command_tx, state_rx, join))
    }
}

struct ManagerWorker {
    config: ManagerConfig,
    client: BusClient,
    generator: MessageGenerator,
    registry: ParticipantRegistry,
    state_tx: watch::Sender<ManagerState>,
    events_tx: mpsc::UnboundedSender<ManagerEvent>,
    timer: Option<Timer>,
    epoch: u64,
    attempt: u32,
    epoch_triggering_ids: Vec<String>,
}

impl ManagerWorker {
    async fn run(
        mut self,
        commands: mpsc::Receiver<ManagerCommand>,
        events: mpsc::UnboundedReceiver<ManagerEvent>,
    ) -> SimulationOutcome {
        let outcome = self.drive(commands, events).await;
        self.shut_down(&outcome).await;
        outcome
    }

    async fn drive(
        &mut self,
        mut commands: mpsc::Receiver<ManagerCommand>,
        mut events: mpsc::UnboundedReceiver<ManagerEvent>,
    ) -> SimulationOutcome {
        if self.registry.is_empty() {
            info!("no participating components, stopping the simulation");
            return SimulationOutcome::Completed { epochs: 0 };
        }

        info!(
            simulation_id = %self.config.simulation_id,
            participants = self.registry.len(),
            "starting simulation"
        );
        if let Err(error) = self.send_start() {
            return failed(format!("failed to start the simulation: {error}"));
        }
        self.set_state(ManagerState::Running { epoch: 0 });
        self.arm_deadline();

        loop {
            let step = tokio::select! {
                Some(ManagerCommand::Stop) = commands.recv() => {
                    info!("stop requested");
                    Some(failed("simulation stopped on request".to_owned()))
                }
                Some(event) = events.recv() => match event {
                    ManagerEvent::Status(status) => self.on_status(status).await,
                    ManagerEvent::Deadline { epoch, attempt } => self.on_deadline(epoch, attempt),
                },
                else => Some(failed("manager event channels closed".to_owned())),
            };
            if let Some(outcome) = step {
                return outcome;
            }
        }
    }

    fn set_state(&self, state: ManagerState) {
        let previous = self.state_tx.send_replace(state);
        debug!(from = %previous, to = %state, "manager state changed");
    }

    async fn on_status(&mut self, status: StatusMessage) -> Option<SimulationOutcome> {
        let envelope = status.envelope();
        if envelope.simulation_id() != self.config.simulation_id {
            debug!(
                simulation_id = envelope.simulation_id(),
                "status from another simulation ignored"
            );
            return None;
        }
        let source = envelope.source_process_id().to_owned();
        if source == self.config.manager_name {
            return None;
        }
        if !self.registry.register(&status) {
            debug!(%source, "status from an unknown participant ignored");
            return None;
        }

        let epoch = status.result().epoch_number();
        if !status.is_ready() {
            let description = status.description().unwrap_or("no description given");
            warn!(%source, epoch, %description, "participant reported an error");
            return Some(failed(format!(
                "{source} reported an error for epoch {epoch}: {description}"
            )));
        }

        if !self.registry.is_epoch_complete(self.epoch) {
            debug!(
                epoch = self.epoch,
                pending = ?self.registry.pending(self.epoch),
                "waiting for participants"
            );
            return None;
        }

        self.disarm_deadline().await;
        info!(epoch = self.epoch, "all participants ready");
        if self.epoch >= self.config.max_epochs {
            return Some(SimulationOutcome::Completed { epochs: self.epoch });
        }

        self.epoch += 1;
        self.attempt = 0;
        self.epoch_triggering_ids = self.registry.latest_status_ids();
        if let Err(error) = self.send_epoch() {
            return Some(failed(format!("failed to publish epoch {}: {error}", self.epoch)));
        }
        self.set_state(ManagerState::Running { epoch: self.epoch });
        self.arm_deadline();
        None
    }

    fn on_deadline(&mut self, epoch: u64, attempt: u32) -> Option<SimulationOutcome> {
        if epoch != self.epoch || attempt != self.attempt {
            debug!(epoch, attempt, "stale deadline ignored");
            return None;
        }

        let pending = self.registry.pending(epoch).join(", ");
        if self.attempt >= self.config.max_epoch_resends {
            error!(epoch, resends = self.attempt, %pending, "participants did not answer");
            return Some(failed(format!(
                "no answer for epoch {epoch} from [{pending}] after {} resends",
                self.attempt
            )));
        }

        self.attempt += 1;
        warn!(epoch, attempt = self.attempt, %pending, "response deadline passed, resending");
        let resent = if epoch == 0 {
            self.send_start()
        } else {
            self.send_epoch()
        };
        if let Err(error) = resent {
            return Some(failed(format!("failed to resend epoch {epoch}: {error}")));
        }
        self.arm_deadline();
        None
    }

    fn send_start(&mut self) -> Result<()> {
        let message = self.generator.simulation_state(
            SimulationState::Running,
            self.config.simulation_name.clone(),
            self.config.simulation_description.clone(),
        )?;
        self.client
            .publish(&self.config.simulation_state_topic, &message.into())
    }

    fn send_epoch(&mut self) -> Result<()> {
        let (start, end) = self
            .config
            .epoch_window(self.epoch)
            .ok_or(RuntimeError::EpochWindowOutOfRange(self.epoch))?;
        let message =
            self.generator
                .epoch(self.epoch, self.epoch_triggering_ids.clone(), start, end)?;
        debug!(epoch = self.epoch, %start, %end, "publishing epoch");
        self.client.publish(&self.config.epoch_topic, &message.into())
    }

    fn arm_deadline(&mut self) {
        let delay = self.config.deadline(self.attempt);
        let (epoch, attempt) = (self.epoch, self.attempt);
        let events = self.events_tx.clone();
        self.timer = Some(Timer::once(delay, move || {
            let events = events.clone();
            async move {
                if events.send(ManagerEvent::Deadline { epoch, attempt }).is_err() {
                    debug!("manager worker gone, deadline dropped");
                }
            }
        }));
    }

    async fn disarm_deadline(&mut self) {
        if let Some(mut timer) = self.timer.take() {
            timer.cancel().await;
        }
    }

    async fn shut_down(&mut self, outcome: &SimulationOutcome) {
        self.disarm_deadline().await;
        self.set_state(ManagerState::Stopping);

        let stopped = self
            .generator
            .simulation_state(SimulationState::Stopped, None, None)
            .map_err(Into::into)
            .and_then(|message| {
                self.client
                    .publish(&self.config.simulation_state_topic, &message.into())
            });
        if let Err(error) = stopped {
            error!(%error, "failed to publish simulation stop");
        }

        if tokio::time::timeout(self.config.stop_grace_period, self.client.close())
            .await
            .is_err()
        {
            warn!("message bus did not close within the stop grace period");
        }
        self.set_state(ManagerState::Stopped);
        info!(?outcome, "simulation finished");
    }
}

fn failed(reason: String) -> SimulationOutcome {
    SimulationOutcome::Failed { reason }
}
