//! Handles for driving running components and managers.
//!
//! Both hide the channel plumbing to their worker tasks: state is observed
//! through a watch channel and requests travel as commands with oneshot
//! replies.
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use super::errors::{Result, RuntimeError};
use crate::component::{ComponentCommand, ComponentState};
use crate::manager::{ManagerCommand, ManagerState, SimulationOutcome};

/// Handle to a running [`crate::SimulationComponent`].
pub struct ComponentHandle {
    name: String,
    command_tx: mpsc::Sender<ComponentCommand>,
    state_rx: watch::Receiver<ComponentState>,
    worker: JoinHandle<()>,
}

impl ComponentHandle {
    pub(crate) fn new(
        name: String,
        command_tx: mpsc::Sender<ComponentCommand>,
        state_rx: watch::Receiver<ComponentState>,
        worker: JoinHandle<()>,
    ) -> Self {
        Self {
            name,
            command_tx,
            state_rx,
            worker,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ComponentState {
        *self.state_rx.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ComponentState> {
        self.state_rx.clone()
    }

    /// Waits until the component reaches a state accepted by `predicate`.
    pub async fn wait_for_state<F>(&self, predicate: F) -> Result<ComponentState>
    where
        F: FnMut(&ComponentState) -> bool,
    {
        let mut state_rx = self.state_rx.clone();
        let state = state_rx
            .wait_for(predicate)
            .await
            .map_err(|_| RuntimeError::CommandChannelClosed("component"))?;
        Ok(*state)
    }

    /// Leaves the `Error` state and resumes after the last completed epoch.
    ///
    /// Returns `false` when the component was not in `Error`.
    pub async fn restart(&self) -> Result<bool> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(ComponentCommand::Restart { reply: reply_tx })
            .await
            .map_err(|_| RuntimeError::CommandChannelClosed("component"))?;

        reply_rx
            .await
            .map_err(|e| RuntimeError::ReplyChannelClosed("component", e))
    }

    /// Closes the component's bus client and moves it to `Stopped`.
    pub async fn stop(&self) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(ComponentCommand::Stop { reply: reply_tx })
            .await
            .map_err(|_| RuntimeError::CommandChannelClosed("component"))?;

        reply_rx
            .await
            .map_err(|e| RuntimeError::ReplyChannelClosed("component", e))
    }

    /// Waits for the worker task to finish.
    pub async fn wait(self) -> Result<()> {
        self.worker
            .await
            .map_err(|e| RuntimeError::WorkerJoin("component", e))
    }
}

/// Handle to a running [`crate::SimulationManager`].
pub struct ManagerHandle {
    command_tx: mpsc::Sender<ManagerCommand>,
    state_rx: watch::Receiver<ManagerState>,
    worker: JoinHandle<SimulationOutcome>,
}

impl ManagerHandle {
    pub(crate) fn new(
        command_tx: mpsc::Sender<ManagerCommand>,
        state_rx: watch::Receiver<ManagerState>,
        worker: JoinHandle<SimulationOutcome>,
    ) -> Self {
        Self {
            command_tx,
            state_rx,
            worker,
        }
    }

    pub fn state(&self) -> ManagerState {
        *self.state_rx.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ManagerState> {
        self.state_rx.clone()
    }

    /// Asks the manager to stop the simulation.
    pub async fn stop(&self) -> Result<()> {
        self.command_tx
            .send(ManagerCommand::Stop)
            .await
            .map_err(|_| RuntimeError::CommandChannelClosed("manager"))
    }

    /// Waits for the simulation to end.
    pub async fn wait(self) -> Result<SimulationOutcome> {
        self.worker
            .await
            .map_err(|e| RuntimeError::WorkerJoin("manager", e))
    }
}
