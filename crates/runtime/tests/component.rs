use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, json};
use sim_messages::{
    Message, MessageFactory, MessageGenerator, ResultFields, SimulationState, StatusMessage,
    Timestamp,
};
use sim_runtime::{
    BusClient, BusConfig, ComponentConfig, ComponentHandle, ComponentState, EpochContext,
    EpochProcessor, MemoryBroker, SimulationComponent,
};
use tokio::sync::mpsc;
use tokio::time::timeout;

const SIMULATION: &str = "2020-06-01T00:00:00.000Z";

/// Records every call and fails the configured epoch.
#[derive(Clone, Default)]
struct Recorder {
    epochs: Arc<Mutex<Vec<u64>>>,
    others: Arc<Mutex<Vec<String>>>,
    fail_on: Option<u64>,
}

impl Recorder {
    fn epochs(&self) -> Vec<u64> {
        self.epochs.lock().unwrap().clone()
    }
}

#[async_trait]
impl EpochProcessor for Recorder {
    async fn process_epoch(&mut self, ctx: &mut EpochContext<'_>) -> anyhow::Result<bool> {
        let epoch = ctx.epoch_number();
        self.epochs.lock().unwrap().push(epoch);
        if self.fail_on == Some(epoch) {
            anyhow::bail!("grid diverged at epoch {epoch}");
        }

        let result = ResultFields::new(epoch, ctx.triggering_message_ids())?;
        let mut attributes = Map::new();
        attributes.insert("PowerKw".into(), json!(epoch as f64 * 1.5));
        let message = ctx.generator().general("Result", Some(result), attributes)?;
        ctx.publish("Result.Grid", message)?;
        Ok(true)
    }

    async fn handle_message(
        &mut self,
        _message: Message,
        topic: &str,
        _ctx: &mut EpochContext<'_>,
    ) -> anyhow::Result<()> {
        self.others.lock().unwrap().push(topic.to_owned());
        Ok(())
    }
}

/// Plays the manager's part by hand.
struct Driver {
    client: BusClient,
    generator: MessageGenerator,
    statuses: mpsc::UnboundedReceiver<StatusMessage>,
    results: mpsc::UnboundedReceiver<Message>,
}

impl Driver {
    async fn connect(broker: &MemoryBroker) -> Self {
        let factory = MessageFactory::default();
        factory.register_general("Result");
        let client = BusClient::connect(broker, BusConfig::default(), Arc::new(factory))
            .await
            .unwrap();

        let (status_tx, statuses) = mpsc::unbounded_channel();
        client
            .add_listener(["Status.#"], move |message, _| {
                if let Message::Status(status) = message {
                    let _ = status_tx.send(status);
                }
                std::future::ready(())
            })
            .await
            .unwrap();
        let (result_tx, results) = mpsc::unbounded_channel();
        client
            .add_listener(["Result.#"], move |message, _| {
                let _ = result_tx.send(message);
                std::future::ready(())
            })
            .await
            .unwrap();

        Self {
            client,
            generator: MessageGenerator::new(SIMULATION, "manager"),
            statuses,
            results,
        }
    }

    fn epoch(&mut self, number: u64) -> Message {
        let start = Timestamp::parse("2020-06-01T00:00:00Z").unwrap();
        let start = start.plus_seconds(3600 * (number as i64 - 1)).unwrap();
        let end = start.plus_seconds(3600).unwrap();
        self.generator
            .epoch(number, vec!["grid-1".into()], start, end)
            .unwrap()
            .into()
    }

    fn send(&self, topic: &str, message: &Message) {
        self.client.publish(topic, message).unwrap();
    }

    async fn status(&mut self) -> StatusMessage {
        timeout(Duration::from_secs(1), self.statuses.recv())
            .await
            .expect("status within a second")
            .expect("status channel open")
    }

    async fn result(&mut self) -> Message {
        timeout(Duration::from_secs(1), self.results.recv())
            .await
            .expect("result within a second")
            .expect("result channel open")
    }
}

async fn start(
    broker: &MemoryBroker,
    processor: Recorder,
    config: ComponentConfig,
) -> ComponentHandle {
    SimulationComponent::new(config, processor)
        .start(broker, BusConfig::default(), Arc::new(MessageFactory::default()))
        .await
        .expect("component starts")
}

#[tokio::test]
async fn component_announces_readiness_and_processes_epochs() {
    let broker = MemoryBroker::new();
    let mut driver = Driver::connect(&broker).await;
    let recorder = Recorder::default();
    let handle = start(&broker, recorder.clone(), ComponentConfig::new(SIMULATION, "grid")).await;

    let ready = driver.status().await;
    assert!(ready.is_ready());
    assert_eq!(ready.result().epoch_number(), 0);
    assert!(ready.result().triggering_message_ids().is_empty());
    assert_eq!(handle.state(), ComponentState::AwaitingStart);

    let epoch = driver.epoch(1);
    driver.send("Epoch", &epoch);

    let result = driver.result().await;
    let Message::General(result) = result else {
        panic!("expected a result message, got {result:?}");
    };
    assert_eq!(
        result.result().map(|fields| fields.triggering_message_ids().to_vec()),
        Some(vec![epoch.message_id().unwrap().to_owned()])
    );

    let status = driver.status().await;
    assert!(status.is_ready());
    assert_eq!(status.result().epoch_number(), 1);
    assert_eq!(
        status.result().triggering_message_ids(),
        [epoch.message_id().unwrap().to_owned()]
    );

    let state = handle
        .wait_for_state(|state| *state == ComponentState::Ready { epoch: 1 })
        .await
        .unwrap();
    assert_eq!(state, ComponentState::Ready { epoch: 1 });
    assert_eq!(recorder.epochs(), [1]);

    handle.stop().await.unwrap();
    handle.wait().await.unwrap();
}

#[tokio::test]
async fn duplicate_epoch_messages_are_processed_once() {
    let broker = MemoryBroker::new();
    let mut driver = Driver::connect(&broker).await;
    let recorder = Recorder::default();
    let handle = start(&broker, recorder.clone(), ComponentConfig::new(SIMULATION, "grid")).await;
    driver.status().await;

    let epoch = driver.epoch(1);
    driver.send("Epoch", &epoch);
    driver.send("Epoch", &epoch);
    let second = driver.epoch(2);
    driver.send("Epoch", &second);

    assert_eq!(driver.status().await.result().epoch_number(), 1);
    // No second answer for the repeated message id.
    assert_eq!(driver.status().await.result().epoch_number(), 2);
    assert_eq!(recorder.epochs(), [1, 2]);

    handle.stop().await.unwrap();
}

#[tokio::test]
async fn resent_epoch_repeats_the_status_without_reprocessing() {
    let broker = MemoryBroker::new();
    let mut driver = Driver::connect(&broker).await;
    let recorder = Recorder::default();
    let handle = start(&broker, recorder.clone(), ComponentConfig::new(SIMULATION, "grid")).await;
    driver.status().await;

    let first = driver.epoch(1);
    driver.send("Epoch", &first);
    driver.status().await;

    // Same epoch under a fresh message id, as a resend would carry.
    let resent = driver.epoch(1);
    driver.send("Epoch", &resent);
    let status = driver.status().await;
    assert_eq!(status.result().epoch_number(), 1);
    assert_eq!(
        status.result().triggering_message_ids(),
        [resent.message_id().unwrap().to_owned()]
    );
    assert_eq!(recorder.epochs(), [1]);

    handle.stop().await.unwrap();
}

#[tokio::test]
async fn failed_epoch_reports_error_until_restart() {
    let broker = MemoryBroker::new();
    let mut driver = Driver::connect(&broker).await;
    let recorder = Recorder {
        fail_on: Some(2),
        ..Recorder::default()
    };
    let handle = start(&broker, recorder.clone(), ComponentConfig::new(SIMULATION, "grid")).await;
    driver.status().await;

    let first = driver.epoch(1);
    driver.send("Epoch", &first);
    driver.status().await;

    let second = driver.epoch(2);
    driver.send("Epoch", &second);
    let error = driver.status().await;
    assert!(!error.is_ready());
    assert_eq!(error.result().epoch_number(), 2);
    assert!(error.description().unwrap().contains("grid diverged at epoch 2"));
    handle
        .wait_for_state(|state| *state == ComponentState::Error { epoch: 2 })
        .await
        .unwrap();

    // Epochs are not answered while in error.
    let third = driver.epoch(3);
    driver.send("Epoch", &third);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(recorder.epochs(), [1, 2]);

    assert!(handle.restart().await.unwrap());
    assert_eq!(handle.state(), ComponentState::Ready { epoch: 1 });
    assert!(!handle.restart().await.unwrap());

    let retry = driver.epoch(2);
    driver.send("Epoch", &retry);
    let error = driver.status().await;
    assert_eq!(error.result().epoch_number(), 2);
    assert!(!error.is_ready());

    handle.stop().await.unwrap();
}

#[tokio::test]
async fn messages_from_other_simulations_are_ignored() {
    let broker = MemoryBroker::new();
    let mut driver = Driver::connect(&broker).await;
    let recorder = Recorder::default();
    let handle = start(&broker, recorder.clone(), ComponentConfig::new(SIMULATION, "grid")).await;
    driver.status().await;

    let foreign: Message = MessageGenerator::new("another-simulation", "manager")
        .epoch(
            1,
            vec!["x-1".into()],
            Timestamp::parse("2020-06-01T00:00:00Z").unwrap(),
            Timestamp::parse("2020-06-01T01:00:00Z").unwrap(),
        )
        .unwrap()
        .into();
    driver.send("Epoch", &foreign);
    let epoch = driver.epoch(1);
    driver.send("Epoch", &epoch);

    assert_eq!(driver.status().await.result().epoch_number(), 1);
    assert_eq!(recorder.epochs(), [1]);
    handle.stop().await.unwrap();
}

#[tokio::test]
async fn start_announcement_is_answered_and_stop_ends_the_component() {
    let broker = MemoryBroker::new();
    let mut driver = Driver::connect(&broker).await;
    let config = ComponentConfig::new(SIMULATION, "grid");
    let handle = start(&broker, Recorder::default(), config).await;
    assert_eq!(driver.status().await.result().epoch_number(), 0);

    let running: Message = driver
        .generator
        .simulation_state(SimulationState::Running, Some("Test run".into()), None)
        .unwrap()
        .into();
    driver.send("SimState", &running);
    let repeated = driver.status().await;
    assert!(repeated.is_ready());
    assert_eq!(repeated.result().epoch_number(), 0);

    let stopped: Message = driver
        .generator
        .simulation_state(SimulationState::Stopped, None, None)
        .unwrap()
        .into();
    driver.send("SimState", &stopped);
    let state = handle.wait_for_state(ComponentState::is_stopped).await.unwrap();
    assert_eq!(state, ComponentState::Stopped);
    handle.wait().await.unwrap();
}

#[tokio::test]
async fn other_topics_reach_the_message_handler() {
    let broker = MemoryBroker::new();
    let mut driver = Driver::connect(&broker).await;
    let recorder = Recorder::default();
    let config = ComponentConfig::new(SIMULATION, "storage").with_other_topics(["Forecast.#"]);
    let handle = start(&broker, recorder.clone(), config).await;
    driver.status().await;

    let forecast: Message = driver
        .generator
        .status_ready(0, Vec::new())
        .unwrap()
        .into();
    driver.send("Forecast.Weather", &forecast);
    let epoch = driver.epoch(1);
    driver.send("Epoch", &epoch);
    driver.status().await;

    assert_eq!(*recorder.others.lock().unwrap(), ["Forecast.Weather"]);
    handle.stop().await.unwrap();
}
