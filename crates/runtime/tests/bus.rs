use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde_json::json;
use sim_messages::{InvalidMessage, Message, MessageFactory, MessageGenerator};
use sim_runtime::{BrokerError, BusClient, BusConfig, MemoryBroker, RuntimeError};
use tokio::sync::mpsc;
use tokio::time::timeout;

type Received = mpsc::UnboundedReceiver<(String, Message)>;

async fn connect(broker: &MemoryBroker) -> BusClient {
    BusClient::connect(broker, BusConfig::default(), Arc::new(MessageFactory::default()))
        .await
        .expect("memory broker accepts the default config")
}

async fn listen(client: &BusClient, patterns: &[&str]) -> Received {
    let (tx, rx) = mpsc::unbounded_channel();
    client
        .add_listener(patterns.iter().copied(), move |message, topic| {
            let _ = tx.send((topic, message));
            std::future::ready(())
        })
        .await
        .expect("listener should register");
    rx
}

async fn next(rx: &mut Received) -> (String, Message) {
    timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("delivery within a second")
        .expect("listener channel open")
}

fn status(generator: &mut MessageGenerator) -> Message {
    generator
        .status_ready(0, Vec::new())
        .expect("valid status")
        .into()
}

#[tokio::test]
async fn wildcards_select_topics() {
    let broker = MemoryBroker::new();
    let client = connect(&broker).await;
    let mut one_level = listen(&client, &["TopicA.*"]).await;
    let mut any_level = listen(&client, &["TopicA.#"]).await;
    let mut everything = listen(&client, &["#"]).await;

    let mut generator = MessageGenerator::new("sim", "publisher");
    for topic in ["TopicA.Error.Special", "TopicA.Error", "TopicB"] {
        client
            .publish(topic, &status(&mut generator))
            .expect("publish on an open client");
    }

    // "*" matches exactly one segment, so the deeper topic is skipped.
    assert_eq!(next(&mut one_level).await.0, "TopicA.Error");

    assert_eq!(next(&mut any_level).await.0, "TopicA.Error.Special");
    assert_eq!(next(&mut any_level).await.0, "TopicA.Error");

    let mut topics = Vec::new();
    for _ in 0..3 {
        topics.push(next(&mut everything).await.0);
    }
    assert_eq!(topics, ["TopicA.Error.Special", "TopicA.Error", "TopicB"]);

    client.close().await;
}

#[tokio::test]
async fn one_listener_sees_messages_in_publish_order() {
    let broker = MemoryBroker::new();
    let client = connect(&broker).await;
    let mut received = listen(&client, &["Results.#"]).await;

    let mut generator = MessageGenerator::new("sim", "ordered");
    for _ in 0..20 {
        client
            .publish("Results.Grid", &status(&mut generator))
            .expect("publish");
    }

    for n in 1..=20 {
        let (_, message) = next(&mut received).await;
        assert_eq!(message.message_id(), Some(format!("ordered-{n}").as_str()));
    }
    client.close().await;
}

#[tokio::test]
async fn slow_listener_does_not_hold_up_the_others() {
    let broker = MemoryBroker::new();
    let client = connect(&broker).await;

    let (started_tx, mut started) = mpsc::unbounded_channel();
    let finished = Arc::new(AtomicBool::new(false));
    let slow_finished = Arc::clone(&finished);
    client
        .add_listener(["Load"], move |_, _| {
            let started_tx = started_tx.clone();
            let finished = Arc::clone(&slow_finished);
            async move {
                let _ = started_tx.send(());
                tokio::time::sleep(Duration::from_millis(300)).await;
                finished.store(true, Ordering::SeqCst);
            }
        })
        .await
        .unwrap();
    let mut fast = listen(&client, &["Load"]).await;

    let mut generator = MessageGenerator::new("sim", "publisher");
    client.publish("Load", &status(&mut generator)).unwrap();

    assert_eq!(next(&mut fast).await.0, "Load");
    timeout(Duration::from_secs(1), started.recv())
        .await
        .expect("slow listener called")
        .expect("slow listener channel open");
    assert!(!finished.load(Ordering::SeqCst));

    // close() lets the dispatch in progress finish before returning.
    client.close().await;
    assert!(finished.load(Ordering::SeqCst));
}

#[tokio::test]
async fn payloads_are_classified() {
    let broker = MemoryBroker::new();
    let client = connect(&broker).await;
    let mut received = listen(&client, &["Raw"]).await;

    let mut generator = MessageGenerator::new("sim", "grid");
    client
        .publish("Raw", &status(&mut generator))
        .expect("publish");
    client
        .send_message("Raw", br#"{"Type": "Status", "Value": "ready"}"#.to_vec())
        .expect("send");
    client
        .send_message("Raw", b"not json at all".to_vec())
        .expect("send");

    let (_, typed) = next(&mut received).await;
    assert!(matches!(typed, Message::Status(_)));

    let (_, incomplete) = next(&mut received).await;
    assert_eq!(
        incomplete,
        Message::Invalid(InvalidMessage::Json(json!({"Type": "Status", "Value": "ready"})))
    );

    let (_, text) = next(&mut received).await;
    assert_eq!(
        text,
        Message::Invalid(InvalidMessage::Text("not json at all".to_owned()))
    );
    client.close().await;
}

#[tokio::test]
async fn topics_are_tracked_without_duplicates() {
    let broker = MemoryBroker::new();
    let client = connect(&broker).await;
    let _first = listen(&client, &["Epoch", "SimState"]).await;
    let _second = listen(&client, &["Epoch", "Result.#"]).await;

    let topics: Vec<String> = client.listened_topics().unwrap().into_iter().collect();
    assert_eq!(topics, ["Epoch", "Result.#", "SimState"]);
    client.close().await;
    assert!(matches!(client.listened_topics(), Err(RuntimeError::BusClosed)));
}

#[tokio::test]
async fn invalid_patterns_and_topics_are_rejected() {
    let broker = MemoryBroker::new();
    let client = connect(&broker).await;

    let result = client
        .add_listener(["Topic..A"], |_, _| std::future::ready(()))
        .await;
    assert!(matches!(result, Err(RuntimeError::InvalidTopicPattern { .. })));

    assert!(matches!(
        client.send_message("", b"{}".to_vec()),
        Err(RuntimeError::EmptyTopic)
    ));
    client.close().await;
}

#[tokio::test]
async fn close_flushes_and_then_refuses_work() {
    let broker = MemoryBroker::new();
    let listener = connect(&broker).await;
    let mut received = listen(&listener, &["Out"]).await;

    let sender = connect(&broker).await;
    let mut generator = MessageGenerator::new("sim", "sender");
    sender
        .publish("Out", &status(&mut generator))
        .expect("publish");
    sender.close().await;
    assert!(sender.is_closed());

    // Queued before close, so it still reaches the broker.
    assert_eq!(next(&mut received).await.0, "Out");

    assert!(matches!(
        sender.publish("Out", &status(&mut generator)),
        Err(RuntimeError::BusClosed)
    ));
    let late = sender.add_listener(["Out"], |_, _| std::future::ready(())).await;
    assert!(matches!(late, Err(RuntimeError::BusClosed)));

    // A second close is a no-op.
    sender.close().await;
    listener.close().await;
    assert_eq!(broker.queue_count("").await, 0);
}

#[tokio::test]
async fn broker_rejects_bad_credentials() {
    let broker = MemoryBroker::with_credentials("guest", "secret");
    let config = BusConfig::default().with_credentials("guest", "wrong");

    let result =
        BusClient::connect(&broker, config, Arc::new(MessageFactory::default())).await;
    assert!(matches!(
        result,
        Err(RuntimeError::Broker(BrokerError::Authentication { .. }))
    ));

    let accepted = BusClient::connect(
        &broker,
        BusConfig::default().with_credentials("guest", "secret"),
        Arc::new(MessageFactory::default()),
    )
    .await
    .expect("matching credentials");
    accepted.close().await;
}
