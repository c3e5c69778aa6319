//! Environment configuration loaders for the bus, components and the manager.
//!
//! Every loader comes in two forms: `from_env` reads the process environment,
//! `from_lookup` takes any `name -> value` function. Unset or unparsable
//! variables keep the default of the corresponding field.
use std::env;
use std::str::FromStr;
use std::time::Duration;

use sim_messages::Timestamp;
use sim_runtime::{BusConfig, ComponentConfig, ManagerConfig};
use tracing::warn;

/// Everything a simulation process reads from its environment.
#[derive(Clone, Debug, Default)]
pub struct PlatformConfig {
    pub bus: BusConfig,
    pub component: ComponentConfig,
    pub manager: ManagerConfig,
}

impl PlatformConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);
        Self {
            bus: read_bus(&env),
            component: read_component(&env),
            manager: read_manager(&env),
        }
    }
}

/// Broker settings.
///
/// Environment variables:
/// - `RABBITMQ_HOST` / `RABBITMQ_PORT` (default: localhost:5672)
/// - `RABBITMQ_LOGIN` / `RABBITMQ_PASSWORD` (default: empty)
/// - `RABBITMQ_SSL`, `RABBITMQ_SSL_VERSION`, `RABBITMQ_SSL_VERIFY`
/// - `RABBITMQ_EXCHANGE`, `RABBITMQ_EXCHANGE_AUTODELETE`, `RABBITMQ_EXCHANGE_DURABLE`
pub fn bus_from_env() -> BusConfig {
    bus_from_lookup(|name| env::var(name).ok())
}

pub fn bus_from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> BusConfig {
    read_bus(&Env(lookup))
}

/// Component identity and topics.
///
/// Environment variables:
/// - `SIMULATION_ID`, `SIMULATION_COMPONENT_NAME`
/// - `SIMULATION_EPOCH_MESSAGE_TOPIC`, `SIMULATION_STATE_MESSAGE_TOPIC`
/// - `SIMULATION_STATUS_MESSAGE_TOPIC`, `SIMULATION_ERROR_MESSAGE_TOPIC`
/// - `SIMULATION_OTHER_TOPICS` (comma separated)
pub fn component_from_env() -> ComponentConfig {
    component_from_lookup(|name| env::var(name).ok())
}

pub fn component_from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> ComponentConfig {
    read_component(&Env(lookup))
}

/// Manager settings.
///
/// Environment variables:
/// - `SIMULATION_ID`, `SIMULATION_MANAGER_NAME`, `SIMULATION_COMPONENTS` (comma separated)
/// - `SIMULATION_NAME`, `SIMULATION_DESCRIPTION`
/// - `SIMULATION_INITIAL_START_TIME` (ISO 8601)
/// - `SIMULATION_EPOCH_LENGTH` (whole seconds), `SIMULATION_MAX_EPOCHS`
/// - `SIMULATION_EPOCH_TIMER_INTERVAL`, `SIMULATION_STOP_GRACE_PERIOD` (seconds)
/// - `SIMULATION_MAX_EPOCH_RESENDS`
/// - the four topic variables shared with components
pub fn manager_from_env() -> ManagerConfig {
    manager_from_lookup(|name| env::var(name).ok())
}

pub fn manager_from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> ManagerConfig {
    read_manager(&Env(lookup))
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, key: &str) -> Option<String> {
        (self.0)(key)
    }

    fn parse<T: FromStr>(&self, key: &str) -> Option<T> {
        let raw = self.string(key)?;
        match raw.trim().parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(variable = key, value = %raw, "ignoring unparsable setting");
                None
            }
        }
    }

    /// Only a case-insensitive `true` counts as set.
    fn flag(&self, key: &str) -> Option<bool> {
        self.string(key)
            .map(|value| value.trim().eq_ignore_ascii_case("true"))
    }

    fn list(&self, key: &str) -> Option<Vec<String>> {
        self.string(key).map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_owned)
                .collect()
        })
    }

    fn seconds(&self, key: &str) -> Option<Duration> {
        let seconds: f64 = self.parse(key)?;
        let duration = Duration::try_from_secs_f64(seconds).ok();
        if duration.is_none() {
            warn!(variable = key, seconds, "ignoring invalid duration");
        }
        duration
    }

    fn timestamp(&self, key: &str) -> Option<Timestamp> {
        let raw = self.string(key)?;
        Timestamp::parse(&raw)
            .inspect_err(|error| warn!(variable = key, %error, "ignoring invalid timestamp"))
            .ok()
    }
}

fn read_bus<F: Fn(&str) -> Option<String>>(env: &Env<F>) -> BusConfig {
    let mut config = BusConfig::default();

    if let Some(host) = env.string("RABBITMQ_HOST") {
        config.host = host;
    }
    if let Some(port) = env.parse("RABBITMQ_PORT") {
        config.port = port;
    }
    if let Some(login) = env.string("RABBITMQ_LOGIN") {
        config.login = login;
    }
    if let Some(password) = env.string("RABBITMQ_PASSWORD") {
        config.password = password;
    }
    if let Some(exchange) = env.string("RABBITMQ_EXCHANGE") {
        config.exchange = exchange;
    }
    if let Some(auto_delete) = env.flag("RABBITMQ_EXCHANGE_AUTODELETE") {
        config.exchange_auto_delete = auto_delete;
    }
    if let Some(durable) = env.flag("RABBITMQ_EXCHANGE_DURABLE") {
        config.exchange_durable = durable;
    }

    // TLS
    if let Some(enabled) = env.flag("RABBITMQ_SSL") {
        config.tls.enabled = enabled;
    }
    if let Some(version) = env.string("RABBITMQ_SSL_VERSION") {
        config.tls.version = version;
    }
    if let Some(verify) = env.flag("RABBITMQ_SSL_VERIFY") {
        config.tls.verify_certificate = verify;
    }

    config
}

struct Topics {
    epoch: Option<String>,
    simulation_state: Option<String>,
    status: Option<String>,
    error: Option<String>,
}

fn read_topics<F: Fn(&str) -> Option<String>>(env: &Env<F>) -> Topics {
    Topics {
        epoch: env.string("SIMULATION_EPOCH_MESSAGE_TOPIC"),
        simulation_state: env.string("SIMULATION_STATE_MESSAGE_TOPIC"),
        status: env.string("SIMULATION_STATUS_MESSAGE_TOPIC"),
        error: env.string("SIMULATION_ERROR_MESSAGE_TOPIC"),
    }
}

fn read_component<F: Fn(&str) -> Option<String>>(env: &Env<F>) -> ComponentConfig {
    let mut config = ComponentConfig::default();

    if let Some(id) = env.string("SIMULATION_ID") {
        config.simulation_id = id;
    }
    if let Some(name) = env.string("SIMULATION_COMPONENT_NAME") {
        config.component_name = name;
    }

    let topics = read_topics(env);
    if let Some(topic) = topics.epoch {
        config.epoch_topic = topic;
    }
    if let Some(topic) = topics.simulation_state {
        config.simulation_state_topic = topic;
    }
    if let Some(topic) = topics.status {
        config.status_topic = topic;
    }
    if let Some(topic) = topics.error {
        config.error_topic = topic;
    }
    if let Some(other) = env.list("SIMULATION_OTHER_TOPICS") {
        config.other_topics = other;
    }

    config
}

fn read_manager<F: Fn(&str) -> Option<String>>(env: &Env<F>) -> ManagerConfig {
    let mut config = ManagerConfig::default();

    if let Some(id) = env.string("SIMULATION_ID") {
        config.simulation_id = id;
    }
    if let Some(name) = env.string("SIMULATION_MANAGER_NAME") {
        config.manager_name = name;
    }
    if let Some(components) = env.list("SIMULATION_COMPONENTS") {
        config.components = components;
    }
    config.simulation_name = env.string("SIMULATION_NAME").filter(|name| !name.is_empty());
    config.simulation_description = env
        .string("SIMULATION_DESCRIPTION")
        .filter(|description| !description.is_empty());

    // Epoch timing
    if let Some(start) = env.timestamp("SIMULATION_INITIAL_START_TIME") {
        config.initial_start_time = start;
    }
    if let Some(length) = env.parse::<u64>("SIMULATION_EPOCH_LENGTH") {
        config.epoch_length = Duration::from_secs(length);
    }
    if let Some(max_epochs) = env.parse("SIMULATION_MAX_EPOCHS") {
        config.max_epochs = max_epochs;
    }
    if let Some(interval) = env.seconds("SIMULATION_EPOCH_TIMER_INTERVAL") {
        config.epoch_timer_interval = interval;
    }
    if let Some(resends) = env.parse("SIMULATION_MAX_EPOCH_RESENDS") {
        config.max_epoch_resends = resends;
    }
    if let Some(grace) = env.seconds("SIMULATION_STOP_GRACE_PERIOD") {
        config.stop_grace_period = grace;
    }

    let topics = read_topics(env);
    if let Some(topic) = topics.epoch {
        config.epoch_topic = topic;
    }
    if let Some(topic) = topics.simulation_state {
        config.simulation_state_topic = topic;
    }
    if let Some(topic) = topics.status {
        config.status_topic = topic;
    }
    if let Some(topic) = topics.error {
        config.error_topic = topic;
    }

    config
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        let vars: HashMap<&str, &str> = vars.iter().copied().collect();
        move |name| vars.get(name).map(|value| (*value).to_owned())
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = PlatformConfig::from_lookup(|_| None);
        assert_eq!(config.bus, BusConfig::default());
        assert_eq!(config.component, ComponentConfig::default());
        assert_eq!(config.manager, ManagerConfig::default());
        assert_eq!(config.manager.initial_start_time.to_string(), "2020-01-01T00:00:00.000Z");
    }

    #[test]
    fn bus_settings_are_read() {
        let config = bus_from_lookup(lookup(&[
            ("RABBITMQ_HOST", "broker.local"),
            ("RABBITMQ_PORT", "5671"),
            ("RABBITMQ_LOGIN", "guest"),
            ("RABBITMQ_PASSWORD", "secret"),
            ("RABBITMQ_SSL", "TRUE"),
            ("RABBITMQ_SSL_VERIFY", "false"),
            ("RABBITMQ_EXCHANGE", "procem"),
            ("RABBITMQ_EXCHANGE_DURABLE", "True"),
            ("RABBITMQ_EXCHANGE_AUTODELETE", "yes"),
        ]));

        assert_eq!(config.host, "broker.local");
        assert_eq!(config.port, 5671);
        assert_eq!(config.login, "guest");
        assert_eq!(config.password, "secret");
        assert!(config.tls.enabled);
        assert!(!config.tls.verify_certificate);
        assert_eq!(config.tls.version, "PROTOCOL_TLS");
        assert_eq!(config.exchange, "procem");
        assert!(config.exchange_durable);
        // Anything other than "true" is false.
        assert!(!config.exchange_auto_delete);
    }

    #[test]
    fn bad_port_keeps_the_default() {
        let config = bus_from_lookup(lookup(&[("RABBITMQ_PORT", "amqp")]));
        assert_eq!(config.port, 5672);
    }

    #[test]
    fn component_topics_and_lists() {
        let config = component_from_lookup(lookup(&[
            ("SIMULATION_ID", "2021-01-01T00:00:00.000Z"),
            ("SIMULATION_COMPONENT_NAME", "grid"),
            ("SIMULATION_EPOCH_MESSAGE_TOPIC", "Sim.Epoch"),
            ("SIMULATION_OTHER_TOPICS", "Forecast.Weather, Result.#,,"),
        ]));

        assert_eq!(config.simulation_id, "2021-01-01T00:00:00.000Z");
        assert_eq!(config.component_name, "grid");
        assert_eq!(config.epoch_topic, "Sim.Epoch");
        assert_eq!(config.simulation_state_topic, "SimState");
        assert_eq!(config.other_topics, ["Forecast.Weather", "Result.#"]);
    }

    #[test]
    fn manager_timing_settings() {
        let config = manager_from_lookup(lookup(&[
            ("SIMULATION_COMPONENTS", "grid,storage"),
            ("SIMULATION_NAME", "Winter week"),
            ("SIMULATION_INITIAL_START_TIME", "2021-02-01T00:00:00Z"),
            ("SIMULATION_EPOCH_LENGTH", "900"),
            ("SIMULATION_MAX_EPOCHS", "96"),
            ("SIMULATION_EPOCH_TIMER_INTERVAL", "2.5"),
            ("SIMULATION_MAX_EPOCH_RESENDS", "3"),
            ("SIMULATION_STOP_GRACE_PERIOD", "-1"),
        ]));

        assert_eq!(config.components, ["grid", "storage"]);
        assert_eq!(config.simulation_name.as_deref(), Some("Winter week"));
        assert_eq!(config.simulation_description, None);
        assert_eq!(config.initial_start_time.to_string(), "2021-02-01T00:00:00.000Z");
        assert_eq!(config.epoch_length, Duration::from_secs(900));
        assert_eq!(config.max_epochs, 96);
        assert_eq!(config.epoch_timer_interval, Duration::from_millis(2500));
        assert_eq!(config.max_epoch_resends, 3);
        // Negative durations are rejected.
        assert_eq!(config.stop_grace_period, Duration::from_secs(5));
    }
}
