//! Registry mapping message type tags to constructors.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::attributes::{Attributes, names};
use crate::error::{FactoryError, MessageError};
use crate::kinds::{
    EpochMessage, GeneralMessage, InvalidMessage, SimulationStateMessage, StatusMessage,
};
use crate::message::Message;

/// Builds a typed message from its JSON attributes.
pub type Constructor =
    Arc<dyn Fn(&Map<String, Value>) -> Result<Message, MessageError> + Send + Sync>;

/// Registry of message constructors keyed by the `Type` attribute.
///
/// The factory is built once at process start and shared by reference
/// (`Arc<MessageFactory>`) with every bus client that decodes payloads.
/// Registration takes a write lock, so types can be added from several
/// initialization sites.
///
/// # Registration
///
/// The first registration of a tag wins. Registering an empty tag or a tag
/// that is already present is a no-op that logs a warning.
pub struct MessageFactory {
    constructors: RwLock<HashMap<String, Constructor>>,
}

impl MessageFactory {
    /// Creates a factory with no registered types.
    pub fn new() -> Self {
        Self {
            constructors: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a factory with `Status`, `Epoch` and `SimState` registered.
    pub fn with_builtin_types() -> Self {
        let factory = Self::new();
        factory.register(StatusMessage::MESSAGE_TYPE, |json| {
            StatusMessage::from_attributes(&Attributes::new(json)).map(Message::Status)
        });
        factory.register(EpochMessage::MESSAGE_TYPE, |json| {
            EpochMessage::from_attributes(&Attributes::new(json)).map(Message::Epoch)
        });
        factory.register(SimulationStateMessage::MESSAGE_TYPE, |json| {
            SimulationStateMessage::from_attributes(&Attributes::new(json))
                .map(Message::SimulationState)
        });
        factory
    }

    /// Registers `constructor` for `message_type`.
    ///
    /// Returns `true` when the registration took effect.
    pub fn register<F>(&self, message_type: &str, constructor: F) -> bool
    where
        F: Fn(&Map<String, Value>) -> Result<Message, MessageError> + Send + Sync + 'static,
    {
        if message_type.is_empty() {
            warn!("cannot register an empty message type to the message factory");
            return false;
        }

        let mut constructors = self
            .constructors
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if constructors.contains_key(message_type) {
            warn!(
                message_type,
                "type has already been registered to the message factory"
            );
            return false;
        }

        constructors.insert(message_type.to_owned(), Arc::new(constructor));
        debug!(message_type, "registered message type");
        true
    }

    /// Registers an application type decoded as a [`GeneralMessage`].
    pub fn register_general(&self, message_type: &str) -> bool {
        let tag = message_type.to_owned();
        self.register(message_type, move |json| {
            GeneralMessage::from_attributes(&tag, &Attributes::new(json)).map(Message::General)
        })
    }

    pub fn registered_types(&self) -> BTreeSet<String> {
        self.constructors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn is_registered(&self, message_type: &str) -> bool {
        self.constructors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(message_type)
    }

    /// Builds a message from its attributes.
    ///
    /// The type comes from `message_type` when given, otherwise from the
    /// payload's `Type` attribute.
    ///
    /// # Errors
    ///
    /// - [`FactoryError::MissingType`] when no type can be resolved
    /// - [`FactoryError::UnregisteredType`] when the type has no constructor
    /// - [`FactoryError::Invalid`] with the constructor's validation error
    pub fn decode(
        &self,
        json: &Map<String, Value>,
        message_type: Option<&str>,
    ) -> Result<Message, FactoryError> {
        let message_type = message_type
            .or_else(|| json.get(names::TYPE).and_then(Value::as_str))
            .ok_or(FactoryError::MissingType)?;

        let constructor = self
            .constructors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(message_type)
            .cloned()
            .ok_or_else(|| FactoryError::UnregisteredType(message_type.to_owned()))?;

        Ok(constructor(json)?)
    }

    /// Classifies raw bus bytes; never fails.
    ///
    /// A recognized, valid payload becomes its typed message. Other JSON
    /// becomes [`InvalidMessage::Json`] and anything else
    /// [`InvalidMessage::Text`].
    pub fn decode_payload(&self, payload: &[u8]) -> Message {
        let text = String::from_utf8_lossy(payload);
        let json = match serde_json::from_str::<Value>(&text) {
            Ok(json) => json,
            Err(_) => return Message::Invalid(InvalidMessage::Text(text.into_owned())),
        };

        let Value::Object(object) = &json else {
            return Message::Invalid(InvalidMessage::Json(json));
        };
        match self.decode(object, None) {
            Ok(message) => message,
            Err(error) => {
                debug!(%error, "payload did not decode to a typed message");
                Message::Invalid(InvalidMessage::Json(json))
            }
        }
    }
}

impl Default for MessageFactory {
    fn default() -> Self {
        Self::with_builtin_types()
    }
}
