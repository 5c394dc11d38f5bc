//! Entity kinds, the decoded `Entity` value, optional entity capabilities,
//! and the entity factory that turns JSON bodies into entities.
//!
//! # Design
//! Entities opt into request shaping through two small traits instead of
//! being probed for methods: `Formattable` reshapes the payload for POST and
//! PATCH, `HasEndpointArg` appends one path segment to the entity's endpoint.
//! `Resource::as_formattable` / `Resource::as_endpoint_arg` answer whether a
//! value has the capability, and the dispatcher asks them.
//!
//! The factory is a table from `EntityKind` to a plain decoder function, so
//! two clients configured with different tables never share state.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::ApiError;
use crate::response::RawResponse;
use crate::types::{
    Account, ApiKeyEntry, Client, Computer, Download, PrintJob, Printer, State, Tag, Whoami,
};

/// Identifier of an entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Client,
    Download,
    ApiKey,
    Account,
    Tag,
    Whoami,
    Computer,
    Printer,
    PrintJob,
    State,
}

impl EntityKind {
    pub const ALL: [EntityKind; 10] = [
        EntityKind::Client,
        EntityKind::Download,
        EntityKind::ApiKey,
        EntityKind::Account,
        EntityKind::Tag,
        EntityKind::Whoami,
        EntityKind::Computer,
        EntityKind::Printer,
        EntityKind::PrintJob,
        EntityKind::State,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EntityKind::Client => "Client",
            EntityKind::Download => "Download",
            EntityKind::ApiKey => "ApiKey",
            EntityKind::Account => "Account",
            EntityKind::Tag => "Tag",
            EntityKind::Whoami => "Whoami",
            EntityKind::Computer => "Computer",
            EntityKind::Printer => "Printer",
            EntityKind::PrintJob => "PrintJob",
            EntityKind::State => "State",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One decoded domain object, tagged with the type it was decoded as.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Client(Client),
    Download(Download),
    ApiKey(ApiKeyEntry),
    Account(Account),
    Tag(Tag),
    Whoami(Whoami),
    Computer(Computer),
    Printer(Printer),
    PrintJob(PrintJob),
    State(State),
}

/// Entity reshapes itself before being sent.
pub trait Formattable {
    fn for_create(&self) -> Result<Value, ApiError>;
    fn for_update(&self) -> Result<Value, ApiError>;
}

/// Entity supplies an extra path segment after its endpoint.
pub trait HasEndpointArg {
    fn endpoint_arg(&self) -> String;
}

/// A value that can be sent to its entity endpoint by `create`, `update`
/// and `remove`.
pub trait Resource {
    fn kind(&self) -> EntityKind;

    /// Plain JSON form, used when the value is not `Formattable`.
    fn to_json(&self) -> Result<Value, ApiError>;

    fn as_formattable(&self) -> Option<&dyn Formattable> {
        None
    }

    fn as_endpoint_arg(&self) -> Option<&dyn HasEndpointArg> {
        None
    }
}

/// Concrete entity struct with a fixed kind.
pub trait TypedEntity: DeserializeOwned + Into<Entity> {
    const KIND: EntityKind;

    /// Unwrap the matching variant; `None` for any other kind.
    fn from_entity(entity: Entity) -> Option<Self>;
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(|e| ApiError::SerializationError(e.to_string()))
}

macro_rules! typed_entity {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Entity {
                fn from(value: $ty) -> Self {
                    Entity::$variant(value)
                }
            }

            impl TypedEntity for $ty {
                const KIND: EntityKind = EntityKind::$variant;

                fn from_entity(entity: Entity) -> Option<Self> {
                    match entity {
                        Entity::$variant(value) => Some(value),
                        _ => None,
                    }
                }
            }
        )*

        impl Entity {
            pub fn kind(&self) -> EntityKind {
                match self {
                    $(Entity::$variant(_) => EntityKind::$variant,)*
                }
            }

            fn resource(&self) -> &dyn Resource {
                match self {
                    $(Entity::$variant(value) => value as &dyn Resource,)*
                }
            }
        }
    };
}

typed_entity! {
    Client => Client,
    Download => Download,
    ApiKey => ApiKeyEntry,
    Account => Account,
    Tag => Tag,
    Whoami => Whoami,
    Computer => Computer,
    Printer => Printer,
    PrintJob => PrintJob,
    State => State,
}

macro_rules! plain_resource {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Resource for $ty {
                fn kind(&self) -> EntityKind {
                    <$ty as TypedEntity>::KIND
                }

                fn to_json(&self) -> Result<Value, ApiError> {
                    to_json(self)
                }
            }
        )*
    };
}

plain_resource!(Client, Download, Whoami, Computer, Printer, State);

impl Resource for ApiKeyEntry {
    fn kind(&self) -> EntityKind {
        EntityKind::ApiKey
    }

    fn to_json(&self) -> Result<Value, ApiError> {
        to_json(self)
    }

    fn as_endpoint_arg(&self) -> Option<&dyn HasEndpointArg> {
        Some(self)
    }
}

impl Resource for Account {
    fn kind(&self) -> EntityKind {
        EntityKind::Account
    }

    fn to_json(&self) -> Result<Value, ApiError> {
        to_json(self)
    }

    fn as_formattable(&self) -> Option<&dyn Formattable> {
        Some(self)
    }
}

impl Resource for Tag {
    fn kind(&self) -> EntityKind {
        EntityKind::Tag
    }

    fn to_json(&self) -> Result<Value, ApiError> {
        to_json(self)
    }

    fn as_formattable(&self) -> Option<&dyn Formattable> {
        Some(self)
    }

    fn as_endpoint_arg(&self) -> Option<&dyn HasEndpointArg> {
        Some(self)
    }
}

impl Resource for PrintJob {
    fn kind(&self) -> EntityKind {
        EntityKind::PrintJob
    }

    fn to_json(&self) -> Result<Value, ApiError> {
        to_json(self)
    }

    fn as_formattable(&self) -> Option<&dyn Formattable> {
        Some(self)
    }

    // Only an existing job is addressed by id.
    fn as_endpoint_arg(&self) -> Option<&dyn HasEndpointArg> {
        self.id.map(|_| self as &dyn HasEndpointArg)
    }
}

impl Resource for Entity {
    fn kind(&self) -> EntityKind {
        Entity::kind(self)
    }

    fn to_json(&self) -> Result<Value, ApiError> {
        self.resource().to_json()
    }

    fn as_formattable(&self) -> Option<&dyn Formattable> {
        self.resource().as_formattable()
    }

    fn as_endpoint_arg(&self) -> Option<&dyn HasEndpointArg> {
        self.resource().as_endpoint_arg()
    }
}

/// Decodes one JSON object into an entity of a fixed kind.
pub type Decoder = fn(Value) -> Result<Entity, serde_json::Error>;

fn decode_as<T: TypedEntity>(value: Value) -> Result<Entity, serde_json::Error> {
    serde_json::from_value::<T>(value).map(Into::into)
}

/// Table of decoders keyed by entity kind.
#[derive(Clone)]
pub struct EntityFactory {
    decoders: BTreeMap<EntityKind, Decoder>,
}

impl EntityFactory {
    pub fn empty() -> Self {
        Self {
            decoders: BTreeMap::new(),
        }
    }

    /// Decoders for every PrintNode entity type.
    pub fn printnode() -> Self {
        let mut factory = Self::empty();
        factory.register(EntityKind::Client, decode_as::<Client>);
        factory.register(EntityKind::Download, decode_as::<Download>);
        factory.register(EntityKind::ApiKey, decode_as::<ApiKeyEntry>);
        factory.register(EntityKind::Account, decode_as::<Account>);
        factory.register(EntityKind::Tag, decode_as::<Tag>);
        factory.register(EntityKind::Whoami, decode_as::<Whoami>);
        factory.register(EntityKind::Computer, decode_as::<Computer>);
        factory.register(EntityKind::Printer, decode_as::<Printer>);
        factory.register(EntityKind::PrintJob, decode_as::<PrintJob>);
        factory.register(EntityKind::State, decode_as::<State>);
        factory
    }

    pub fn register(&mut self, kind: EntityKind, decoder: Decoder) {
        self.decoders.insert(kind, decoder);
    }

    pub fn supports(&self, kind: EntityKind) -> bool {
        self.decoders.contains_key(&kind)
    }

    /// Decode an array into one entity per element, or an object into a
    /// single entity.
    pub fn decode(&self, kind: EntityKind, value: Value) -> Result<Vec<Entity>, ApiError> {
        let decoder = self
            .decoders
            .get(&kind)
            .ok_or_else(|| ApiError::ConfigurationError(format!("no decoder for {kind}")))?;

        let elements = match value {
            Value::Array(elements) => elements,
            object @ Value::Object(_) => vec![object],
            other => {
                return Err(ApiError::DeserializationError(format!(
                    "expected a JSON object or array for {kind}, got {}",
                    json_type(&other)
                )))
            }
        };

        elements
            .into_iter()
            .map(|element| {
                let entity = decoder(element)
                    .map_err(|e| ApiError::DeserializationError(format!("{kind}: {e}")))?;
                if entity.kind() != kind {
                    return Err(ApiError::ConfigurationError(format!(
                        "decoder for {kind} produced {}",
                        entity.kind()
                    )));
                }
                Ok(entity)
            })
            .collect()
    }

    /// Decode a response body.
    pub fn decode_body(&self, kind: EntityKind, response: &RawResponse) -> Result<Vec<Entity>, ApiError> {
        let value: Value = response.json()?;
        self.decode(kind, value)
    }

    /// Decode straight into the concrete struct for `T`.
    pub fn decode_typed<T: TypedEntity>(&self, value: Value) -> Result<Vec<T>, ApiError> {
        self.decode(T::KIND, value)?
            .into_iter()
            .map(|entity| {
                T::from_entity(entity).ok_or_else(|| {
                    ApiError::ConfigurationError(format!("decoded entity is not a {}", T::KIND))
                })
            })
            .collect()
    }
}

impl Default for EntityFactory {
    fn default() -> Self {
        Self::printnode()
    }
}

impl fmt::Debug for EntityFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.decoders.keys()).finish()
    }
}

pub(crate) fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn array_decodes_to_one_entity_per_element() {
        let entities = EntityFactory::printnode()
            .decode(EntityKind::Computer, json!([{"id": 1}, {"id": 2}]))
            .unwrap();
        assert_eq!(entities.len(), 2);
        assert!(entities.iter().all(|e| e.kind() == EntityKind::Computer));
        assert_eq!(
            entities[1],
            Entity::Computer(Computer {
                id: Some(2),
                ..Default::default()
            })
        );
    }

    #[test]
    fn object_decodes_to_single_entity() {
        let entities = EntityFactory::printnode()
            .decode(EntityKind::Printer, json!({"id": 1}))
            .unwrap();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].kind(), EntityKind::Printer);
    }

    #[test]
    fn empty_array_decodes_to_nothing() {
        let entities = EntityFactory::printnode()
            .decode(EntityKind::PrintJob, json!([]))
            .unwrap();
        assert!(entities.is_empty());
    }

    #[test]
    fn scalar_body_is_rejected() {
        let err = EntityFactory::printnode()
            .decode(EntityKind::Computer, json!(42))
            .unwrap_err();
        assert!(matches!(err, ApiError::DeserializationError(_)));
    }

    #[test]
    fn missing_decoder_is_configuration_error() {
        let err = EntityFactory::empty()
            .decode(EntityKind::Computer, json!([]))
            .unwrap_err();
        assert!(matches!(err, ApiError::ConfigurationError(_)));
    }

    #[test]
    fn mismatched_decoder_is_rejected() {
        let mut factory = EntityFactory::empty();
        factory.register(EntityKind::Computer, decode_as::<Printer>);
        let err = factory.decode(EntityKind::Computer, json!({"id": 1})).unwrap_err();
        assert!(matches!(err, ApiError::ConfigurationError(_)));
    }

    #[test]
    fn decode_typed_unwraps_structs() {
        let printers: Vec<Printer> = EntityFactory::printnode()
            .decode_typed(json!([{"id": 3, "name": "label"}]))
            .unwrap();
        assert_eq!(printers[0].name.as_deref(), Some("label"));
    }

    #[test]
    fn capabilities_are_reported_per_entity() {
        let tag = Entity::Tag(Tag {
            name: "plan".to_string(),
            value: Some("gold".to_string()),
        });
        assert!(tag.as_formattable().is_some());
        assert_eq!(tag.as_endpoint_arg().map(|a| a.endpoint_arg()).as_deref(), Some("plan"));

        let computer = Entity::Computer(Computer::default());
        assert!(computer.as_formattable().is_none());
        assert!(computer.as_endpoint_arg().is_none());

        let new_job = PrintJob::default();
        assert!(new_job.as_endpoint_arg().is_none());
        let old_job = PrintJob {
            id: Some(9),
            ..Default::default()
        };
        assert_eq!(old_job.as_endpoint_arg().map(|a| a.endpoint_arg()).as_deref(), Some("9"));
    }

    #[test]
    fn from_entity_rejects_other_kinds() {
        let entity = Entity::Computer(Computer::default());
        assert!(Printer::from_entity(entity.clone()).is_none());
        assert!(Computer::from_entity(entity).is_some());
    }
}
