//! Endpoint resolution and the immutable tables a client is configured with.
//!
//! # Design
//! `Registry` holds three tables: entity descriptors (kind to path), named
//! operations (name to kind and relation shape), and the entity decoders. It
//! is built once and moved into the client; there is no process-wide state.
//!
//! Paths are joined with a single `/` and segments are used verbatim. Ids,
//! tag names and similar values are NOT percent-encoded; callers must pass
//! URL-safe values. Encoding them would change what goes over the wire for
//! existing callers.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use crate::entity::{json_type, EntityFactory, EntityKind};
use crate::error::ApiError;

/// A scalar resource identifier: numeric id, name, or email.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for ResourceId {
    fn from(id: u64) -> Self {
        ResourceId(id.to_string())
    }
}

impl From<u32> for ResourceId {
    fn from(id: u32) -> Self {
        ResourceId(id.to_string())
    }
}

impl From<i64> for ResourceId {
    fn from(id: i64) -> Self {
        ResourceId(id.to_string())
    }
}

impl From<i32> for ResourceId {
    fn from(id: i32) -> Self {
        ResourceId(id.to_string())
    }
}

impl From<&str> for ResourceId {
    fn from(id: &str) -> Self {
        ResourceId(id.to_string())
    }
}

impl From<String> for ResourceId {
    fn from(id: String) -> Self {
        ResourceId(id)
    }
}

impl TryFrom<&Value> for ResourceId {
    type Error = ApiError;

    /// Accepts a non-empty string or an integer.
    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(s) if !s.is_empty() => Ok(ResourceId(s.clone())),
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(ResourceId(n.to_string())),
            other => Err(ApiError::InvalidArgument(format!(
                "expecting a string or int identifier, got {}",
                json_type(other)
            ))),
        }
    }
}

/// How an entity type is addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDescriptor {
    pub kind: EntityKind,
    /// Path below the base URL, e.g. `/download/clients`.
    pub path: String,
    /// Segment used when the type is nested under a parent, e.g.
    /// `printers` in `/computers/1/printers`. Defaults to the last segment of
    /// `path`.
    pub nested_segment: Option<String>,
}

impl EntityDescriptor {
    pub fn new(kind: EntityKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            nested_segment: None,
        }
    }

    pub fn nested_as(mut self, segment: impl Into<String>) -> Self {
        self.nested_segment = Some(segment.into());
        self
    }

    pub fn segment(&self) -> &str {
        match &self.nested_segment {
            Some(segment) => segment.as_str(),
            None => self.path.trim_end_matches('/').rsplit('/').next().unwrap_or_default(),
        }
    }
}

/// Shape of a named read operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// `base(kind)[/id]`; at most one argument.
    List { kind: EntityKind },
    /// `base(child)` with no arguments, `base(parent)/a/segment(child)[/b]`
    /// with one or two.
    Nested { parent: EntityKind, child: EntityKind },
    /// `base(PrintJob)/states` or `base(PrintJob)/id/states`.
    PrintJobStates,
    /// `/client/key/{uuid}?edition=..&version=..`; returns the raw response.
    ClientKey,
}

impl Operation {
    pub fn max_args(&self) -> usize {
        match self {
            Operation::List { .. } | Operation::PrintJobStates => 1,
            Operation::Nested { .. } => 2,
            Operation::ClientKey => 3,
        }
    }
}

/// Immutable configuration tables for one client.
#[derive(Debug, Clone)]
pub struct Registry {
    descriptors: BTreeMap<EntityKind, EntityDescriptor>,
    operations: BTreeMap<String, Operation>,
    factory: EntityFactory,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Tables for the PrintNode service.
    pub fn printnode() -> Self {
        Registry::builder()
            .entity(EntityDescriptor::new(EntityKind::Client, "/download/clients"))
            .entity(EntityDescriptor::new(EntityKind::Download, "/download/client"))
            .entity(EntityDescriptor::new(EntityKind::ApiKey, "/account/apikey"))
            .entity(EntityDescriptor::new(EntityKind::Account, "/account"))
            .entity(EntityDescriptor::new(EntityKind::Tag, "/account/tag"))
            .entity(EntityDescriptor::new(EntityKind::Whoami, "/whoami"))
            .entity(EntityDescriptor::new(EntityKind::Computer, "/computers"))
            .entity(EntityDescriptor::new(EntityKind::Printer, "/printers"))
            .entity(EntityDescriptor::new(EntityKind::PrintJob, "/printjobs"))
            .operation("Clients", Operation::List { kind: EntityKind::Client })
            .operation("Downloads", Operation::List { kind: EntityKind::Download })
            .operation("ApiKeys", Operation::List { kind: EntityKind::ApiKey })
            .operation("Account", Operation::List { kind: EntityKind::Account })
            .operation("Tags", Operation::List { kind: EntityKind::Tag })
            .operation("Whoami", Operation::List { kind: EntityKind::Whoami })
            .operation("Computers", Operation::List { kind: EntityKind::Computer })
            .operation(
                "Printers",
                Operation::Nested {
                    parent: EntityKind::Computer,
                    child: EntityKind::Printer,
                },
            )
            .operation(
                "PrintJobs",
                Operation::Nested {
                    parent: EntityKind::Printer,
                    child: EntityKind::PrintJob,
                },
            )
            .operation("PrintJobStates", Operation::PrintJobStates)
            .operation("ClientKey", Operation::ClientKey)
            .factory(EntityFactory::printnode())
            .build()
    }

    pub fn descriptor(&self, kind: EntityKind) -> Option<&EntityDescriptor> {
        self.descriptors.get(&kind)
    }

    pub fn operation(&self, name: &str) -> Option<Operation> {
        self.operations.get(name).copied()
    }

    pub fn operation_names(&self) -> impl Iterator<Item = &str> {
        self.operations.keys().map(String::as_str)
    }

    pub fn factory(&self) -> &EntityFactory {
        &self.factory
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::printnode()
    }
}

#[derive(Debug, Default)]
pub struct RegistryBuilder {
    descriptors: BTreeMap<EntityKind, EntityDescriptor>,
    operations: BTreeMap<String, Operation>,
    factory: Option<EntityFactory>,
}

impl RegistryBuilder {
    pub fn entity(mut self, descriptor: EntityDescriptor) -> Self {
        self.descriptors.insert(descriptor.kind, descriptor);
        self
    }

    pub fn operation(mut self, name: impl Into<String>, operation: Operation) -> Self {
        self.operations.insert(name.into(), operation);
        self
    }

    pub fn factory(mut self, factory: EntityFactory) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn build(self) -> Registry {
        Registry {
            descriptors: self.descriptors,
            operations: self.operations,
            factory: self.factory.unwrap_or_default(),
        }
    }
}

/// Composes absolute URLs from the base URL and the entity descriptors.
#[derive(Debug, Clone)]
pub struct Endpoints {
    base_url: String,
    descriptors: BTreeMap<EntityKind, EntityDescriptor>,
}

impl Endpoints {
    pub fn new(base_url: &str, registry: &Registry) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            descriptors: registry.descriptors.clone(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn contains(&self, kind: EntityKind) -> bool {
        self.descriptors.contains_key(&kind)
    }

    fn descriptor(&self, kind: EntityKind) -> Result<&EntityDescriptor, ApiError> {
        self.descriptors
            .get(&kind)
            .ok_or_else(|| ApiError::ConfigurationError(format!("no endpoint mapped for {kind}")))
    }

    /// Full URL of the entity type's endpoint.
    pub fn base(&self, kind: EntityKind) -> Result<String, ApiError> {
        let descriptor = self.descriptor(kind)?;
        Ok(format!("{}{}", self.base_url, descriptor.path))
    }

    /// `base(kind)` or `base(kind)/id`. An empty id is rejected rather than
    /// turned into a trailing slash that addresses the whole collection.
    pub fn resource(&self, kind: EntityKind, id: Option<&ResourceId>) -> Result<String, ApiError> {
        let base = self.base(kind)?;
        Ok(match id {
            Some(id) => format!("{base}/{}", path_segment(id.as_str())?),
            None => base,
        })
    }

    /// `base(parent)/parent_id/segment(child)[/segments...]`.
    pub fn related(
        &self,
        parent: EntityKind,
        parent_id: &ResourceId,
        child: EntityKind,
        segments: &[ResourceId],
    ) -> Result<String, ApiError> {
        let mut url = format!(
            "{}/{}/{}",
            self.base(parent)?,
            path_segment(parent_id.as_str())?,
            self.descriptor(child)?.segment()
        );
        for segment in segments {
            url.push('/');
            url.push_str(path_segment(segment.as_str())?);
        }
        Ok(url)
    }

    /// Path below the base URL that belongs to no entity type.
    pub fn fixed(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

/// An id or endpoint argument used as one path segment; must not be empty.
pub(crate) fn path_segment(segment: &str) -> Result<&str, ApiError> {
    if segment.is_empty() {
        return Err(ApiError::InvalidArgument("identifier must not be empty".to_string()));
    }
    Ok(segment)
}

/// Append paging parameters to a URL without a query string.
pub fn paginate(url: &str, offset: u64, limit: u64) -> String {
    format!("{url}?offset={offset}&limit={limit}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const BASE: &str = "https://api.printnode.com";

    fn endpoints() -> Endpoints {
        Endpoints::new(BASE, &Registry::printnode())
    }

    #[test]
    fn every_registered_kind_composes_base_slash_id() {
        let endpoints = endpoints();
        let registry = Registry::printnode();
        let id = ResourceId::from(42u64);
        for kind in EntityKind::ALL {
            let Some(descriptor) = registry.descriptor(kind) else {
                continue;
            };
            assert_eq!(
                endpoints.resource(kind, Some(&id)).unwrap(),
                format!("{BASE}{}/42", descriptor.path)
            );
            assert_eq!(endpoints.resource(kind, None).unwrap(), endpoints.base(kind).unwrap());
        }
    }

    #[test]
    fn unknown_kind_is_configuration_error() {
        let err = endpoints().base(EntityKind::State).unwrap_err();
        assert!(matches!(err, ApiError::ConfigurationError(_)));
    }

    #[test]
    fn related_nests_child_under_parent() {
        let url = endpoints()
            .related(
                EntityKind::Computer,
                &ResourceId::from(5u64),
                EntityKind::Printer,
                &[],
            )
            .unwrap();
        assert_eq!(url, format!("{BASE}/computers/5/printers"));

        let url = endpoints()
            .related(
                EntityKind::Printer,
                &ResourceId::from("7,8"),
                EntityKind::PrintJob,
                &[ResourceId::from(100u64)],
            )
            .unwrap();
        assert_eq!(url, format!("{BASE}/printers/7,8/printjobs/100"));
    }

    #[test]
    fn segments_are_not_escaped() {
        let url = endpoints()
            .resource(EntityKind::Tag, Some(&ResourceId::from("a b/c")))
            .unwrap();
        assert_eq!(url, format!("{BASE}/account/tag/a b/c"));
    }

    #[test]
    fn empty_ids_are_rejected_before_composition() {
        let endpoints = endpoints();
        let empty = ResourceId::from("");
        let err = endpoints.resource(EntityKind::Tag, Some(&empty)).unwrap_err();
        assert!(matches!(err, ApiError::InvalidArgument(_)));

        let err = endpoints
            .related(EntityKind::Computer, &empty, EntityKind::Printer, &[])
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidArgument(_)));

        let err = endpoints
            .related(EntityKind::Computer, &ResourceId::from(1u64), EntityKind::Printer, &[empty])
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidArgument(_)));
    }

    #[test]
    fn trailing_slash_on_base_is_stripped() {
        let endpoints = Endpoints::new("http://localhost:3000/", &Registry::printnode());
        assert_eq!(
            endpoints.base(EntityKind::Whoami).unwrap(),
            "http://localhost:3000/whoami"
        );
    }

    #[test]
    fn nested_segment_defaults_to_last_path_segment() {
        let descriptor = EntityDescriptor::new(EntityKind::Client, "/download/clients");
        assert_eq!(descriptor.segment(), "clients");
        let descriptor = descriptor.nested_as("builds");
        assert_eq!(descriptor.segment(), "builds");
    }

    #[test]
    fn paginate_appends_query() {
        assert_eq!(
            paginate("https://x/computers", 5, 10),
            "https://x/computers?offset=5&limit=10"
        );
    }

    #[test]
    fn resource_id_accepts_scalars_only() {
        assert_eq!(ResourceId::try_from(&json!(12)).unwrap().as_str(), "12");
        assert_eq!(ResourceId::try_from(&json!("12,13")).unwrap().as_str(), "12,13");
        for bad in [json!(1.5), json!(null), json!([1]), json!({"id": 1}), json!(""), json!(true)] {
            let err = ResourceId::try_from(&bad).unwrap_err();
            assert!(matches!(err, ApiError::InvalidArgument(_)), "{bad}");
        }
    }

    #[test]
    fn separate_registries_do_not_interfere() {
        let custom = Registry::builder()
            .entity(EntityDescriptor::new(EntityKind::Computer, "/v2/machines"))
            .build();
        let a = Endpoints::new(BASE, &custom);
        let b = endpoints();
        assert_eq!(a.base(EntityKind::Computer).unwrap(), format!("{BASE}/v2/machines"));
        assert_eq!(b.base(EntityKind::Computer).unwrap(), format!("{BASE}/computers"));
        assert!(!a.contains(EntityKind::Printer));
        assert!(custom.operation("Computers").is_none());
        assert!(Registry::printnode().operation("Computers").is_some());
    }

    #[test]
    fn operation_arity_limits() {
        assert_eq!(Operation::List { kind: EntityKind::Computer }.max_args(), 1);
        assert_eq!(Operation::PrintJobStates.max_args(), 1);
        assert_eq!(
            Operation::Nested {
                parent: EntityKind::Computer,
                child: EntityKind::Printer
            }
            .max_args(),
            2
        );
    }
}
