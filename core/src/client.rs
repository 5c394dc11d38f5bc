//! Request dispatcher for the PrintNode API.
//!
//! # Design
//! `PrintNodeClient` turns one logical operation into exactly one blocking
//! round-trip: resolve the endpoint, build an `HttpRequest`, hand it to the
//! `Transport`, parse the raw bytes into a `RawResponse`, require status 200,
//! then decode the body through the registry's entity factory.
//!
//! Mutable per-client state lives in `RequestContext` (paging and
//! impersonation) and is only changed through the setters here. The client is
//! not meant to be shared across threads while it is being reconfigured; use
//! one client per thread, or serialize access.

use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::credentials::Credentials;
use crate::endpoint::{paginate, path_segment, Endpoints, Operation, Registry, ResourceId};
use crate::entity::{json_type, Entity, EntityKind, Resource, TypedEntity};
use crate::error::ApiError;
use crate::http::{Headers, HttpMethod, HttpRequest};
use crate::response::RawResponse;
use crate::transport::{Transport, UreqTransport};
use crate::types::{Account, ApiKeyEntry, Client, Computer, Download, PrintJob, Printer, State, Tag, Whoami};

pub const CHILD_ACCOUNT_BY_ID: &str = "X-Child-Account-By-Id";
pub const CHILD_ACCOUNT_BY_EMAIL: &str = "X-Child-Account-By-Email";
pub const CHILD_ACCOUNT_BY_CREATOR_REF: &str = "X-Child-Account-By-CreatorRef";

pub const DEFAULT_OFFSET: u64 = 0;
pub const DEFAULT_LIMIT: u64 = 10;

// ureq only decodes gzip; a deflate-encoded body reaches the parser as is and
// then fails to decode as JSON.
const ACCEPT_ENCODING: &str = "gzip, deflate";

/// Which child account requests act on behalf of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildAccount {
    Id(String),
    Email(String),
    CreatorRef(String),
}

impl ChildAccount {
    /// Header name and value sent with every request.
    pub fn header(&self) -> (&'static str, &str) {
        match self {
            ChildAccount::Id(id) => (CHILD_ACCOUNT_BY_ID, id.as_str()),
            ChildAccount::Email(email) => (CHILD_ACCOUNT_BY_EMAIL, email.as_str()),
            ChildAccount::CreatorRef(creator_ref) => (CHILD_ACCOUNT_BY_CREATOR_REF, creator_ref.as_str()),
        }
    }
}

/// Paging and impersonation applied to every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    offset: u64,
    limit: u64,
    child_account: Option<ChildAccount>,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self {
            offset: DEFAULT_OFFSET,
            limit: DEFAULT_LIMIT,
            child_account: None,
        }
    }
}

impl RequestContext {
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn child_account(&self) -> Option<&ChildAccount> {
        self.child_account.as_ref()
    }
}

/// Result of a dynamically named operation.
#[derive(Debug)]
pub enum Reply {
    Entities(Vec<Entity>),
    /// Operations whose body the caller reads directly, such as the client
    /// key lookup.
    Raw(RawResponse),
}

impl Reply {
    pub fn into_entities(self) -> Option<Vec<Entity>> {
        match self {
            Reply::Entities(entities) => Some(entities),
            Reply::Raw(_) => None,
        }
    }

    pub fn into_raw(self) -> Option<RawResponse> {
        match self {
            Reply::Raw(response) => Some(response),
            Reply::Entities(_) => None,
        }
    }
}

/// Blocking client for the PrintNode API.
pub struct PrintNodeClient<T = UreqTransport> {
    transport: T,
    authorization: String,
    user_agent: String,
    endpoints: Endpoints,
    registry: Registry,
    context: RequestContext,
}

impl PrintNodeClient<UreqTransport> {
    /// Client over the ureq transport with the PrintNode tables.
    pub fn new(credentials: &dyn Credentials, config: ClientConfig) -> Result<Self, ApiError> {
        config.validate()?;
        let transport = UreqTransport::new(config.timeout());
        Ok(Self::with_parts(credentials, &config, Registry::printnode(), transport))
    }
}

impl<T: Transport> PrintNodeClient<T> {
    pub fn with_parts(
        credentials: &dyn Credentials,
        config: &ClientConfig,
        registry: Registry,
        transport: T,
    ) -> Self {
        Self {
            transport,
            authorization: credentials.authorization(),
            user_agent: config.user_agent.clone(),
            endpoints: Endpoints::new(&config.base_url, &registry),
            registry,
            context: RequestContext::default(),
        }
    }

    pub fn base_url(&self) -> &str {
        self.endpoints.base_url()
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    // ---------------------------------------------------------------------
    // Context
    // ---------------------------------------------------------------------

    /// Accepts a non-negative integer or a string of digits.
    pub fn set_offset(&mut self, offset: impl Into<Value>) -> Result<(), ApiError> {
        self.context.offset = non_negative("offset", offset.into())?;
        Ok(())
    }

    /// Accepts a non-negative integer or a string of digits.
    pub fn set_limit(&mut self, limit: impl Into<Value>) -> Result<(), ApiError> {
        self.context.limit = non_negative("limit", limit.into())?;
        Ok(())
    }

    pub fn impersonate_by_id(&mut self, id: impl Into<ResourceId>) {
        self.context.child_account = Some(ChildAccount::Id(id.into().to_string()));
    }

    pub fn impersonate_by_email(&mut self, email: &str) {
        self.context.child_account = Some(ChildAccount::Email(email.to_string()));
    }

    pub fn impersonate_by_creator_ref(&mut self, creator_ref: &str) {
        self.context.child_account = Some(ChildAccount::CreatorRef(creator_ref.to_string()));
    }

    pub fn clear_impersonation(&mut self) {
        self.context.child_account = None;
    }

    // ---------------------------------------------------------------------
    // Transport plumbing
    // ---------------------------------------------------------------------

    /// Build the request for `method` and `url` with auth, encoding, user
    /// agent and impersonation headers.
    pub fn build_request(&self, method: HttpMethod, url: String, body: Option<String>) -> HttpRequest {
        let mut headers = Headers::new();
        headers.insert("Authorization", self.authorization.as_str());
        headers.insert("Accept-Encoding", ACCEPT_ENCODING);
        headers.insert("User-Agent", self.user_agent.as_str());
        if body.is_some() {
            headers.insert("Content-Type", "application/json");
        }
        if let Some(child) = &self.context.child_account {
            let (name, value) = child.header();
            headers.insert(name, value);
        }
        HttpRequest {
            method,
            url,
            headers,
            body,
        }
    }

    fn send(&self, method: HttpMethod, url: String, body: Option<String>) -> Result<RawResponse, ApiError> {
        let request = self.build_request(method, url, body);
        debug!(method = %request.method, url = %request.url, "dispatching request");
        let raw = self.transport.execute(&request)?;
        let response = RawResponse::parse(&raw)?;
        debug!(status = response.status, bytes = response.body.len(), "response received");
        Ok(response)
    }

    fn send_json(&self, method: HttpMethod, url: String, payload: &Value) -> Result<RawResponse, ApiError> {
        let body = serde_json::to_string(payload).map_err(|e| ApiError::SerializationError(e.to_string()))?;
        check_status(self.send(method, url, Some(body))?)
    }

    fn fetch(&self, kind: EntityKind, url: &str) -> Result<Vec<Entity>, ApiError> {
        let url = paginate(url, self.context.offset, self.context.limit);
        let response = check_status(self.send(HttpMethod::Get, url, None)?)?;
        self.registry.factory().decode_body(kind, &response)
    }

    // ---------------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------------

    /// GET `base(kind)[/id]` and decode the body as `kind`.
    pub fn get_by_type(&self, kind: EntityKind, id: Option<&ResourceId>) -> Result<Vec<Entity>, ApiError> {
        if !self.endpoints.contains(kind) {
            return Err(ApiError::UnknownOperation(format!("no endpoint for {kind}")));
        }
        let url = self.endpoints.resource(kind, id)?;
        self.fetch(kind, &url)
    }

    /// GET `base(parent)/parent_id/child[/segments]`. At most two extra
    /// segments.
    pub fn get_related(
        &self,
        parent: EntityKind,
        parent_id: &ResourceId,
        child: EntityKind,
        segments: &[ResourceId],
    ) -> Result<Vec<Entity>, ApiError> {
        if segments.len() > 2 {
            return Err(ApiError::InvalidArgument(format!(
                "at most two path segments may follow {child}, got {}",
                segments.len()
            )));
        }
        let url = self.endpoints.related(parent, parent_id, child, segments)?;
        self.fetch(child, &url)
    }

    fn fetch_states(&self, print_job: Option<&ResourceId>) -> Result<Vec<Entity>, ApiError> {
        let base = self.endpoints.base(EntityKind::PrintJob)?;
        let url = match print_job {
            Some(id) => format!("{base}/{id}/states"),
            None => format!("{base}/states"),
        };
        let url = paginate(&url, self.context.offset, self.context.limit);
        let response = check_status(self.send(HttpMethod::Get, url, None)?)?;
        let body: Value = response.json()?;
        self.registry.factory().decode(EntityKind::State, flatten_states(body))
    }

    /// Resolve `name` in the operation table and run it with `args`.
    ///
    /// Ids must be strings or integers. `ClientKey` takes a UUID, an edition
    /// and a version, all strings.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Reply, ApiError> {
        let operation = self
            .registry
            .operation(name)
            .ok_or_else(|| ApiError::UnknownOperation(name.to_string()))?;
        if args.len() > operation.max_args() {
            return Err(ApiError::InvalidArgument(format!(
                "too many arguments given to {name}: at most {}, got {}",
                operation.max_args(),
                args.len()
            )));
        }

        match operation {
            Operation::ClientKey => {
                let [uuid, edition, version] = args else {
                    return Err(ApiError::InvalidArgument(format!(
                        "{name} takes a uuid, an edition and a version"
                    )));
                };
                let uuid = Uuid::parse_str(string_arg("uuid", uuid)?)
                    .map_err(|e| ApiError::InvalidArgument(format!("uuid: {e}")))?;
                let response = self.get_client_key(
                    uuid,
                    string_arg("edition", edition)?,
                    string_arg("version", version)?,
                )?;
                Ok(Reply::Raw(response))
            }
            Operation::List { kind } => {
                let ids = resource_ids(args)?;
                self.get_by_type(kind, ids.first()).map(Reply::Entities)
            }
            Operation::Nested { parent, child } => {
                let ids = resource_ids(args)?;
                let entities = match ids.split_first() {
                    None => self.get_by_type(child, None)?,
                    Some((parent_id, rest)) => self.get_related(parent, parent_id, child, rest)?,
                };
                Ok(Reply::Entities(entities))
            }
            Operation::PrintJobStates => {
                let ids = resource_ids(args)?;
                self.fetch_states(ids.first()).map(Reply::Entities)
            }
        }
    }

    fn get_typed<E: TypedEntity>(&self, id: Option<&ResourceId>) -> Result<Vec<E>, ApiError> {
        typed(self.get_by_type(E::KIND, id)?)
    }

    pub fn get_clients(&self, id: Option<&ResourceId>) -> Result<Vec<Client>, ApiError> {
        self.get_typed(id)
    }

    pub fn get_downloads(&self, id: Option<&ResourceId>) -> Result<Vec<Download>, ApiError> {
        self.get_typed(id)
    }

    pub fn get_api_keys(&self, description: Option<&ResourceId>) -> Result<Vec<ApiKeyEntry>, ApiError> {
        self.get_typed(description)
    }

    pub fn get_account(&self, id: Option<&ResourceId>) -> Result<Vec<Account>, ApiError> {
        self.get_typed(id)
    }

    pub fn get_tags(&self, name: Option<&ResourceId>) -> Result<Vec<Tag>, ApiError> {
        self.get_typed(name)
    }

    /// The account the credentials (and impersonation, if set) resolve to.
    pub fn get_whoami(&self) -> Result<Whoami, ApiError> {
        self.get_typed::<Whoami>(None)?
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::DeserializationError("empty whoami response".to_string()))
    }

    /// `ids` may be a single id, a comma-separated set, or a range the
    /// service understands (`1-5`).
    pub fn get_computers(&self, ids: Option<&ResourceId>) -> Result<Vec<Computer>, ApiError> {
        self.get_typed(ids)
    }

    pub fn get_printers(&self, ids: Option<&ResourceId>) -> Result<Vec<Printer>, ApiError> {
        self.get_typed(ids)
    }

    pub fn get_printers_of_computer(
        &self,
        computers: &ResourceId,
        printers: Option<&ResourceId>,
    ) -> Result<Vec<Printer>, ApiError> {
        let segments: Vec<ResourceId> = printers.cloned().into_iter().collect();
        typed(self.get_related(EntityKind::Computer, computers, EntityKind::Printer, &segments)?)
    }

    pub fn get_print_jobs(&self, ids: Option<&ResourceId>) -> Result<Vec<PrintJob>, ApiError> {
        self.get_typed(ids)
    }

    pub fn get_print_jobs_of_printer(
        &self,
        printers: &ResourceId,
        print_jobs: Option<&ResourceId>,
    ) -> Result<Vec<PrintJob>, ApiError> {
        let segments: Vec<ResourceId> = print_jobs.cloned().into_iter().collect();
        typed(self.get_related(EntityKind::Printer, printers, EntityKind::PrintJob, &segments)?)
    }

    /// States of every job, or of the given job(s).
    pub fn get_print_job_states(&self, print_jobs: Option<&ResourceId>) -> Result<Vec<State>, ApiError> {
        typed(self.fetch_states(print_jobs)?)
    }

    /// GET `/client/key/{uuid}`. The status is not checked; the caller reads
    /// the key (or the error) from the raw response.
    pub fn get_client_key(&self, uuid: Uuid, edition: &str, version: &str) -> Result<RawResponse, ApiError> {
        let url = self
            .endpoints
            .fixed(&format!("/client/key/{uuid}?edition={edition}&version={version}"));
        self.send(HttpMethod::Get, url, None)
    }

    // ---------------------------------------------------------------------
    // Writes
    // ---------------------------------------------------------------------

    fn entity_url(&self, entity: &dyn Resource) -> Result<String, ApiError> {
        let mut url = self.endpoints.base(entity.kind())?;
        if let Some(arg) = entity.as_endpoint_arg() {
            let arg = arg.endpoint_arg();
            url.push('/');
            url.push_str(path_segment(&arg)?);
        }
        Ok(url)
    }

    /// POST the entity to its endpoint.
    pub fn create(&self, entity: &dyn Resource) -> Result<RawResponse, ApiError> {
        let url = self.entity_url(entity)?;
        let payload = match entity.as_formattable() {
            Some(formattable) => formattable.for_create()?,
            None => entity.to_json()?,
        };
        self.send_json(HttpMethod::Post, url, &payload)
    }

    /// PATCH the entity at its endpoint.
    pub fn update(&self, entity: &dyn Resource) -> Result<RawResponse, ApiError> {
        let url = self.entity_url(entity)?;
        let payload = match entity.as_formattable() {
            Some(formattable) => formattable.for_update()?,
            None => entity.to_json()?,
        };
        self.send_json(HttpMethod::Patch, url, &payload)
    }

    /// DELETE the entity at its endpoint. Accounts go through
    /// `delete_account`, so they need impersonation too.
    pub fn remove(&self, entity: &dyn Resource) -> Result<RawResponse, ApiError> {
        if entity.kind() == EntityKind::Account {
            return self.delete_account();
        }
        let url = self.entity_url(entity)?;
        check_status(self.send(HttpMethod::Delete, url, None)?)
    }

    pub fn delete_tag(&self, name: &str) -> Result<RawResponse, ApiError> {
        let url = self.endpoints.resource(EntityKind::Tag, Some(&ResourceId::from(name)))?;
        check_status(self.send(HttpMethod::Delete, url, None)?)
    }

    /// Delete the impersonated child account. Refuses to run without
    /// impersonation so the authenticated account itself is never deleted.
    pub fn delete_account(&self) -> Result<RawResponse, ApiError> {
        if self.context.child_account.is_none() {
            return Err(ApiError::PreconditionFailed(
                "deleting an account requires child account impersonation".to_string(),
            ));
        }
        let url = format!("{}/", self.endpoints.base(EntityKind::Account)?);
        check_status(self.send(HttpMethod::Delete, url, None)?)
    }
}

impl<T> std::fmt::Debug for PrintNodeClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrintNodeClient")
            .field("base_url", &self.endpoints.base_url())
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

/// Anything but 200 is a failure carrying the whole response.
fn check_status(response: RawResponse) -> Result<RawResponse, ApiError> {
    if response.status == 200 {
        return Ok(response);
    }
    warn!(status = response.status, message = %response.message, "request failed");
    Err(ApiError::HttpFailure(Box::new(response)))
}

fn typed<E: TypedEntity>(entities: Vec<Entity>) -> Result<Vec<E>, ApiError> {
    entities
        .into_iter()
        .map(|entity| {
            let kind = entity.kind();
            E::from_entity(entity)
                .ok_or_else(|| ApiError::ConfigurationError(format!("expected {}, decoded {kind}", E::KIND)))
        })
        .collect()
}

fn resource_ids(args: &[Value]) -> Result<Vec<ResourceId>, ApiError> {
    args.iter().map(ResourceId::try_from).collect()
}

fn string_arg<'a>(name: &str, value: &'a Value) -> Result<&'a str, ApiError> {
    value.as_str().ok_or_else(|| {
        ApiError::InvalidArgument(format!("{name} must be a string, got {}", json_type(value)))
    })
}

fn non_negative(name: &str, value: Value) -> Result<u64, ApiError> {
    let parsed = match &value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => s.parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| ApiError::InvalidArgument(format!("{name} should be a non-negative integer, got {value}")))
}

/// State bodies hold one list of states per job; flatten them.
fn flatten_states(body: Value) -> Value {
    match body {
        Value::Array(items) if items.iter().any(Value::is_array) => Value::Array(
            items
                .into_iter()
                .flat_map(|item| match item {
                    Value::Array(inner) => inner,
                    other => vec![other],
                })
                .collect(),
        ),
        other => other,
    }
}
