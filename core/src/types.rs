//! Domain DTOs for the PrintNode API.
//!
//! # Design
//! Decoding is structural: every struct is `#[serde(default)]`, unknown keys
//! are ignored, and almost every field is optional, so the service can add
//! or omit fields without breaking the client. Only a value of the wrong JSON
//! type for a field fails to decode.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::entity::{Formattable, HasEndpointArg};
use crate::error::ApiError;

/// A PrintNode client build available for download, as listed under
/// `/download/clients`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Client {
    pub id: Option<u64>,
    pub enabled: Option<bool>,
    pub edition: Option<String>,
    pub version: Option<String>,
    pub os: Option<String>,
    pub filename: Option<String>,
    pub filesize: Option<u64>,
    pub sha1: Option<String>,
    pub release_timestamp: Option<String>,
    pub url: Option<String>,
}

/// The latest client download for one operating system.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Download {
    pub edition: Option<String>,
    pub version: Option<String>,
    pub os: Option<String>,
    pub filename: Option<String>,
    pub filesize: Option<u64>,
    pub sha1: Option<String>,
    pub release_timestamp: Option<String>,
    pub url: Option<String>,
}

/// An API key of the account. Created and removed by description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiKeyEntry {
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl HasEndpointArg for ApiKeyEntry {
    fn endpoint_arg(&self) -> String {
        self.description.clone()
    }
}

/// A (child) account as created or modified through `/account`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Account {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firstname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lastname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator_ref: Option<String>,
    /// Descriptions of API keys to create alongside the account.
    #[serde(rename = "ApiKeys", skip_serializing_if = "Option::is_none")]
    pub api_keys: Option<Value>,
    /// Tag name to value map applied to the account.
    #[serde(rename = "Tags", skip_serializing_if = "Option::is_none")]
    pub tags: Option<Value>,
}

impl Account {
    fn account_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        let pairs = [
            ("firstname", &self.firstname),
            ("lastname", &self.lastname),
            ("email", &self.email),
            ("password", &self.password),
            ("creatorRef", &self.creator_ref),
        ];
        for (name, value) in pairs {
            if let Some(value) = value {
                fields.insert(name.to_string(), Value::String(value.clone()));
            }
        }
        fields
    }
}

impl Formattable for Account {
    /// `{"Account": {...}, "ApiKeys": [...], "Tags": {...}}`, the last two
    /// only when set.
    fn for_create(&self) -> Result<Value, ApiError> {
        let mut payload = Map::new();
        payload.insert("Account".to_string(), Value::Object(self.account_fields()));
        if let Some(api_keys) = &self.api_keys {
            payload.insert("ApiKeys".to_string(), api_keys.clone());
        }
        if let Some(tags) = &self.tags {
            payload.insert("Tags".to_string(), tags.clone());
        }
        Ok(Value::Object(payload))
    }

    fn for_update(&self) -> Result<Value, ApiError> {
        Ok(Value::Object(self.account_fields()))
    }
}

/// A tag set on the account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tag {
    pub name: String,
    pub value: Option<String>,
}

impl Formattable for Tag {
    fn for_create(&self) -> Result<Value, ApiError> {
        Ok(self.value.clone().map(Value::String).unwrap_or(Value::Null))
    }

    fn for_update(&self) -> Result<Value, ApiError> {
        self.for_create()
    }
}

impl HasEndpointArg for Tag {
    fn endpoint_arg(&self) -> String {
        self.name.clone()
    }
}

/// The authenticated (or impersonated) account, from `/whoami`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Whoami {
    pub id: Option<u64>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub email: Option<String>,
    pub can_create_sub_accounts: Option<bool>,
    pub creator_email: Option<String>,
    pub creator_ref: Option<String>,
    pub child_accounts: Vec<Value>,
    pub credits: Option<Value>,
    pub num_computers: Option<u64>,
    pub total_prints: Option<u64>,
    pub versions: Vec<Value>,
    pub connected: Vec<Value>,
    #[serde(rename = "Tags")]
    pub tags: Option<Value>,
    #[serde(rename = "ApiKeys")]
    pub api_keys: Option<Value>,
    pub state: Option<String>,
    pub permissions: Vec<String>,
}

/// A computer running the PrintNode client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Computer {
    pub id: Option<u64>,
    pub name: Option<String>,
    pub inet: Option<String>,
    pub inet6: Option<String>,
    pub hostname: Option<String>,
    pub version: Option<String>,
    pub jre: Option<String>,
    pub create_timestamp: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Printer {
    pub id: Option<u64>,
    pub computer: Option<Computer>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub capabilities: Option<Value>,
    pub default: Option<bool>,
    pub create_timestamp: Option<String>,
    pub state: Option<String>,
}

/// A print job. Responses embed the full printer; new jobs only need
/// `printer_id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PrintJob {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub printer: Option<Printer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub printer_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// One of `pdf_uri`, `pdf_base64`, `raw_uri`, `raw_base64`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expire_after: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qty: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expire_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl PrintJob {
    fn target_printer(&self) -> Option<u64> {
        self.printer_id
            .or_else(|| self.printer.as_ref().and_then(|p| p.id))
    }
}

impl Formattable for PrintJob {
    /// Flattens the embedded printer to `printerId` and drops the fields the
    /// service assigns.
    fn for_create(&self) -> Result<Value, ApiError> {
        let printer_id = self.target_printer().ok_or_else(|| {
            ApiError::SerializationError("print job has no printer id".to_string())
        })?;
        let mut payload = json!({ "printerId": printer_id });
        let optional = [
            ("title", self.title.clone().map(Value::String)),
            ("contentType", self.content_type.clone().map(Value::String)),
            ("content", self.content.clone().map(Value::String)),
            ("source", self.source.clone().map(Value::String)),
            ("options", self.options.clone()),
            ("expireAfter", self.expire_after.map(Value::from)),
            ("qty", self.qty.map(Value::from)),
            ("authentication", self.authentication.clone()),
        ];
        if let Value::Object(map) = &mut payload {
            for (name, value) in optional {
                if let Some(value) = value {
                    map.insert(name.to_string(), value);
                }
            }
        }
        Ok(payload)
    }

    fn for_update(&self) -> Result<Value, ApiError> {
        self.for_create()
    }
}

impl HasEndpointArg for PrintJob {
    fn endpoint_arg(&self) -> String {
        self.id.map(|id| id.to_string()).unwrap_or_default()
    }
}

/// One state transition of a print job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct State {
    pub print_job_id: Option<u64>,
    pub state: Option<String>,
    pub message: Option<String>,
    pub data: Option<Value>,
    pub client_version: Option<String>,
    pub create_timestamp: Option<String>,
    pub age: Option<u64>,
}
