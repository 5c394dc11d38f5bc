//! Blocking client core for the PrintNode HTTP API.
//!
//! # Overview
//! Resolves entity types to endpoints, sends authenticated requests through a
//! pluggable `Transport`, parses the raw HTTP response bytes, and decodes JSON
//! bodies into typed entities.
//!
//! # Design
//! - `PrintNodeClient` is the dispatcher. Each operation is one blocking
//!   round-trip; nothing is retried, pooled, or run in the background.
//! - `Registry` carries the endpoint, operation and decoder tables. It is
//!   passed in at construction, so clients never share configuration.
//! - Transports return raw bytes and `RawResponse::parse` does the framing,
//!   keeping the status/header/body split independent of the HTTP library.
//! - Entities opt into request shaping with `Formattable` and
//!   `HasEndpointArg`.
//!
//! ```no_run
//! use printnode_core::{ApiKey, ClientConfig, PrintNodeClient, PrintJob};
//!
//! # fn main() -> Result<(), printnode_core::ApiError> {
//! let client = PrintNodeClient::new(&ApiKey::from_env()?, ClientConfig::from_env()?)?;
//! for computer in client.get_computers(None)? {
//!     println!("{:?} {:?}", computer.id, computer.name);
//! }
//! let job = PrintJob {
//!     printer_id: Some(33),
//!     title: Some("Hello".to_string()),
//!     content_type: Some("pdf_uri".to_string()),
//!     content: Some("https://example.com/hello.pdf".to_string()),
//!     source: Some("docs".to_string()),
//!     ..Default::default()
//! };
//! let id: u64 = client.create(&job)?.json()?;
//! # let _ = id;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod credentials;
pub mod endpoint;
pub mod entity;
pub mod error;
pub mod http;
pub mod response;
pub mod transport;
pub mod types;

pub use client::{ChildAccount, PrintNodeClient, Reply, RequestContext};
pub use config::ClientConfig;
pub use credentials::{ApiKey, Credentials, UsernamePassword};
pub use endpoint::{EntityDescriptor, Endpoints, Operation, Registry, ResourceId};
pub use entity::{Entity, EntityFactory, EntityKind, Formattable, HasEndpointArg, Resource, TypedEntity};
pub use error::ApiError;
pub use http::{Headers, HttpMethod, HttpRequest};
pub use response::RawResponse;
pub use transport::{Transport, UreqTransport};
pub use types::{
    Account, ApiKeyEntry, Client, Computer, Download, PrintJob, Printer, State, Tag, Whoami,
};
