//! In-memory stand-in for the PrintNode API, used by the client's
//! integration tests.
//!
//! Every route requires a Basic `Authorization` header. Child account
//! headers are echoed back on `/whoami` so tests can see impersonation
//! arrive.

use std::{collections::BTreeMap, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{delete, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const CHILD_HEADERS: [&str; 3] = [
    "x-child-account-by-id",
    "x-child-account-by-email",
    "x-child-account-by-creatorref",
];

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Computer {
    pub id: u64,
    pub name: String,
    pub state: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Printer {
    pub id: u64,
    pub computer: Computer,
    pub name: String,
    pub default: bool,
    pub state: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintJob {
    pub id: u64,
    pub printer: Printer,
    pub title: String,
    pub content_type: String,
    pub source: String,
    pub state: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePrintJob {
    pub printer_id: u64,
    #[serde(default)]
    pub title: String,
    pub content_type: String,
    pub content: String,
    #[serde(default)]
    pub source: String,
}

#[derive(Deserialize)]
pub struct Paging {
    #[serde(default)]
    pub offset: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    100
}

#[derive(Deserialize)]
pub struct KeyQuery {
    pub edition: String,
    pub version: String,
}

#[derive(Debug)]
pub struct Store {
    pub computers: Vec<Computer>,
    pub printers: Vec<Printer>,
    pub print_jobs: Vec<PrintJob>,
    pub tags: BTreeMap<String, String>,
    pub next_job_id: u64,
}

impl Store {
    /// Two computers, three printers, no jobs.
    pub fn seeded() -> Self {
        let desk = Computer {
            id: 1,
            name: "desk".to_string(),
            state: "connected".to_string(),
        };
        let warehouse = Computer {
            id: 2,
            name: "warehouse".to_string(),
            state: "disconnected".to_string(),
        };
        let printer = |id: u64, computer: &Computer, name: &str, default: bool| Printer {
            id,
            computer: computer.clone(),
            name: name.to_string(),
            default,
            state: "online".to_string(),
        };
        Self {
            printers: vec![
                printer(10, &desk, "laser", true),
                printer(11, &desk, "inkjet", false),
                printer(20, &warehouse, "label", true),
            ],
            computers: vec![desk, warehouse],
            print_jobs: Vec::new(),
            tags: BTreeMap::new(),
            next_job_id: 1000,
        }
    }
}

pub type Db = Arc<RwLock<Store>>;

type ApiResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::seeded()));
    Router::new()
        .route("/whoami", get(whoami))
        .route("/computers", get(list_computers))
        .route("/computers/{ids}", get(get_computers))
        .route("/computers/{ids}/printers", get(printers_of_computer))
        .route("/computers/{ids}/printers/{printers}", get(printer_set_of_computer))
        .route("/printers", get(list_printers))
        .route("/printers/{ids}", get(get_printers))
        .route("/printers/{ids}/printjobs", get(jobs_of_printer))
        .route("/printers/{ids}/printjobs/{jobs}", get(job_set_of_printer))
        .route("/printjobs", get(list_jobs).post(create_job))
        .route("/printjobs/states", get(all_states))
        .route("/printjobs/{ids}", get(get_jobs).delete(delete_jobs))
        .route("/printjobs/{ids}/states", get(job_states))
        .route("/account/tag", get(list_tags))
        .route(
            "/account/tag/{name}",
            get(get_tag).post(set_tag).delete(delete_tag),
        )
        .route("/account/", delete(delete_account))
        .route("/client/key/{uuid}", get(client_key))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn error(status: StatusCode, message: &str) -> (StatusCode, Json<Value>) {
    (
        status,
        Json(json!({ "code": status.canonical_reason(), "message": message })),
    )
}

fn authorize(headers: &HeaderMap) -> Result<(), (StatusCode, Json<Value>)> {
    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Basic "));
    if authorized {
        Ok(())
    } else {
        Err(error(StatusCode::UNAUTHORIZED, "API Key not found"))
    }
}

fn child_account(headers: &HeaderMap) -> Option<(String, String)> {
    CHILD_HEADERS.iter().find_map(|name| {
        let value = headers.get(*name)?.to_str().ok()?;
        Some((name.to_string(), value.to_string()))
    })
}

/// Parse `1`, `1,2` or `1-3` into the set of ids it names.
pub fn parse_ids(raw: &str) -> Result<Vec<u64>, (StatusCode, Json<Value>)> {
    let bad = || error(StatusCode::BAD_REQUEST, "invalid id set");
    let mut ids = Vec::new();
    for part in raw.split(',') {
        match part.split_once('-') {
            Some((start, end)) => {
                let start: u64 = start.parse().map_err(|_| bad())?;
                let end: u64 = end.parse().map_err(|_| bad())?;
                ids.extend(start..=end);
            }
            None => ids.push(part.parse().map_err(|_| bad())?),
        }
    }
    Ok(ids)
}

fn page<T: Serialize>(items: Vec<T>, paging: &Paging) -> Json<Value> {
    let items: Vec<T> = items.into_iter().skip(paging.offset).take(paging.limit).collect();
    Json(json!(items))
}

async fn whoami(headers: HeaderMap) -> ApiResult {
    authorize(&headers)?;
    let mut account = json!({
        "id": 433,
        "firstname": "Peter",
        "lastname": "Tuthill",
        "email": "peter@example.com",
        "canCreateSubAccounts": true,
        "credits": null,
        "numComputers": 2,
        "totalPrints": 0,
        "Tags": [],
        "ApiKeys": [],
        "state": "active",
        "permissions": ["Unrestricted"]
    });
    if let Some((header, value)) = child_account(&headers) {
        account["impersonatedVia"] = json!({ "header": header, "value": value });
    }
    Ok(Json(account))
}

async fn list_computers(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(paging): Query<Paging>,
) -> ApiResult {
    authorize(&headers)?;
    Ok(page(db.read().await.computers.clone(), &paging))
}

async fn get_computers(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(ids): Path<String>,
    Query(paging): Query<Paging>,
) -> ApiResult {
    authorize(&headers)?;
    let ids = parse_ids(&ids)?;
    let store = db.read().await;
    let found: Vec<Computer> = store
        .computers
        .iter()
        .filter(|c| ids.contains(&c.id))
        .cloned()
        .collect();
    Ok(page(found, &paging))
}

async fn printers_of_computer(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(ids): Path<String>,
    Query(paging): Query<Paging>,
) -> ApiResult {
    authorize(&headers)?;
    let ids = parse_ids(&ids)?;
    let store = db.read().await;
    let found: Vec<Printer> = store
        .printers
        .iter()
        .filter(|p| ids.contains(&p.computer.id))
        .cloned()
        .collect();
    Ok(page(found, &paging))
}

async fn printer_set_of_computer(
    State(db): State<Db>,
    headers: HeaderMap,
    Path((computers, printers)): Path<(String, String)>,
    Query(paging): Query<Paging>,
) -> ApiResult {
    authorize(&headers)?;
    let computers = parse_ids(&computers)?;
    let printers = parse_ids(&printers)?;
    let store = db.read().await;
    let found: Vec<Printer> = store
        .printers
        .iter()
        .filter(|p| computers.contains(&p.computer.id) && printers.contains(&p.id))
        .cloned()
        .collect();
    Ok(page(found, &paging))
}

async fn list_printers(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(paging): Query<Paging>,
) -> ApiResult {
    authorize(&headers)?;
    Ok(page(db.read().await.printers.clone(), &paging))
}

async fn get_printers(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(ids): Path<String>,
    Query(paging): Query<Paging>,
) -> ApiResult {
    authorize(&headers)?;
    let ids = parse_ids(&ids)?;
    let store = db.read().await;
    let found: Vec<Printer> = store
        .printers
        .iter()
        .filter(|p| ids.contains(&p.id))
        .cloned()
        .collect();
    if found.is_empty() {
        return Err(error(StatusCode::NOT_FOUND, "no printers found"));
    }
    Ok(page(found, &paging))
}

async fn jobs_of_printer(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(ids): Path<String>,
    Query(paging): Query<Paging>,
) -> ApiResult {
    authorize(&headers)?;
    let ids = parse_ids(&ids)?;
    let store = db.read().await;
    let found: Vec<PrintJob> = store
        .print_jobs
        .iter()
        .filter(|j| ids.contains(&j.printer.id))
        .cloned()
        .collect();
    Ok(page(found, &paging))
}

async fn job_set_of_printer(
    State(db): State<Db>,
    headers: HeaderMap,
    Path((printers, jobs)): Path<(String, String)>,
    Query(paging): Query<Paging>,
) -> ApiResult {
    authorize(&headers)?;
    let printers = parse_ids(&printers)?;
    let jobs = parse_ids(&jobs)?;
    let store = db.read().await;
    let found: Vec<PrintJob> = store
        .print_jobs
        .iter()
        .filter(|j| printers.contains(&j.printer.id) && jobs.contains(&j.id))
        .cloned()
        .collect();
    Ok(page(found, &paging))
}

async fn list_jobs(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(paging): Query<Paging>,
) -> ApiResult {
    authorize(&headers)?;
    Ok(page(db.read().await.print_jobs.clone(), &paging))
}

async fn create_job(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<CreatePrintJob>,
) -> ApiResult {
    authorize(&headers)?;
    let valid_types = ["pdf_uri", "pdf_base64", "raw_uri", "raw_base64"];
    if !valid_types.contains(&input.content_type.as_str()) || input.content.is_empty() {
        return Err(error(StatusCode::BAD_REQUEST, "invalid content"));
    }
    let mut store = db.write().await;
    let printer = store
        .printers
        .iter()
        .find(|p| p.id == input.printer_id)
        .cloned()
        .ok_or_else(|| error(StatusCode::BAD_REQUEST, "printer not found"))?;
    let id = store.next_job_id;
    store.next_job_id += 1;
    store.print_jobs.push(PrintJob {
        id,
        printer,
        title: input.title,
        content_type: input.content_type,
        source: input.source,
        state: "new".to_string(),
    });
    Ok(Json(json!(id)))
}

async fn get_jobs(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(ids): Path<String>,
    Query(paging): Query<Paging>,
) -> ApiResult {
    authorize(&headers)?;
    let ids = parse_ids(&ids)?;
    let store = db.read().await;
    let found: Vec<PrintJob> = store
        .print_jobs
        .iter()
        .filter(|j| ids.contains(&j.id))
        .cloned()
        .collect();
    Ok(page(found, &paging))
}

async fn delete_jobs(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(ids): Path<String>,
) -> ApiResult {
    authorize(&headers)?;
    let ids = parse_ids(&ids)?;
    let mut store = db.write().await;
    let deleted: Vec<u64> = store
        .print_jobs
        .iter()
        .filter(|j| ids.contains(&j.id))
        .map(|j| j.id)
        .collect();
    store.print_jobs.retain(|j| !ids.contains(&j.id));
    Ok(Json(json!(deleted)))
}

fn states_of(job: &PrintJob) -> Value {
    json!([
        {
            "printJobId": job.id,
            "state": "new",
            "message": null,
            "data": null,
            "clientVersion": null,
            "createTimestamp": "2015-11-16T23:14:12.354Z",
            "age": 0
        }
    ])
}

async fn all_states(State(db): State<Db>, headers: HeaderMap) -> ApiResult {
    authorize(&headers)?;
    let store = db.read().await;
    let states: Vec<Value> = store.print_jobs.iter().map(states_of).collect();
    Ok(Json(json!(states)))
}

async fn job_states(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(ids): Path<String>,
) -> ApiResult {
    authorize(&headers)?;
    let ids = parse_ids(&ids)?;
    let store = db.read().await;
    let states: Vec<Value> = store
        .print_jobs
        .iter()
        .filter(|j| ids.contains(&j.id))
        .map(states_of)
        .collect();
    Ok(Json(json!(states)))
}

async fn list_tags(State(db): State<Db>, headers: HeaderMap) -> ApiResult {
    authorize(&headers)?;
    let store = db.read().await;
    let tags: Vec<Value> = store
        .tags
        .iter()
        .map(|(name, value)| json!({ "name": name, "value": value }))
        .collect();
    Ok(Json(json!(tags)))
}

async fn get_tag(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> ApiResult {
    authorize(&headers)?;
    let store = db.read().await;
    let value = store
        .tags
        .get(&name)
        .ok_or_else(|| error(StatusCode::NOT_FOUND, "tag not found"))?;
    Ok(Json(json!({ "name": name, "value": value })))
}

async fn set_tag(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(name): Path<String>,
    Json(value): Json<Value>,
) -> ApiResult {
    authorize(&headers)?;
    let Value::String(value) = value else {
        return Err(error(StatusCode::BAD_REQUEST, "tag value must be a string"));
    };
    let created = db.write().await.tags.insert(name, value).is_none();
    Ok(Json(json!(if created { "Tag created" } else { "Tag updated" })))
}

async fn delete_tag(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> ApiResult {
    authorize(&headers)?;
    let removed = db.write().await.tags.remove(&name).is_some();
    Ok(Json(json!(removed)))
}

async fn delete_account(headers: HeaderMap) -> ApiResult {
    authorize(&headers)?;
    if child_account(&headers).is_none() {
        return Err(error(
            StatusCode::FORBIDDEN,
            "deleting an account requires a child account header",
        ));
    }
    Ok(Json(json!(true)))
}

async fn client_key(
    headers: HeaderMap,
    Path(uuid): Path<Uuid>,
    Query(query): Query<KeyQuery>,
) -> ApiResult {
    authorize(&headers)?;
    let key = format!("ck-{}-{}-{}", query.edition, query.version, uuid.simple());
    Ok(Json(json!(key)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ids_accepts_lists_and_ranges() {
        assert_eq!(parse_ids("5").unwrap(), vec![5]);
        assert_eq!(parse_ids("1,3").unwrap(), vec![1, 3]);
        assert_eq!(parse_ids("2-4,9").unwrap(), vec![2, 3, 4, 9]);
        assert!(parse_ids("abc").is_err());
        assert!(parse_ids("1-").is_err());
    }

    #[test]
    fn seeded_store_links_printers_to_computers() {
        let store = Store::seeded();
        assert_eq!(store.computers.len(), 2);
        assert_eq!(store.printers.len(), 3);
        assert!(store.printers.iter().all(|p| p.computer.id == 1 || p.computer.id == 2));
    }

    #[test]
    fn print_job_serializes_camel_case() {
        let store = Store::seeded();
        let job = PrintJob {
            id: 1,
            printer: store.printers[0].clone(),
            title: "t".to_string(),
            content_type: "pdf_uri".to_string(),
            source: "s".to_string(),
            state: "new".to_string(),
        };
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["contentType"], "pdf_uri");
        assert_eq!(json["printer"]["computer"]["id"], 1);
    }

    #[test]
    fn create_print_job_requires_printer_id() {
        let result: Result<CreatePrintJob, _> =
            serde_json::from_str(r#"{"contentType":"pdf_uri","content":"x"}"#);
        assert!(result.is_err());
    }
}
