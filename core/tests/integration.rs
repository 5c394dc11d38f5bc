//! End-to-end tests against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then drives the client through
//! `UreqTransport` over real HTTP. Validates request building, raw response
//! framing and entity decoding together.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use printnode_core::{
    ApiError, ApiKey, ClientConfig, EntityKind, PrintJob, PrintNodeClient, ResourceId, Tag,
};
use serde_json::{json, Value};

fn start_server() -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
    });
    addr
}

fn client(addr: SocketAddr) -> PrintNodeClient {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
    let config = ClientConfig::default().with_base_url(format!("http://{addr}/"));
    PrintNodeClient::new(&ApiKey::new("test-key"), config).unwrap()
}

#[test]
fn read_computers_and_printers() {
    let client = client(start_server());

    let whoami = client.get_whoami().unwrap();
    assert_eq!(whoami.id, Some(433));
    assert_eq!(whoami.num_computers, Some(2));

    let computers = client.get_computers(None).unwrap();
    let ids: Vec<_> = computers.iter().filter_map(|c| c.id).collect();
    assert_eq!(ids, vec![1, 2]);

    let printers = client.get_printers_of_computer(&ResourceId::from(1u64), None).unwrap();
    assert_eq!(printers.len(), 2);
    assert!(printers
        .iter()
        .all(|p| p.computer.as_ref().and_then(|c| c.id) == Some(1)));

    let one = client.get_printers(Some(&ResourceId::from("20"))).unwrap();
    assert_eq!(one[0].name.as_deref(), Some("label"));
}

#[test]
fn paging_is_sent_on_every_read() {
    let mut client = client(start_server());
    client.set_offset(1).unwrap();
    client.set_limit("1").unwrap();

    let computers = client.get_computers(None).unwrap();
    assert_eq!(computers.len(), 1);
    assert_eq!(computers[0].id, Some(2));
}

#[test]
fn http_failure_keeps_the_response() {
    let client = client(start_server());

    let err = client.get_printers(Some(&ResourceId::from(999u64))).unwrap_err();
    assert_eq!(err.status(), Some(404));
    let body: Value = err.response().unwrap().json().unwrap();
    assert_eq!(body["message"], "no printers found");
}

#[test]
fn dynamic_calls_resolve_through_the_registry() {
    let client = client(start_server());

    let entities = client
        .call("Printers", &[json!(1), json!("11")])
        .unwrap()
        .into_entities()
        .unwrap();
    assert_eq!(entities.len(), 1);
    assert_eq!(entities[0].kind(), EntityKind::Printer);

    let err = client.call("Scanners", &[]).unwrap_err();
    assert!(matches!(err, ApiError::UnknownOperation(_)));

    let raw = client
        .call(
            "ClientKey",
            &[
                json!("0a756864-602e-428f-a90b-6a5d6a9a2c3b"),
                json!("printnode"),
                json!("4.7.1"),
            ],
        )
        .unwrap()
        .into_raw()
        .unwrap();
    assert_eq!(raw.status, 200);
    let key: String = raw.json().unwrap();
    assert_eq!(key, "ck-printnode-4.7.1-0a756864602e428fa90b6a5d6a9a2c3b");
}

#[test]
fn print_job_lifecycle() {
    let client = client(start_server());

    let job = PrintJob {
        printer_id: Some(10),
        title: Some("invoice".to_string()),
        content_type: Some("pdf_uri".to_string()),
        content: Some("https://example.com/invoice.pdf".to_string()),
        source: Some("integration".to_string()),
        ..Default::default()
    };
    let id: u64 = client.create(&job).unwrap().json().unwrap();

    let jobs = client.get_print_jobs_of_printer(&ResourceId::from(10u64), None).unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].id, Some(id));
    assert_eq!(jobs[0].title.as_deref(), Some("invoice"));

    let states = client.get_print_job_states(Some(&ResourceId::from(id))).unwrap();
    assert_eq!(states.len(), 1);
    assert_eq!(states[0].print_job_id, Some(id));
    assert_eq!(states[0].state.as_deref(), Some("new"));

    let fetched = client.get_print_jobs(Some(&ResourceId::from(id))).unwrap();
    let deleted: Vec<u64> = client.remove(&fetched[0]).unwrap().json().unwrap();
    assert_eq!(deleted, vec![id]);

    assert!(client.get_print_jobs(None).unwrap().is_empty());
}

#[test]
fn tag_lifecycle() {
    let client = client(start_server());

    let tag = Tag {
        name: "site".to_string(),
        value: Some("leeds".to_string()),
    };
    let message: String = client.create(&tag).unwrap().json().unwrap();
    assert_eq!(message, "Tag created");

    let tags = client.get_tags(Some(&ResourceId::from("site"))).unwrap();
    assert_eq!(tags, vec![tag]);

    let removed: bool = client.delete_tag("site").unwrap().json().unwrap();
    assert!(removed);
    assert!(client.get_tags(None).unwrap().is_empty());
}

#[test]
fn impersonation_reaches_the_server() {
    let mut client = client(start_server());

    let err = client.delete_account().unwrap_err();
    assert!(matches!(err, ApiError::PreconditionFailed(_)));

    client.impersonate_by_creator_ref("shop-17");
    let whoami = client
        .call("Whoami", &[])
        .unwrap()
        .into_entities()
        .unwrap();
    assert_eq!(whoami.len(), 1);
    assert!(client.delete_account().unwrap().is_ok());

    client.clear_impersonation();
    assert!(client.context().child_account().is_none());
}

#[test]
fn unreachable_server_is_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(addr).get_computers(None).unwrap_err();
    assert!(matches!(err, ApiError::TransportError(_)));
}

#[test]
fn silent_server_times_out_as_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    // Accept connections and never answer.
    std::thread::spawn(move || {
        let mut held = Vec::new();
        for stream in listener.incoming() {
            held.push(stream);
        }
    });

    let config = ClientConfig::default()
        .with_base_url(format!("http://{addr}"))
        .with_timeout(Duration::from_secs(1));
    let client = PrintNodeClient::new(&ApiKey::new("test-key"), config).unwrap();

    let started = Instant::now();
    let err = client.get_computers(None).unwrap_err();
    assert!(matches!(err, ApiError::TransportError(_)), "{err}");
    assert!(started.elapsed() < Duration::from_secs(5));
}
