//! Tests for MessageClient and MessageExternal against an in-process message service.

use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use provider_dummymessageservice::controllers::message_controller::delete_external;
use provider_dummymessageservice::crds::common::{DeletionPolicy, ProviderConfigReference};
use provider_dummymessageservice::crds::message::{
    Message, MessageObservation, MessageParameters, MessageSpec, MessageStatus,
};
use provider_dummymessageservice::error::OperatorError;
use provider_dummymessageservice::external::{ExternalClient, MessageExternal};
use provider_dummymessageservice::message_client::{MessageClient, StoredMessage};

#[derive(Default)]
struct Store {
    next_id: i64,
    messages: Vec<StoredMessage>,
    /// Recorded (method, path-and-query) pairs.
    requests: Vec<(String, String)>,
}

/// A minimal message service: an in-memory list behind the three endpoints.
///
/// With `fixed_body` set, every request is answered with that body instead.
struct MockService {
    port: u16,
    store: Arc<Mutex<Store>>,
}

impl MockService {
    async fn start() -> Self {
        Self::spawn(None).await
    }

    async fn start_fixed(body: &'static str) -> Self {
        Self::spawn(Some(body)).await
    }

    async fn spawn(fixed_body: Option<&'static str>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let store = Arc::new(Mutex::new(Store::default()));
        let shared = store.clone();

        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    break;
                };
                let store = shared.clone();

                tokio::spawn(async move {
                    let mut buf = vec![0u8; 8192];
                    let n = match stream.read(&mut buf).await {
                        Ok(n) if n > 0 => n,
                        _ => return,
                    };
                    let request_str = String::from_utf8_lossy(&buf[..n]).to_string();

                    let first_line = request_str.lines().next().unwrap_or("");
                    let parts: Vec<&str> = first_line.split_whitespace().collect();
                    let method = parts.first().unwrap_or(&"GET").to_string();
                    let target = parts.get(1).unwrap_or(&"/").to_string();

                    let (status, body) = {
                        let mut store = store.lock().await;
                        store.requests.push((method.clone(), target.clone()));
                        match fixed_body {
                            Some(b) => ("200 OK", b.to_string()),
                            None => handle(&mut store, &method, &target),
                        }
                    };

                    let http_response = format!(
                        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    let _ = stream.write_all(http_response.as_bytes()).await;
                });
            }
        });

        Self { port, store }
    }

    fn url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    fn client(&self) -> MessageClient {
        MessageClient::new(&self.url()).unwrap()
    }

    async fn recorded(&self) -> Vec<(String, String)> {
        self.store.lock().await.requests.clone()
    }

    async fn stored(&self) -> Vec<StoredMessage> {
        self.store.lock().await.messages.clone()
    }
}

fn handle(store: &mut Store, method: &str, target: &str) -> (&'static str, String) {
    let (path, query) = target.split_once('?').unwrap_or((target, ""));
    match (method, path) {
        ("GET", "/messages") => (
            "200 OK",
            serde_json::json!({ "messages": store.messages }).to_string(),
        ),
        ("POST", "/message") => match query_param(query, "content") {
            Some(content) => {
                let msg = StoredMessage {
                    id: store.next_id,
                    content,
                };
                store.next_id += 1;
                store.messages.push(msg.clone());
                ("200 OK", serde_json::to_string(&msg).unwrap())
            }
            None => ("422 Unprocessable Entity", r#"{"detail":"content"}"#.into()),
        },
        ("DELETE", "/message") => {
            let id: Option<i64> = query_param(query, "id_").and_then(|v| v.parse().ok());
            match id {
                Some(id) if store.messages.iter().any(|m| m.id == id) => {
                    store.messages.retain(|m| m.id != id);
                    ("200 OK", r#"{"status":"deleted"}"#.into())
                }
                Some(_) => ("404 Not Found", r#"{"detail":"Message not found"}"#.into()),
                None => ("422 Unprocessable Entity", r#"{"detail":"id_"}"#.into()),
            }
        }
        _ => ("404 Not Found", r#"{"detail":"Not Found"}"#.into()),
    }
}

fn query_param(query: &str, key: &str) -> Option<String> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| percent_decode(v))
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap();
                out.push(u8::from_str_radix(hex, 16).unwrap());
                i += 2;
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8(out).unwrap()
}

fn message(content: &str) -> Message {
    Message::new(
        "test-message",
        MessageSpec {
            for_provider: MessageParameters {
                content: content.into(),
            },
            provider_config_ref: ProviderConfigReference::default(),
            deletion_policy: DeletionPolicy::Delete,
        },
    )
}

fn with_observed_id(mut mg: Message, id: i64) -> Message {
    mg.status = Some(MessageStatus {
        at_provider: MessageObservation {
            id: Some(id),
            content: Some(mg.desired_content().to_string()),
        },
        conditions: vec![],
    });
    mg
}

// ========== MessageClient ==========

#[tokio::test]
async fn test_observe_empty_store() {
    let server = MockService::start().await;
    let client = server.client();

    assert!(client.observe("persist this").await.unwrap().is_none());
    assert!(client.observe("").await.unwrap().is_none());

    let reqs = server.recorded().await;
    assert_eq!(reqs[0], ("GET".to_string(), "/messages".to_string()));
}

#[tokio::test]
async fn test_create_then_observe() {
    let server = MockService::start().await;
    let client = server.client();

    let created = client.create("persist this").await.unwrap();
    assert_eq!(created.id, 0);
    assert_eq!(created.content, "persist this");

    let observed = client.observe("persist this").await.unwrap();
    assert_eq!(observed, Some(created));
}

#[tokio::test]
async fn test_create_url_encodes_content() {
    let server = MockService::start().await;
    let client = server.client();

    let content = "a&b=c d/é?";
    let created = client.create(content).await.unwrap();
    assert_eq!(created.content, content);

    let reqs = server.recorded().await;
    assert_eq!(reqs[0].0, "POST");
    assert!(reqs[0].1.starts_with("/message?content="));
    assert!(!reqs[0].1.contains(' '));
    assert_eq!(server.stored().await[0].content, content);
}

#[tokio::test]
async fn test_delete_then_observe() {
    let server = MockService::start().await;
    let client = server.client();

    let created = client.create("short lived").await.unwrap();
    client.delete(created.id).await.unwrap();

    assert!(client.observe("short lived").await.unwrap().is_none());

    let reqs = server.recorded().await;
    assert_eq!(reqs[1], ("DELETE".to_string(), format!("/message?id_={}", created.id)));
}

#[tokio::test]
async fn test_delete_leaves_other_messages() {
    let server = MockService::start().await;
    let client = server.client();

    let first = client.create("one").await.unwrap();
    client.create("two").await.unwrap();
    client.delete(first.id).await.unwrap();

    let remaining = client.list_messages().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].content, "two");
}

#[tokio::test]
async fn test_delete_unknown_id_succeeds() {
    let server = MockService::start().await;
    let client = server.client();
    client.create("bystander").await.unwrap();

    client.delete(41).await.unwrap();

    assert_eq!(client.list_messages().await.unwrap().len(), 1);
    let reqs = server.recorded().await;
    assert_eq!(reqs[1], ("DELETE".to_string(), "/message?id_=41".to_string()));
}

#[tokio::test]
async fn test_malformed_list_is_an_error() {
    let server = MockService::start_fixed("not json").await;
    let client = server.client();

    let result = client.observe("anything").await;
    assert!(matches!(result, Err(OperatorError::Serialization(_))));
}

#[tokio::test]
async fn test_list_without_messages_field_is_an_error() {
    let server = MockService::start_fixed(r#"{"items":[]}"#).await;
    let result = server.client().observe("anything").await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_malformed_create_response_is_an_error() {
    let server = MockService::start_fixed(r#"{"id":"#).await;
    let result = server.client().create("hello").await;
    assert!(matches!(result, Err(OperatorError::Serialization(_))));
}

#[tokio::test]
async fn test_unknown_endpoint_status_is_an_error() {
    let server = MockService::start().await;
    let client = MessageClient::new(&format!("{}/prefix", server.url())).unwrap();

    let result = client.list_messages().await;
    match result {
        Err(e @ OperatorError::MessageService(_)) => assert!(e.is_transient()),
        other => panic!("expected MessageService error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unreachable_service_is_an_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let result = MessageClient::new(&url).unwrap().observe("x").await;
    assert!(matches!(result, Err(OperatorError::Http(_))));
}

// ========== MessageExternal ==========

#[tokio::test]
async fn test_external_lifecycle() {
    let server = MockService::start().await;
    let external = MessageExternal::new(server.client());
    let mg = message("persist this");

    let obs = external.observe(&mg).await.unwrap();
    assert!(!obs.resource_exists);
    assert!(obs.observed.is_none());

    let creation = external.create(&mg).await.unwrap();
    let id = creation.observed.id.unwrap();
    assert_eq!(creation.observed.content.as_deref(), Some("persist this"));

    let obs = external.observe(&mg).await.unwrap();
    assert!(obs.resource_exists);
    assert!(obs.resource_up_to_date);
    assert_eq!(obs.observed.unwrap().id, Some(id));

    external.update(&mg).await.unwrap();

    external.delete(&with_observed_id(mg.clone(), id)).await.unwrap();
    let obs = external.observe(&mg).await.unwrap();
    assert!(!obs.resource_exists);
}

#[tokio::test]
async fn test_external_update_issues_no_request() {
    let server = MockService::start().await;
    let external = MessageExternal::new(server.client());

    external.update(&message("anything")).await.unwrap();
    assert!(server.recorded().await.is_empty());
}

#[tokio::test]
async fn test_external_delete_without_id_looks_up_by_content() {
    let server = MockService::start().await;
    let client = server.client();
    client.create("keep").await.unwrap();
    let target = client.create("remove me").await.unwrap();

    let external = MessageExternal::new(client.clone());
    external.delete(&message("remove me")).await.unwrap();

    let remaining = client.list_messages().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert!(remaining.iter().all(|m| m.id != target.id));
}

#[tokio::test]
async fn test_external_delete_with_stale_id_succeeds() {
    let server = MockService::start().await;
    let external = MessageExternal::new(server.client());

    let mg = with_observed_id(message("removed out of band"), 7);
    external.delete(&mg).await.unwrap();

    let reqs = server.recorded().await;
    assert_eq!(reqs, vec![("DELETE".to_string(), "/message?id_=7".to_string())]);
}

#[tokio::test]
async fn test_external_delete_of_absent_message_succeeds() {
    let server = MockService::start().await;
    let external = MessageExternal::new(server.client());

    external.delete(&message("never created")).await.unwrap();

    let reqs = server.recorded().await;
    assert_eq!(reqs.len(), 1);
    assert_eq!(reqs[0].0, "GET");
}

#[tokio::test]
async fn test_external_observe_malformed_json_is_not_a_result() {
    let server = MockService::start_fixed("<html>oops</html>").await;
    let external = MessageExternal::new(server.client());

    assert!(external.observe(&message("x")).await.is_err());
}

// ========== Deletion flow ==========

#[tokio::test]
async fn test_deleting_message_removed_out_of_band_completes() {
    let server = MockService::start().await;
    let external = MessageExternal::new(server.client());
    let mg = with_observed_id(message("removed out of band"), 7);

    let issued = delete_external(&external, &mg).await.unwrap();

    assert!(!issued);
    let reqs = server.recorded().await;
    assert_eq!(reqs, vec![("GET".to_string(), "/messages".to_string())]);
}

#[tokio::test]
async fn test_deleting_message_recreated_under_new_id() {
    let server = MockService::start().await;
    let client = server.client();
    client.create("placeholder").await.unwrap();
    let current = client.create("recreated").await.unwrap();

    let external = MessageExternal::new(client.clone());
    let mg = with_observed_id(message("recreated"), 0);
    assert!(delete_external(&external, &mg).await.unwrap());

    let remaining = client.list_messages().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].content, "placeholder");
    assert!(remaining.iter().all(|m| m.id != current.id));
}
