use std::sync::Arc;
use std::time::Duration;

use wiremock::matchers::{body_string, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sift_core::{
    Adapter, Client, Endpoint, ErrorKind, ParallelExecution, PingQuery, Request, SelectQuery,
    UpdateQuery,
};
use sift_http::ReqwestAdapter;

fn endpoint(server: &MockServer, key: &str) -> Endpoint {
    let address = server.address();
    Endpoint::new(key)
        .with_host(address.ip().to_string())
        .with_port(address.port())
        .with_core("books")
}

// The blocking client must be created and dropped outside the runtime.
fn client(endpoint: Endpoint) -> Client {
    let mut client = Client::new(ReqwestAdapter::with_default_timeout().unwrap());
    client.add_endpoint(endpoint).unwrap();
    client
}

#[tokio::test]
async fn test_select_round_trip() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/solr/books/select"))
        .and(query_param("q", "title:rust"))
        .and(query_param("rows", "5"))
        .and(query_param("wt", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "responseHeader": {"status": 0, "QTime": 3},
            "response": {
                "numFound": 2,
                "start": 0,
                "docs": [{"id": "1", "title": "Rust"}, {"id": "2", "title": "Rust II"}]
            }
        })))
        .mount(&server)
        .await;

    let endpoint = endpoint(&server, "local");
    let (num_found, titles) = tokio::task::spawn_blocking(move || {
        let client = client(endpoint);
        let result = client
            .select(SelectQuery::new().with_query("title:rust").with_rows(5))
            .unwrap();
        let titles: Vec<String> = result
            .documents()
            .unwrap()
            .iter()
            .map(|d| d.get_as::<String>("title").unwrap().unwrap())
            .collect();
        (result.num_found().unwrap(), titles)
    })
    .await
    .unwrap();

    assert_eq!(num_found, Some(2));
    assert_eq!(titles, vec!["Rust", "Rust II"]);
}

#[tokio::test]
async fn test_update_posts_json_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/solr/books/update"))
        .and(header("content-type", "application/json"))
        .and(body_string(r#"{"delete":{"id":"7"},"commit":{}}"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "responseHeader": {"status": 0, "QTime": 12}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let endpoint = endpoint(&server, "local");
    let query_time = tokio::task::spawn_blocking(move || {
        let client = client(endpoint);
        let mut update = UpdateQuery::new();
        update.add_delete_by_id("7").add_commit(None, None, None);
        client.update(update).unwrap().query_time().unwrap()
    })
    .await
    .unwrap();

    assert_eq!(query_time, Some(12));
}

#[tokio::test]
async fn test_error_status_becomes_http_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/solr/books/admin/ping"))
        .respond_with(ResponseTemplate::new(500).set_body_string("core is down"))
        .mount(&server)
        .await;

    let endpoint = endpoint(&server, "local");
    let err = tokio::task::spawn_blocking(move || client(endpoint).ping().unwrap_err())
        .await
        .unwrap();

    assert_eq!(err.kind(), ErrorKind::Http);
    assert_eq!(err.status(), Some(500));
    match err {
        sift_core::Error::Http { body, .. } => assert_eq!(body, "core is down"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_basic_auth_is_sent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "responseHeader": {"status": 0, "QTime": 0},
            "status": "OK"
        })))
        .mount(&server)
        .await;

    let endpoint = endpoint(&server, "secured").with_credentials("solr", "SolrRocks");
    let response = tokio::task::spawn_blocking(move || {
        let adapter = ReqwestAdapter::with_default_timeout().unwrap();
        adapter
            .send(&Request::get("admin/ping").with_param("wt", "json"), &endpoint)
            .unwrap()
    })
    .await
    .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.body["status"], "OK");
}

#[tokio::test]
async fn test_endpoint_timeout_overrides_client_timeout() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(2))
                .set_body_json(serde_json::json!({})),
        )
        .mount(&server)
        .await;

    let endpoint = endpoint(&server, "slow").with_timeout(Duration::from_millis(200));
    let err = tokio::task::spawn_blocking(move || {
        let adapter = ReqwestAdapter::with_default_timeout().unwrap();
        adapter
            .send(&Request::get("select"), &endpoint)
            .unwrap_err()
    })
    .await
    .unwrap();

    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(err.to_string().contains("timed out"));
}

#[tokio::test]
async fn test_parallel_execution_joins_all_results() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/solr/books/select"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(100))
                .set_body_json(serde_json::json!({
                    "responseHeader": {"status": 0, "QTime": 1},
                    "response": {"numFound": 9, "start": 0, "docs": []}
                })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/solr/books/admin/ping"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let endpoint = endpoint(&server, "local");
    let results = tokio::task::spawn_blocking(move || {
        let client = client(endpoint);
        let mut batch = ParallelExecution::new(&client);
        for key in ["a", "b", "c"] {
            batch.add_query(key, Arc::new(SelectQuery::new())).unwrap();
        }
        batch.add_query("ping", Arc::new(PingQuery::new())).unwrap();
        batch
            .execute()
            .unwrap()
            .into_iter()
            .map(|(key, result)| (key, result.map(|r| r.num_found().unwrap())))
            .collect::<Vec<_>>()
    })
    .await
    .unwrap();

    assert_eq!(results.len(), 4);
    for (key, result) in &results {
        match key.as_str() {
            "ping" => assert_eq!(result.as_ref().unwrap_err().status(), Some(503)),
            _ => assert_eq!(*result.as_ref().unwrap(), Some(9)),
        }
    }
}
