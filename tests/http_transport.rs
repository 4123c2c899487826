//! reqwest-backed fetcher against a local mock server.

use std::sync::Arc;

use mockito::Server;
use netfirst_cache::cache::MemoryStorage;
use netfirst_cache::host::ClientRegistry;
use netfirst_cache::http::{HeaderName, HeaderValue, Request};
use netfirst_cache::transport::{Fetcher, HttpTransport};
use netfirst_cache::{AgentConfig, CacheInterceptor, ServiceWorker};

#[tokio::test]
async fn test_fetch_maps_status_headers_and_body() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/index.html")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body("<html>gym</html>")
        .create_async()
        .await;

    let transport = HttpTransport::new().unwrap();
    let req = Request::get(&format!("{}/index.html", server.url())).unwrap();
    let resp = transport.fetch(&req).await.unwrap();

    mock.assert_async().await;
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.status_text(), "OK");
    assert_eq!(resp.content_type(), Some("text/html"));
    assert_eq!(resp.text(), "<html>gym</html>");
}

#[tokio::test]
async fn test_request_headers_are_forwarded() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/sets")
        .match_header("accept", "application/json")
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;

    let transport = HttpTransport::new().unwrap();
    let req = Request::get(&format!("{}/api/sets", server.url()))
        .unwrap()
        .with_header(
            HeaderName::from_static("accept"),
            HeaderValue::from_static("application/json"),
        );
    let resp = transport.fetch(&req).await.unwrap();

    mock.assert_async().await;
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_error_status_is_a_successful_fetch() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/gone")
        .with_status(404)
        .create_async()
        .await;

    let transport = HttpTransport::new().unwrap();
    let req = Request::get(&format!("{}/gone", server.url())).unwrap();
    let resp = transport.fetch(&req).await.unwrap();
    assert_eq!(resp.status(), 404);
    assert_eq!(resp.status_text(), "Not Found");
}

#[tokio::test]
async fn test_refused_connection_is_rejected() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let transport = HttpTransport::new().unwrap();
    let req = Request::get(&format!("http://{}/", addr)).unwrap();
    assert!(transport.fetch(&req).await.is_err());
}

#[tokio::test]
async fn test_agent_installs_manifest_over_http() {
    let mut server = Server::new_async().await;
    let mut mocks = Vec::new();
    for (path, body) in [
        ("/", "root"),
        ("/index.html", "index"),
        ("/manifest.json", "{}"),
    ] {
        mocks.push(
            server
                .mock("GET", path)
                .with_status(200)
                .with_body(body)
                .create_async()
                .await,
        );
    }

    let origin = url::Url::parse(&format!("{}/", server.url())).unwrap();
    let agent = CacheInterceptor::new(
        AgentConfig::default().with_origin(origin),
        Arc::new(HttpTransport::new().unwrap()),
        Arc::new(MemoryStorage::new()),
        Arc::new(ClientRegistry::new()),
    )
    .unwrap();
    agent.on_install().await.unwrap();
    agent.on_activate().await.unwrap();
    for mock in &mocks {
        mock.assert_async().await;
    }

    let index = agent.cached("/index.html").await.unwrap().unwrap();
    assert_eq!(index.status(), 200);
    assert_eq!(index.text(), "index");
}
