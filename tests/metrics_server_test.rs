//! Metrics Server Integration Tests
//!
//! Tests for Prometheus metrics HTTP endpoint.

use smslog_receiver::metrics;
use smslog_receiver::metrics::server::MetricsServer;
use std::time::Duration;

async fn get(addr: std::net::SocketAddr, path: &str) -> reqwest::Response {
    reqwest::Client::new()
        .get(format!("http://{}{}", addr, path))
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .expect("Should connect to metrics server")
}

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_format() {
    let mut server = MetricsServer::new("127.0.0.1:0");
    let addr = server.start().await.expect("Server should start");

    metrics::record_upload("stored", 0.002);
    metrics::record_stored_bytes(2048);
    metrics::record_upload("no_file", 0.001);
    metrics::record_error("storage");

    let response = get(addr, "/metrics").await;
    assert!(response.status().is_success());

    let content_type = response
        .headers()
        .get("content-type")
        .expect("Should have content-type")
        .to_str()
        .unwrap()
        .to_string();
    assert!(
        content_type.contains("text/plain"),
        "Content-Type should be Prometheus text format"
    );

    let body = response.text().await.unwrap();
    assert!(body.contains("smslog_uploads_total"));
    assert!(body.contains("outcome=\"stored\""));
    assert!(body.contains("smslog_upload_bytes_total"));
    assert!(body.contains("smslog_upload_duration_seconds"));
    assert!(body.contains("smslog_errors_total"));

    server.shutdown().await;
}

#[tokio::test]
async fn test_health_endpoint() {
    let mut server = MetricsServer::new("127.0.0.1:0");
    let addr = server.start().await.expect("Server should start");

    let response = get(addr, "/health").await;
    assert!(response.status().is_success());
    assert_eq!(response.text().await.unwrap(), "ok");

    server.shutdown().await;
}

#[tokio::test]
async fn test_unknown_endpoint_returns_404() {
    let mut server = MetricsServer::new("127.0.0.1:0");
    let addr = server.start().await.expect("Server should start");

    let response = get(addr, "/unknown").await;
    assert_eq!(response.status().as_u16(), 404);

    server.shutdown().await;
}
