//! End-to-end tests for the live-update HTTP transport.
//!
//! A real listener is bound on an ephemeral port and driven with raw
//! HTTP/1.1 requests.

use peekprof::server::start_server;
use peekprof::LiveBroker;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

async fn send_request(addr: std::net::SocketAddr, path: &str) -> TcpStream {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "GET {path} HTTP/1.1\r\nHost: {addr}\r\nAccept: text/event-stream\r\nConnection: close\r\n\r\n"
    );
    stream.write_all(request.as_bytes()).await.unwrap();
    stream
}

/// Reads from `stream` until `needle` shows up in the accumulated text.
async fn read_until(stream: &mut TcpStream, buf: &mut String, needle: &str) {
    let mut chunk = [0u8; 1024];
    while !buf.contains(needle) {
        let n = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut chunk))
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {needle:?}, got {buf:?}"))
            .unwrap();
        assert!(n > 0, "connection closed before {needle:?}, got {buf:?}");
        buf.push_str(&String::from_utf8_lossy(&chunk[..n]));
    }
}

#[tokio::test]
async fn test_viewer_receives_published_sample() {
    let token = CancellationToken::new();
    let (broker, broker_task) = LiveBroker::spawn(16, 16, token.clone());
    let server = start_server("127.0.0.1:0", broker.clone(), token.clone())
        .await
        .unwrap();
    let addr = server.local_addr();

    let mut stream = send_request(addr, "/process/updates").await;
    let mut response = String::new();
    read_until(&mut stream, &mut response, "\r\n\r\n").await;

    let head = response.to_ascii_lowercase();
    assert!(head.starts_with("http/1.1 200"));
    assert!(head.contains("content-type: text/event-stream"));
    assert!(head.contains("cache-control: no-cache"));
    assert!(head.contains("access-control-allow-origin: *"));

    // Headers may be flushed before the registration lands.
    for _ in 0..100 {
        if broker.subscriber_count().await.unwrap() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(broker.subscriber_count().await.unwrap(), 1);

    let payload = r#"{"memoryResident":2048,"memorySwap":2048,"cpuPercent":1.5}"#;
    broker.publish(Arc::from(payload)).await.unwrap();
    read_until(&mut stream, &mut response, &format!("data: {payload}")).await;

    token.cancel();
    let mut rest = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut rest))
        .await
        .expect("stream ends after cancellation")
        .unwrap();

    server.drain(Duration::from_secs(2)).await.unwrap();
    broker_task.await.unwrap();
}

#[tokio::test]
async fn test_health_reports_viewer_count() {
    let token = CancellationToken::new();
    let (broker, _broker_task) = LiveBroker::spawn(16, 16, token.clone());
    let server = start_server("127.0.0.1:0", broker.clone(), token.clone())
        .await
        .unwrap();

    let _viewer = broker.register().await.unwrap();

    let mut stream = send_request(server.local_addr(), "/health").await;
    let mut response = String::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_string(&mut response))
        .await
        .unwrap()
        .unwrap();

    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.contains("viewers: 1"));

    token.cancel();
    server.drain(Duration::from_secs(2)).await.unwrap();
}

#[tokio::test]
async fn test_unknown_path_is_not_found() {
    let token = CancellationToken::new();
    let (broker, _broker_task) = LiveBroker::spawn(16, 16, token.clone());
    let server = start_server("127.0.0.1:0", broker, token.clone())
        .await
        .unwrap();

    let mut stream = send_request(server.local_addr(), "/metrics").await;
    let mut response = String::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_string(&mut response))
        .await
        .unwrap()
        .unwrap();
    assert!(response.starts_with("HTTP/1.1 404"));

    token.cancel();
    server.drain(Duration::from_secs(2)).await.unwrap();
}
