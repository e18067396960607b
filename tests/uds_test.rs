//! Unix domain socket addressing through the hyper backend.

#![cfg(all(unix, feature = "hyper"))]

use apiclient::prelude::*;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixListener;
use tokio::sync::oneshot;

/// Answer one request on `listener` with a JSON body and report the request head.
fn serve_once(listener: UnixListener, body: &'static str) -> oneshot::Receiver<String> {
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut head = Vec::new();
        let mut buf = [0u8; 1024];
        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            head.extend_from_slice(&buf[..n]);
        }
        let response = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.shutdown().await.unwrap();
        let _ = tx.send(String::from_utf8_lossy(&head).into_owned());
    });
    rx
}

#[tokio::test]
async fn uds_root_routes_through_socket() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("daemon.sock");
    let listener = UnixListener::bind(&socket).unwrap();
    let head = serve_once(listener, r#"{"ApiVersion":"1.43"}"#);

    let client = Client::new(format!("uds://{}", socket.display())).unwrap();
    assert_eq!(client.root(), "http://socket");
    assert_eq!(client.backend_name(), "hyper");

    let res = client.api().at("version").call().await.unwrap();
    assert_eq!(res.as_json(), Some(&json!({"ApiVersion": "1.43"})));

    let head = head.await.unwrap().to_lowercase();
    assert!(head.starts_with("get /version http/1.1\r\n"));
    assert!(head.contains("host: socket\r\n"));
}

#[tokio::test]
async fn uds_option_with_explicit_backend() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("api.sock");
    let listener = UnixListener::bind(&socket).unwrap();
    let head = serve_once(listener, r#"{"created":true}"#);

    let client = Client::builder()
        .uds(&socket)
        .backend("hyper")
        .build()
        .unwrap();

    let res = client
        .api()
        .at("containers")
        .at("create")
        .at("post")
        .call()
        .body(json!({"Image": "alpine"}))
        .await
        .unwrap();
    assert_eq!(res.as_json(), Some(&json!({"created": true})));

    let head = head.await.unwrap().to_lowercase();
    assert!(head.starts_with("post /containers/create http/1.1\r\n"));
    assert!(head.contains("content-type: application/json\r\n"));
}

#[tokio::test]
async fn missing_socket_is_backend_error() {
    let dir = tempfile::tempdir().unwrap();
    let client = Client::new(format!("uds://{}", dir.path().join("none.sock").display())).unwrap();
    let err = client.api().at("version").call().await.unwrap_err();
    assert!(err.is_backend_error());
}
