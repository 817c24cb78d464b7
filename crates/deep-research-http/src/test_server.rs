//! One-shot HTTP/1.1 upstream for exercising the reqwest paths.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Serve one connection: write each part with a short pause between them,
/// then close. The handle yields the raw request text.
pub async fn serve_once(parts: Vec<Vec<u8>>) -> (String, JoinHandle<String>) {
    serve(parts, false).await
}

/// Like [`serve_once`] but keeps the connection open after the last part.
pub async fn serve_and_hold(parts: Vec<Vec<u8>>) -> (String, JoinHandle<String>) {
    serve(parts, true).await
}

/// Base URL of a port nothing is listening on.
pub async fn serve_refused() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("listener addr");
    drop(listener);
    format!("http://{addr}/api")
}

async fn serve(parts: Vec<Vec<u8>>, hold: bool) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("listener addr");

    let handle = tokio::spawn(async move {
        let (mut conn, _) = listener.accept().await.expect("accept client");
        let request = read_request(&mut conn).await;
        for part in parts {
            if conn.write_all(&part).await.is_err() {
                return request;
            }
            let _ = conn.flush().await;
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        if hold {
            // Wait for the client to hang up.
            let mut scratch = [0_u8; 64];
            while matches!(conn.read(&mut scratch).await, Ok(n) if n > 0) {}
        }
        request
    });

    (format!("http://{addr}/api"), handle)
}

async fn read_request(conn: &mut TcpStream) -> String {
    let mut data = Vec::new();
    let mut buf = [0_u8; 1024];
    loop {
        let n = conn.read(&mut buf).await.expect("read request");
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
        if let Some(head_end) = find_head_end(&data) {
            let head = String::from_utf8_lossy(&data[..head_end]).to_ascii_lowercase();
            let body_len = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if data.len() >= head_end + 4 + body_len {
                break;
            }
        }
    }
    String::from_utf8_lossy(&data).to_string()
}

fn find_head_end(data: &[u8]) -> Option<usize> {
    data.windows(4).position(|w| w == b"\r\n\r\n")
}
