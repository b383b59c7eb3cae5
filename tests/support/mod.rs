//! A scripted HTTP/1.1 server for integration tests.
//!
//! Every accepted connection gets the same canned [`Reply`]. The body is
//! written with chunked transfer encoding, one chunk per script entry, and
//! flushed after each so the client sees them arrive separately.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub chunks: Vec<String>,
    /// Keep the connection open after the last chunk until the client
    /// hangs up.
    pub hold_open: bool,
    /// Read the request and never answer.
    pub stall: bool,
    /// Announce this `Content-Length` instead of chunking, then hang up
    /// after writing the chunks.
    pub declared_length: Option<usize>,
}

impl Reply {
    pub fn ok<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::status(200, chunks)
    }

    pub fn status<I, S>(status: u16, chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            status,
            chunks: chunks.into_iter().map(Into::into).collect(),
            hold_open: false,
            stall: false,
            declared_length: None,
        }
    }

    pub fn held_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    /// A 200 whose body stops short of the announced length.
    pub fn truncated(body: &str, declared_length: usize) -> Self {
        Self {
            declared_length: Some(declared_length),
            ..Self::ok([body])
        }
    }

    pub fn stalled() -> Self {
        Self {
            stall: true,
            ..Self::status(200, Vec::<String>::new())
        }
    }
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("request body is JSON")
    }
}

pub struct Server {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<Recorded>>>,
    closed_rx: mpsc::UnboundedReceiver<()>,
}

impl Server {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> Recorded {
        self.requests().pop().expect("server received a request")
    }

    /// Wait until a held-open connection is dropped by the client.
    pub async fn connection_closed(&mut self) {
        tokio::time::timeout(Duration::from_secs(5), self.closed_rx.recv())
            .await
            .expect("client should close the connection")
            .expect("server task alive");
    }
}

pub async fn serve(reply: Reply) -> Server {
    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let (closed_tx, closed_rx) = mpsc::unbounded_channel();

    let recorded = requests.clone();
    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                break;
            };
            let reply = reply.clone();
            let recorded = recorded.clone();
            let closed_tx = closed_tx.clone();
            tokio::spawn(async move {
                handle(socket, reply, recorded, closed_tx).await;
            });
        }
    });

    Server {
        addr,
        requests,
        closed_rx,
    }
}

/// An address nothing listens on.
pub async fn unused_addr() -> String {
    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

async fn handle(
    mut socket: TcpStream,
    reply: Reply,
    recorded: Arc<Mutex<Vec<Recorded>>>,
    closed_tx: mpsc::UnboundedSender<()>,
) {
    let Some(request) = read_request(&mut socket).await else {
        return;
    };
    let is_head = request.method == "HEAD";
    recorded.lock().unwrap().push(request);

    if reply.stall {
        let mut sink = [0u8; 256];
        while matches!(socket.read(&mut sink).await, Ok(n) if n > 0) {}
        return;
    }

    if let Some(length) = reply.declared_length {
        let head = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            reply.status,
            reason(reply.status),
            length
        );
        let _ = socket.write_all(head.as_bytes()).await;
        let _ = socket.write_all(reply.chunks.concat().as_bytes()).await;
        let _ = socket.flush().await;
        let _ = socket.shutdown().await;
        return;
    }

    let head = if is_head {
        format!(
            "HTTP/1.1 {} {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            reply.status,
            reason(reply.status)
        )
    } else {
        format!(
            "HTTP/1.1 {} {}\r\nContent-Type: application/x-ndjson\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n",
            reply.status,
            reason(reply.status)
        )
    };
    if socket.write_all(head.as_bytes()).await.is_err() {
        return;
    }
    if is_head {
        let _ = socket.shutdown().await;
        return;
    }

    for chunk in reply.chunks.iter().filter(|c| !c.is_empty()) {
        let framed = format!("{:x}\r\n{}\r\n", chunk.len(), chunk);
        if socket.write_all(framed.as_bytes()).await.is_err() {
            return;
        }
        let _ = socket.flush().await;
    }

    if reply.hold_open {
        let mut sink = [0u8; 256];
        while matches!(socket.read(&mut sink).await, Ok(n) if n > 0) {}
        let _ = closed_tx.send(());
        return;
    }

    let _ = socket.write_all(b"0\r\n\r\n").await;
    let _ = socket.shutdown().await;
}

async fn read_request(socket: &mut TcpStream) -> Option<Recorded> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];

    let head_end = loop {
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos;
        }
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut start = lines.next()?.split_whitespace();
    let method = start.next()?.to_string();
    let path = start.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();

    let content_length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = buf[head_end + 4..].to_vec();
    while body.len() < content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    Some(Recorded {
        method,
        path,
        headers,
        body: String::from_utf8_lossy(&body).to_string(),
    })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}
