//! Scripted stand-in for the OpenSong automation server (tests only)
//!
//! Serves the WebSocket endpoint and the REST API on one port, like the
//! real server. Each accepted WebSocket connection plays the next scripted
//! session after it receives the subscription request.

use futures::{SinkExt, StreamExt};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;

/// Messages to push on one WebSocket connection
#[derive(Debug, Clone)]
struct Session {
    messages: Vec<String>,
    /// Close the connection once every message has been sent
    close: bool,
}

#[derive(Debug, Default)]
struct Shared {
    slides: HashMap<u32, String>,
    sessions: VecDeque<Session>,
    subscriptions: Vec<String>,
    requested_slides: Vec<u32>,
    ws_connections: usize,
}

#[derive(Debug, Default)]
pub(crate) struct MockOpenSongBuilder {
    shared: Shared,
}

impl MockOpenSongBuilder {
    /// Serve `body` with status 200 for `GET /presentation/slide/{number}`
    pub fn slide(mut self, number: u32, body: &str) -> Self {
        self.shared.slides.insert(number, body.to_string());
        self
    }

    /// Push `messages` on the next connection, then close it
    pub fn session(mut self, messages: &[String]) -> Self {
        self.shared.sessions.push_back(Session {
            messages: messages.to_vec(),
            close: true,
        });
        self
    }

    /// Push `messages` on the next connection and keep it open
    pub fn open_session(mut self, messages: &[String]) -> Self {
        self.shared.sessions.push_back(Session {
            messages: messages.to_vec(),
            close: false,
        });
        self
    }

    pub async fn start(self) -> MockOpenSong {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shared = Arc::new(Mutex::new(self.shared));

        let accept_shared = shared.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let shared = accept_shared.clone();
                tokio::spawn(async move {
                    if is_websocket(&stream).await {
                        serve_websocket(stream, shared).await;
                    } else {
                        serve_http(stream, shared).await;
                    }
                });
            }
        });

        MockOpenSong { addr, shared }
    }
}

pub(crate) struct MockOpenSong {
    addr: SocketAddr,
    shared: Arc<Mutex<Shared>>,
}

impl MockOpenSong {
    pub fn builder() -> MockOpenSongBuilder {
        MockOpenSongBuilder::default()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn api_base(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.shared.lock().unwrap().subscriptions.clone()
    }

    pub fn requested_slides(&self) -> Vec<u32> {
        self.shared.lock().unwrap().requested_slides.clone()
    }

    pub fn ws_connections(&self) -> usize {
        self.shared.lock().unwrap().ws_connections
    }
}

/// Status document as pushed by OpenSong
pub(crate) fn status_xml(running: bool, slide: u32) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <response resource=\"presentation\" action=\"status\">\
         <presentation running=\"{}\" mode=\"N\"><screen mode=\"N\"/>\
         <slide itemnumber=\"{}\"><name>song</name></slide></presentation></response>",
        if running { 1 } else { 0 },
        slide
    )
}

async fn is_websocket(stream: &TcpStream) -> bool {
    let mut buf = [0u8; 8];
    for _ in 0..200 {
        match stream.peek(&mut buf).await {
            Ok(0) | Err(_) => return false,
            Ok(n) if n >= buf.len() => return &buf == b"GET /ws ",
            Ok(_) => tokio::time::sleep(Duration::from_millis(5)).await,
        }
    }
    false
}

async fn serve_websocket(stream: TcpStream, shared: Arc<Mutex<Shared>>) {
    let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
        return;
    };
    shared.lock().unwrap().ws_connections += 1;

    let subscription = match ws.next().await {
        Some(Ok(Message::Text(text))) => text,
        _ => return,
    };
    let session = {
        let mut shared = shared.lock().unwrap();
        shared.subscriptions.push(subscription);
        shared.sessions.pop_front()
    };

    let Some(session) = session else {
        // Nothing scripted, idle until the client leaves
        while let Some(Ok(_)) = ws.next().await {}
        return;
    };

    for message in session.messages {
        if ws.send(Message::Text(message)).await.is_err() {
            return;
        }
    }

    if session.close {
        let _ = ws.close(None).await;
    }
    while let Some(Ok(_)) = ws.next().await {}
}

async fn serve_http(mut stream: TcpStream, shared: Arc<Mutex<Shared>>) {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => request.extend_from_slice(&buf[..n]),
        }
    }

    let request = String::from_utf8_lossy(&request);
    let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();
    let slide = path
        .strip_prefix("/presentation/slide/")
        .and_then(|n| n.parse::<u32>().ok());

    let body = {
        let mut shared = shared.lock().unwrap();
        if let Some(slide) = slide {
            shared.requested_slides.push(slide);
        }
        slide.and_then(|n| shared.slides.get(&n).cloned())
    };

    let (status, body) = match body {
        Some(body) => ("200 OK", body),
        None => ("404 Not Found", "The requested resource was not found.".to_string()),
    };
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/xml\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}
