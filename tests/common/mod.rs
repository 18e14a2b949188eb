//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use api_relay::config::RelayConfig;
use api_relay::http::HttpServer;
use api_relay::lifecycle::Shutdown;
use axum::body::{to_bytes, Body, Bytes};
use axum::http::{HeaderMap, Method, Request, Response, StatusCode, Uri};
use axum::routing::any;
use axum::Router;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// One request as seen by a fake upstream.
#[derive(Debug, Clone)]
pub struct Captured {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

pub type Captures = Arc<Mutex<Vec<Captured>>>;

/// Canned answer for [`start_capturing_backend`].
#[derive(Clone)]
pub struct Canned {
    pub status: u16,
    pub headers: Vec<(&'static str, &'static str)>,
    pub body: &'static str,
}

impl Canned {
    pub fn new(status: u16, body: &'static str) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body,
        }
    }

    pub fn header(mut self, name: &'static str, value: &'static str) -> Self {
        self.headers.push((name, value));
        self
    }
}

/// Serve `router` on an ephemeral loopback port.
pub async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

/// Fake upstream that records every request and answers with `canned`.
pub async fn start_capturing_backend(canned: Canned) -> (SocketAddr, Captures) {
    let captures: Captures = Arc::new(Mutex::new(Vec::new()));
    let sink = captures.clone();

    let handler = move |request: Request<Body>| {
        let sink = sink.clone();
        let canned = canned.clone();
        async move {
            let (parts, body) = request.into_parts();
            let body = to_bytes(body, usize::MAX).await.unwrap_or_default();
            sink.lock().unwrap().push(Captured {
                method: parts.method,
                uri: parts.uri,
                headers: parts.headers,
                body,
            });

            let mut response = Response::builder().status(canned.status);
            for (name, value) in &canned.headers {
                response = response.header(*name, *value);
            }
            response.body(Body::from(canned.body)).unwrap()
        }
    };

    let router = Router::new()
        .route("/", any(handler.clone()))
        .route("/{*path}", any(handler));
    (serve(router).await, captures)
}

/// Raw TCP upstream that writes `head`, then `body`, waits a moment and
/// closes the socket without finishing whatever framing `head` promised.
pub async fn start_raw_backend(head: &'static str, body: &'static [u8]) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let mut buf = vec![0u8; 64 * 1024];
                        let _ = socket.read(&mut buf).await;
                        let _ = socket.write_all(head.as_bytes()).await;
                        let _ = socket.write_all(body).await;
                        let _ = socket.flush().await;
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// A loopback address with nothing listening on it.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Relay configuration pointing at `upstream`, tunnel disabled.
pub fn relay_config(upstream: SocketAddr) -> RelayConfig {
    let mut config = RelayConfig::default();
    config.upstream.base_url = format!("http://{}", upstream);
    config.socks.enabled = false;
    config.timeouts.connect_secs = 2;
    config
}

/// Start the relay on an ephemeral port. Keep the `Shutdown` alive for the
/// duration of the test.
pub async fn start_relay(config: RelayConfig) -> (SocketAddr, Shutdown) {
    let shutdown = Shutdown::new();
    let server = HttpServer::new(config);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    (addr, shutdown)
}

/// Test client: no environment proxies, no redirect following, no pooling.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .pool_max_idle_per_host(0)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

pub fn status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap()
}

/// Minimal unauthenticated SOCKS5 server supporting CONNECT. Returns its
/// address and a counter of tunnels opened.
pub async fn start_socks5_proxy() -> (SocketAddr, Arc<std::sync::atomic::AtomicUsize>) {
    use std::sync::atomic::{AtomicUsize, Ordering};

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let tunnels = Arc::new(AtomicUsize::new(0));
    let counter = tunnels.clone();

    tokio::spawn(async move {
        while let Ok((mut client, _)) = listener.accept().await {
            let counter = counter.clone();
            tokio::spawn(async move {
                // Greeting: VER, NMETHODS, METHODS...
                let mut head = [0u8; 2];
                client.read_exact(&mut head).await?;
                let mut methods = vec![0u8; head[1] as usize];
                client.read_exact(&mut methods).await?;
                client.write_all(&[5, 0]).await?;

                // Request: VER, CMD, RSV, ATYP, DST.ADDR, DST.PORT
                let mut req = [0u8; 4];
                client.read_exact(&mut req).await?;
                let host = match req[3] {
                    1 => {
                        let mut ip = [0u8; 4];
                        client.read_exact(&mut ip).await?;
                        std::net::Ipv4Addr::from(ip).to_string()
                    }
                    3 => {
                        let mut len = [0u8; 1];
                        client.read_exact(&mut len).await?;
                        let mut name = vec![0u8; len[0] as usize];
                        client.read_exact(&mut name).await?;
                        String::from_utf8_lossy(&name).into_owned()
                    }
                    _ => {
                        let mut ip = [0u8; 16];
                        client.read_exact(&mut ip).await?;
                        std::net::Ipv6Addr::from(ip).to_string()
                    }
                };
                let mut port = [0u8; 2];
                client.read_exact(&mut port).await?;
                let port = u16::from_be_bytes(port);

                let mut target = tokio::net::TcpStream::connect((host.as_str(), port)).await?;
                counter.fetch_add(1, Ordering::SeqCst);
                client.write_all(&[5, 0, 0, 1, 0, 0, 0, 0, 0, 0]).await?;

                tokio::io::copy_bidirectional(&mut client, &mut target).await?;
                Ok::<_, std::io::Error>(())
            });
        }
    });

    (addr, tunnels)
}

/// Upstream body of `chunks` chunks of `chunk_size` bytes, chunk `i` filled
/// with `i % 251`. `produced` counts chunks pulled; `dropped` flips when the
/// server abandons the body.
pub fn counting_body(
    chunks: usize,
    chunk_size: usize,
    produced: Arc<std::sync::atomic::AtomicUsize>,
    dropped: Arc<std::sync::atomic::AtomicBool>,
) -> Body {
    use std::sync::atomic::Ordering;

    struct DropFlag(Arc<std::sync::atomic::AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    let state = (0usize, DropFlag(dropped));
    let stream = futures_util::stream::unfold(state, move |(i, flag)| {
        let produced = produced.clone();
        async move {
            if i == chunks {
                return None;
            }
            produced.fetch_add(1, Ordering::SeqCst);
            let chunk = Bytes::from(vec![(i % 251) as u8; chunk_size]);
            Some((Ok::<_, std::convert::Infallible>(chunk), (i + 1, flag)))
        }
    });
    Body::from_stream(stream)
}

/// Expected byte at absolute `offset` of a [`counting_body`].
pub fn counting_byte(offset: usize, chunk_size: usize) -> u8 {
    ((offset / chunk_size) % 251) as u8
}
