// Connection module
// Accepts TCP connections and bridges each request to the payload sender

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use hyper::body::Incoming;
use hyper::header::{ETAG, USER_AGENT};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode, Version};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;

use super::pages;
use crate::config::AppState;
use crate::http::{
    build_405_response, build_500_response, HyperTransport, ResponseBody, ServerResponse,
};
use crate::logger::{self, AccessLogEntry};

/// Accept a connection, enforcing `performance.max_connections`.
pub fn accept_connection(stream: TcpStream, peer_addr: SocketAddr, state: &Arc<AppState>) {
    // Increment first, then check, so concurrent accepts cannot both slip under the limit
    let prev_count = state.active_connections.fetch_add(1, Ordering::SeqCst);

    if let Some(max_conn) = state.config.performance.max_connections {
        if prev_count >= usize::try_from(max_conn).unwrap_or(usize::MAX) {
            state.active_connections.fetch_sub(1, Ordering::SeqCst);
            logger::log_warning(&format!(
                "Max connections reached: {prev_count}/{max_conn}. Connection rejected."
            ));
            return;
        }
    }

    if state.config.logging.access_log {
        logger::log_connection_accepted(&peer_addr);
    }

    handle_connection(stream, peer_addr, Arc::clone(state));
}

/// Serve one HTTP/1 connection on the local task set.
fn handle_connection(stream: TcpStream, peer_addr: SocketAddr, state: Arc<AppState>) {
    tokio::task::spawn_local(async move {
        let io = TokioIo::new(stream);
        let performance = &state.config.performance;
        let timeout_duration = Duration::from_secs(std::cmp::max(
            performance.read_timeout,
            performance.write_timeout,
        ));

        let mut builder = http1::Builder::new();
        builder.keep_alive(performance.keep_alive_timeout > 0);

        let service_state = Arc::clone(&state);
        let conn = builder.serve_connection(
            io,
            service_fn(move |req| handle_request(req, peer_addr, Arc::clone(&service_state))),
        );

        match tokio::time::timeout(timeout_duration, conn).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => logger::log_connection_error(&err),
            Err(_) => logger::log_warning(&format!(
                "Connection from {peer_addr} timed out after {} seconds",
                timeout_duration.as_secs()
            )),
        }

        state.active_connections.fetch_sub(1, Ordering::SeqCst);
    });
}

/// Handle one request
///
/// Delivery runs on its own task so hyper can start sending the head (and
/// draining a streamed body) while chunks are still being written.
async fn handle_request(
    req: Request<Incoming>,
    peer_addr: SocketAddr,
    state: Arc<AppState>,
) -> Result<Response<ResponseBody>, Infallible> {
    if !matches!(*req.method(), Method::GET | Method::HEAD) {
        logger::log_warning(&format!(
            "Method {} not allowed for {}",
            req.method(),
            req.uri()
        ));
        return Ok(build_405_response());
    }

    let (transport, head) = HyperTransport::channel();
    tokio::task::spawn_local(deliver(req, transport, peer_addr, state));

    // Sender dropped without a head: delivery failed before anything was sent
    Ok(head.await.unwrap_or_else(|_| build_500_response()))
}

async fn deliver(
    req: Request<Incoming>,
    transport: HyperTransport,
    peer_addr: SocketAddr,
    state: Arc<AppState>,
) {
    let started = Instant::now();
    let mut res = ServerResponse::new(transport);

    if let Err(e) = pages::serve(&req, &mut res, &state).await {
        logger::log_error(&format!("Failed to deliver {}: {e}", req.uri()));
    }

    let logging = &state.config.logging;
    if !logging.access_log {
        return;
    }

    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        req.method().to_string(),
        req.uri().to_string(),
    );
    entry.http_version = version_label(req.version()).to_string();
    entry.status = if res.is_sent() {
        res.status().as_u16()
    } else {
        StatusCode::INTERNAL_SERVER_ERROR.as_u16()
    };
    entry.body_bytes = res.bytes_sent();
    entry.etag = res
        .headers()
        .get(ETAG)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    entry.user_agent = req
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);

    logger::log_access(&entry, &logging.access_log_format);
}

fn version_label(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        Version::HTTP_3 => "3",
        _ => "1.1",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::server::create_reusable_listener;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::LocalSet;

    fn pages_dir() -> String {
        let dir = std::env::temp_dir().join(format!("render-relay-conn-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("index.html"), "<p>hello</p>").unwrap();
        dir.to_str().unwrap().to_string()
    }

    async fn start() -> SocketAddr {
        let mut cfg = Config::load_from("does-not-exist/render-relay").unwrap();
        cfg.delivery.pages_dir = pages_dir();
        cfg.logging.access_log = false;
        let state = Arc::new(AppState::new(&cfg));

        let listener: TcpListener =
            create_reusable_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::task::spawn_local(async move {
            while let Ok((stream, peer_addr)) = listener.accept().await {
                accept_connection(stream, peer_addr, &state);
            }
        });
        addr
    }

    async fn roundtrip(addr: SocketAddr, request: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    fn header<'a>(response: &'a str, name: &str) -> Option<&'a str> {
        response.lines().find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.eq_ignore_ascii_case(name).then(|| value.trim())
        })
    }

    #[tokio::test]
    async fn test_get_then_conditional_get() {
        LocalSet::new()
            .run_until(async {
                let addr = start().await;

                let full = roundtrip(addr, "GET / HTTP/1.1\r\nHost: t\r\nConnection: close\r\n\r\n").await;
                assert!(full.starts_with("HTTP/1.1 200"), "{full}");
                assert_eq!(header(&full, "content-length"), Some("12"));
                assert!(full.ends_with("<p>hello</p>"));
                let etag = header(&full, "etag").unwrap().to_string();

                let cached = roundtrip(
                    addr,
                    &format!(
                        "GET / HTTP/1.1\r\nHost: t\r\nIf-None-Match: {etag}\r\nConnection: close\r\n\r\n"
                    ),
                )
                .await;
                assert!(cached.starts_with("HTTP/1.1 304"), "{cached}");
                assert_eq!(header(&cached, "etag"), Some(etag.as_str()));
                assert!(cached.ends_with("\r\n\r\n"));
            })
            .await;
    }

    #[tokio::test]
    async fn test_head_and_method_not_allowed() {
        LocalSet::new()
            .run_until(async {
                let addr = start().await;

                let head = roundtrip(addr, "HEAD / HTTP/1.1\r\nHost: t\r\nConnection: close\r\n\r\n").await;
                assert!(head.starts_with("HTTP/1.1 200"), "{head}");
                assert!(header(&head, "etag").is_some());
                assert!(head.ends_with("\r\n\r\n"));

                let post = roundtrip(
                    addr,
                    "POST / HTTP/1.1\r\nHost: t\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                )
                .await;
                assert!(post.starts_with("HTTP/1.1 405"), "{post}");
                assert_eq!(header(&post, "allow"), Some("GET, HEAD"));
            })
            .await;
    }

    #[test]
    fn test_version_label() {
        assert_eq!(version_label(Version::HTTP_10), "1.0");
        assert_eq!(version_label(Version::HTTP_11), "1.1");
        assert_eq!(version_label(Version::HTTP_2), "2");
    }
}
