//! Scripted HTTP server for tests that need a flaky upstream.
//!
//! Each request receives the next scripted response; once the script is
//! exhausted the last response repeats.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Router,
};
use bytes::Bytes;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// One scripted reply.
#[derive(Debug, Clone)]
pub struct StubResponse {
    pub status: u16,
    pub body: Bytes,
}

impl StubResponse {
    /// `200 OK` with the given body.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    /// An empty reply with the given status.
    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: Bytes::new(),
        }
    }
}

struct Script {
    responses: Vec<StubResponse>,
    hits: AtomicUsize,
}

/// A running stub server bound to an ephemeral localhost port.
pub struct StubServer {
    addr: SocketAddr,
    script: Arc<Script>,
    handle: JoinHandle<()>,
}

impl StubServer {
    /// Start serving `responses` in order on every path.
    pub async fn start(responses: Vec<StubResponse>) -> std::io::Result<Self> {
        let script = Arc::new(Script {
            responses,
            hits: AtomicUsize::new(0),
        });

        let app = Router::new()
            .fallback(scripted_reply)
            .with_state(Arc::clone(&script));

        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            addr,
            script,
            handle,
        })
    }

    /// Absolute URL of `path` on this server.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Number of requests served so far.
    pub fn hits(&self) -> usize {
        self.script.hits.load(Ordering::SeqCst)
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn scripted_reply(State(script): State<Arc<Script>>) -> Response {
    let n = script.hits.fetch_add(1, Ordering::SeqCst);
    match script.responses.get(n).or_else(|| script.responses.last()) {
        Some(reply) => {
            let status =
                StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, reply.body.clone()).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_then_repeat_last() {
        let server = StubServer::start(vec![StubResponse::status(503), StubResponse::ok("done")])
            .await
            .unwrap();
        let client = reqwest::Client::new();

        let first = client.get(server.url("/x")).send().await.unwrap();
        assert_eq!(first.status().as_u16(), 503);

        for _ in 0..2 {
            let reply = client.get(server.url("/x")).send().await.unwrap();
            assert_eq!(reply.status().as_u16(), 200);
            assert_eq!(reply.text().await.unwrap(), "done");
        }
        assert_eq!(server.hits(), 3);
    }
}
