//! `/debug/pprof/` HTTP endpoint.
//!
//! A small hyper server exposing CPU captures, heap counters and a thread
//! dump of the running process:
//!
//! | path | body |
//! | --- | --- |
//! | `/debug/pprof/` | index of the routes below |
//! | `/debug/pprof/profile?seconds=N` | pprof protobuf CPU profile |
//! | `/debug/pprof/flamegraph?seconds=N` | SVG flamegraph of a CPU capture |
//! | `/debug/pprof/heap` | allocation counters |
//! | `/debug/pprof/threads` | threads of this process |
//! | `/debug/pprof/cmdline` | command line, NUL separated |

use crate::cpu::{self, ProfileFormat};
use crate::error::{Error, Result};
use crate::{heap, process};
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::{ALLOW, CONTENT_TYPE, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

pub const DEFAULT_ADDR: &str = "localhost:6060";
pub const PREFIX: &str = "/debug/pprof/";

const DEFAULT_SECONDS: u64 = 30;
const MAX_SECONDS: u64 = 300;
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

const INDEX: &str = "\
/debug/pprof/

profile     CPU profile, pprof protobuf (?seconds=N, default 30)
flamegraph  CPU profile rendered as SVG (?seconds=N, default 30)
heap        allocation counters
threads     threads of this process
cmdline     command line of this process
";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Index,
    Profile,
    Flamegraph,
    Heap,
    Threads,
    Cmdline,
}

impl Endpoint {
    pub fn from_path(path: &str) -> Option<Self> {
        if path == "/debug/pprof" {
            return Some(Endpoint::Index);
        }
        match path.strip_prefix(PREFIX)? {
            "" => Some(Endpoint::Index),
            "profile" => Some(Endpoint::Profile),
            "flamegraph" => Some(Endpoint::Flamegraph),
            "heap" => Some(Endpoint::Heap),
            "threads" => Some(Endpoint::Threads),
            "cmdline" => Some(Endpoint::Cmdline),
            _ => None,
        }
    }
}

/// Read `seconds` from a query string, defaulting to 30.
pub fn parse_seconds(query: Option<&str>) -> Result<Duration> {
    let mut seconds = DEFAULT_SECONDS;

    if let Some(query) = query {
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            if key == "seconds" {
                seconds = value.parse().map_err(|_| {
                    Error::InvalidArgument(format!("seconds must be a whole number, got {value:?}"))
                })?;
            }
        }
    }

    if !(1..=MAX_SECONDS).contains(&seconds) {
        return Err(Error::InvalidArgument(format!(
            "seconds must be between 1 and {MAX_SECONDS}, got {seconds}"
        )));
    }

    Ok(Duration::from_secs(seconds))
}

struct State {
    // The sampler is process-global, so captures are serialized
    capture_lock: Mutex<()>,
    frequency: i32,
}

pub struct DebugServer {
    listener: TcpListener,
    state: Arc<State>,
}

impl DebugServer {
    pub async fn bind(addr: impl ToSocketAddrs) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(DebugServer {
            listener,
            state: Arc::new(State {
                capture_lock: Mutex::new(()),
                frequency: cpu::DEFAULT_FREQUENCY,
            }),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections forever, each served on its own task.
    pub async fn serve(self) {
        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!(error = %e, "debug endpoint accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            };

            let state = Arc::clone(&self.state);
            tokio::spawn(async move {
                let service = service_fn(move |req| handle(Arc::clone(&state), req));
                if let Err(e) = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await
                {
                    tracing::debug!(%peer, error = %e, "debug connection ended with error");
                }
            });
        }
    }
}

/// Bind and serve in a detached task. A bind failure is logged and only ends
/// this task.
pub fn spawn(addr: String) -> JoinHandle<()> {
    tokio::spawn(async move {
        let server = match DebugServer::bind(addr.as_str()).await {
            Ok(server) => server,
            Err(e) => {
                tracing::error!(%addr, error = %e, "debug endpoint unavailable");
                return;
            }
        };

        if let Ok(local) = server.local_addr() {
            tracing::info!(%local, "serving profiling endpoints under {PREFIX}");
        }
        server.serve().await;
    })
}

async fn handle(
    state: Arc<State>,
    req: Request<Incoming>,
) -> std::result::Result<Response<Full<Bytes>>, Infallible> {
    // Bodies are never read; keep only the head
    let (head, _) = req.into_parts();
    let path = head.uri.path();
    let Some(endpoint) = Endpoint::from_path(path) else {
        return Ok(text(
            StatusCode::NOT_FOUND,
            format!("unknown profile: {path}\n"),
        ));
    };

    if head.method != Method::GET {
        let mut response = text(StatusCode::METHOD_NOT_ALLOWED, "only GET is supported\n");
        response
            .headers_mut()
            .insert(ALLOW, HeaderValue::from_static("GET"));
        return Ok(response);
    }

    let response = match endpoint {
        Endpoint::Index => text(StatusCode::OK, INDEX),
        Endpoint::Heap => {
            let now = chrono::Local::now().to_rfc3339();
            text(StatusCode::OK, heap::snapshot().render(&now))
        }
        Endpoint::Threads => match process::list_threads() {
            Ok(threads) => text(StatusCode::OK, process::render_threads(&threads)),
            Err(e) => text(StatusCode::INTERNAL_SERVER_ERROR, format!("{e}\n")),
        },
        Endpoint::Cmdline => {
            let args: Vec<String> = std::env::args().collect();
            text(StatusCode::OK, args.join("\0"))
        }
        Endpoint::Profile => capture(&state, head.uri.query(), ProfileFormat::Pprof).await,
        Endpoint::Flamegraph => {
            capture(&state, head.uri.query(), ProfileFormat::Flamegraph).await
        }
    };

    Ok(response)
}

async fn capture(
    state: &State,
    query: Option<&str>,
    format: ProfileFormat,
) -> Response<Full<Bytes>> {
    let duration = match parse_seconds(query) {
        Ok(d) => d,
        Err(e) => return text(StatusCode::BAD_REQUEST, format!("{e}\n")),
    };

    let Ok(_running) = state.capture_lock.try_lock() else {
        return text(
            StatusCode::CONFLICT,
            "a cpu profile is already being captured\n",
        );
    };

    tracing::info!(seconds = duration.as_secs(), ?format, "cpu capture requested");
    let frequency = state.frequency;
    let result =
        tokio::task::spawn_blocking(move || cpu::capture(duration, frequency, format)).await;

    match result {
        Ok(Ok(encoded)) => body(StatusCode::OK, format.content_type(), encoded),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "cpu capture failed");
            text(StatusCode::INTERNAL_SERVER_ERROR, format!("{e}\n"))
        }
        Err(e) => text(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("capture task failed: {e}\n"),
        ),
    }
}

fn body(
    status: StatusCode,
    content_type: &'static str,
    body: impl Into<Bytes>,
) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

fn text(status: StatusCode, text: impl Into<Bytes>) -> Response<Full<Bytes>> {
    body(status, "text/plain; charset=utf-8", text)
}
