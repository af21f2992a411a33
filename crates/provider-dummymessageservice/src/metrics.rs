//! Prometheus metrics plus the probe endpoints kubelet polls.
//!
//! `/readyz` reports ready only while this replica holds leadership, which is
//! exactly when the controllers are running.

use std::sync::LazyLock;

use prometheus::core::Collector;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, TextEncoder,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::leader_election::LeaderStatus;

const PREFIX: &str = "dms_provider";

/// Register `collector` with the default registry and hand it back.
fn registered<C: Collector + Clone + 'static>(collector: C) -> C {
    if let Err(e) = prometheus::register(Box::new(collector.clone())) {
        warn!("Metric registration failed: {e}");
    }
    collector
}

fn counter_vec(name: &str, help: &str, labels: &[&str]) -> IntCounterVec {
    let opts = Opts::new(format!("{PREFIX}_{name}"), help);
    registered(IntCounterVec::new(opts, labels).expect("valid counter definition"))
}

static RECONCILIATIONS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    counter_vec(
        "reconciliations_total",
        "Reconcile calls by controller and result",
        &["controller", "result"],
    )
});

static EXTERNAL_OPERATIONS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    counter_vec(
        "external_operations_total",
        "Operations issued against the message service",
        &["operation", "result"],
    )
});

static RECONCILE_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{PREFIX}_reconcile_duration_seconds"),
        "Wall time of one reconcile call",
    );
    registered(HistogramVec::new(opts, &["controller"]).expect("valid histogram definition"))
});

static LEADER: LazyLock<IntGauge> = LazyLock::new(|| {
    registered(
        IntGauge::new(format!("{PREFIX}_leader"), "1 while this replica holds the lease")
            .expect("valid gauge definition"),
    )
});

fn outcome(ok: bool) -> &'static str {
    if ok {
        "success"
    } else {
        "error"
    }
}

pub fn record_reconciliation(controller: &str, result: &str) {
    RECONCILIATIONS.with_label_values(&[controller, result]).inc();
}

pub fn observe_reconcile_duration(controller: &str, secs: f64) {
    RECONCILE_DURATION.with_label_values(&[controller]).observe(secs);
}

/// Count one observe/create/update/delete call against the message service.
pub fn record_external_operation(operation: &str, ok: bool) {
    EXTERNAL_OPERATIONS
        .with_label_values(&[operation, outcome(ok)])
        .inc();
}

pub fn set_leader(is_leader: bool) {
    LEADER.set(i64::from(is_leader));
}

/// A fully rendered probe or scrape response.
#[derive(Debug, PartialEq)]
struct Reply {
    status: &'static str,
    content_type: &'static str,
    body: Vec<u8>,
}

impl Reply {
    fn text(status: &'static str, body: &str) -> Self {
        Self {
            status,
            content_type: "text/plain",
            body: body.as_bytes().to_vec(),
        }
    }

    fn to_http(&self) -> Vec<u8> {
        let mut out = format!(
            "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            self.status,
            self.content_type,
            self.body.len()
        )
        .into_bytes();
        out.extend_from_slice(&self.body);
        out
    }
}

fn scrape() -> Reply {
    let mut body = Vec::new();
    match TextEncoder::new().encode(&prometheus::gather(), &mut body) {
        Ok(()) => Reply {
            status: "200 OK",
            content_type: "text/plain; version=0.0.4; charset=utf-8",
            body,
        },
        Err(e) => Reply::text("500 Internal Server Error", &e.to_string()),
    }
}

fn route(path: &str, ready: bool) -> Reply {
    match path {
        "/metrics" => scrape(),
        "/healthz" => Reply::text("200 OK", "ok"),
        "/readyz" if ready => Reply::text("200 OK", "ok"),
        "/readyz" => Reply::text("503 Service Unavailable", "waiting for leadership"),
        _ => Reply::text("404 Not Found", "not found"),
    }
}

async fn handle(mut stream: TcpStream, leader: LeaderStatus) -> std::io::Result<()> {
    let mut buf = [0u8; 2048];
    let n = stream.read(&mut buf).await?;
    let head = String::from_utf8_lossy(&buf[..n]);
    let path = head
        .split_whitespace()
        .nth(1)
        .map(|target| target.split('?').next().unwrap_or(target))
        .unwrap_or("/");

    let reply = route(path, leader.is_leader());
    stream.write_all(&reply.to_http()).await
}

/// Serve `/metrics`, `/healthz` and `/readyz` on `addr` until the process exits.
pub async fn serve(addr: String, leader: LeaderStatus) -> std::io::Result<()> {
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "Metrics server listening");

    loop {
        let (stream, peer) = listener.accept().await?;
        let leader = leader.clone();
        tokio::spawn(async move {
            if let Err(e) = handle(stream, leader).await {
                debug!(%peer, "Probe connection failed: {e}");
            }
        });
    }
}
