//! Connect-latency measurement and candidate ordering

use std::time::{Duration, Instant};

use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, trace};

/// Measures TCP connect latency to a `host:port` endpoint.
///
/// Returns `None` when the endpoint does not accept a connection
/// within the timeout.
pub async fn measure_latency(endpoint: &str, connect_timeout: Duration) -> Option<Duration> {
    let started = Instant::now();
    match timeout(connect_timeout, TcpStream::connect(endpoint)).await {
        Ok(Ok(_stream)) => {
            let elapsed = started.elapsed();
            trace!(endpoint, ?elapsed, "endpoint reachable");
            Some(elapsed)
        }
        Ok(Err(err)) => {
            debug!(endpoint, %err, "endpoint connect failed");
            None
        }
        Err(_) => {
            debug!(endpoint, ?connect_timeout, "endpoint connect timed out");
            None
        }
    }
}

/// Measures every candidate concurrently and orders the measured ones
/// by ascending latency, ties keeping directory order. Unmeasured
/// candidates follow in directory order.
pub async fn rank_endpoints(
    endpoints: Vec<String>,
    connect_timeout: Duration,
) -> Vec<(String, Option<Duration>)> {
    let probes = endpoints.into_iter().map(|endpoint| async move {
        let latency = measure_latency(&endpoint, connect_timeout).await;
        (endpoint, latency)
    });
    let mut measured = Vec::new();
    let mut unmeasured = Vec::new();
    for (endpoint, latency) in futures::future::join_all(probes).await {
        match latency {
            Some(latency) => measured.push((endpoint, latency)),
            None => unmeasured.push((endpoint, None)),
        }
    }
    measured.sort_by_key(|(_, latency)| *latency);
    measured
        .into_iter()
        .map(|(endpoint, latency)| (endpoint, Some(latency)))
        .chain(unmeasured)
        .collect()
}
