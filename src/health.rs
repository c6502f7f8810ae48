//! Health probing: turns "the child is bound" into the serving-readiness
//! condition the supervisor uses to decide whether a new incarnation may
//! enter the route set.

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::{sleep, Instant};

const RETRY_INTERVAL: Duration = Duration::from_secs(2);
const PROBE_BUDGET: Duration = Duration::from_secs(90);

/// Probes `127.0.0.1:port` by attempting a TCP connect every
/// [`RETRY_INTERVAL`] until one succeeds or the overall budget elapses.
/// The connection, if made, is closed immediately — this probe does not
/// speak any application protocol.
pub struct HealthProber {
    retry_interval: Duration,
    budget: Duration,
}

impl Default for HealthProber {
    fn default() -> Self {
        Self {
            retry_interval: RETRY_INTERVAL,
            budget: PROBE_BUDGET,
        }
    }
}

impl HealthProber {
    /// Build a prober with a non-default budget/interval, for use in tests
    /// that cannot afford to wait the full 90 seconds.
    pub fn with_budget(retry_interval: Duration, budget: Duration) -> Self {
        Self {
            retry_interval,
            budget,
        }
    }

    #[tracing::instrument(level = "debug", skip(self), fields(port))]
    pub async fn probe(&self, port: u16) -> bool {
        let deadline = Instant::now() + self.budget;

        loop {
            sleep(self.retry_interval).await;

            match TcpStream::connect(("127.0.0.1", port)).await {
                Ok(stream) => {
                    // Dropping closes the socket; any error during close is
                    // logged but never invalidates the successful connect.
                    if let Err(err) = stream.set_linger(None) {
                        tracing::debug!(error = ?err, "error closing probe connection");
                    }
                    drop(stream);
                    return true;
                }
                Err(_) if Instant::now() >= deadline => return false,
                Err(_) => continue,
            }
        }
    }
}
