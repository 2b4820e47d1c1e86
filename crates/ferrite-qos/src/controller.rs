//! Per-client admission and throttling.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ferrite_core::config::QosConfig;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Length of one bandwidth accounting window.
const WINDOW: Duration = Duration::from_secs(1);

/// Mutable per-client state. Mutated only under its own lock; the map of
/// client ids is locked separately and only for insertion and sweeping.
struct ClientState {
    active_requests: u32,
    bytes_this_window: u64,
    window_start: Instant,
    last_seen: Instant,
}

impl ClientState {
    fn new(now: Instant) -> Self {
        Self {
            active_requests: 0,
            bytes_this_window: 0,
            window_start: now,
            last_seen: now,
        }
    }
}

/// Tracks concurrency and bandwidth per caller-supplied client id.
///
/// Client ids are opaque strings from the request (not authenticated).
/// State is created lazily on first sight and swept once the client has
/// been idle past the configured horizon.
pub struct QosController {
    max_concurrent_requests: u32,
    max_bandwidth_bps: u64,
    idle_horizon: Duration,
    clients: Mutex<HashMap<String, Arc<Mutex<ClientState>>>>,
}

impl QosController {
    pub fn new(config: &QosConfig) -> Self {
        Self {
            max_concurrent_requests: config.max_concurrent_requests,
            max_bandwidth_bps: config.max_bandwidth_bps,
            idle_horizon: Duration::from_secs(config.idle_client_horizon_secs),
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Admit a new request for `client`, or reject it when the client is
    /// already at its concurrency cap. Rejection leaves the count untouched.
    pub fn admit(&self, client: &str) -> bool {
        let state = self.client_state(client);
        let mut state = state.lock().unwrap();
        state.last_seen = Instant::now();

        if state.active_requests >= self.max_concurrent_requests {
            warn!(client, active = state.active_requests, "request rejected: concurrency limit");
            return false;
        }
        state.active_requests += 1;
        debug!(client, active = state.active_requests, "request admitted");
        true
    }

    /// Release one concurrency slot for `client`. Releasing with no slot
    /// held is a no-op, tolerating double release from error paths.
    pub fn release(&self, client: &str) {
        let state = self.client_state(client);
        let mut state = state.lock().unwrap();
        state.active_requests = state.active_requests.saturating_sub(1);
        state.last_seen = Instant::now();
        debug!(client, active = state.active_requests, "request released");
    }

    /// Account `bytes` against the client's one-second bandwidth window,
    /// suspending until the window has room.
    ///
    /// The ceiling is soft: a chunk that alone exceeds the whole budget is
    /// admitted into an empty window rather than waiting forever, so the
    /// overshoot is bounded by one chunk size.
    pub async fn throttle(&self, client: &str, bytes: u64) {
        let state = self.client_state(client);
        loop {
            let window_end = {
                let mut state = state.lock().unwrap();
                let now = Instant::now();
                state.last_seen = now;

                if now.duration_since(state.window_start) >= WINDOW {
                    state.window_start = now;
                    state.bytes_this_window = 0;
                }

                let fits = state.bytes_this_window + bytes <= self.max_bandwidth_bps;
                if fits || state.bytes_this_window == 0 {
                    state.bytes_this_window += bytes;
                    return;
                }
                state.window_start + WINDOW
            };

            debug!(client, bytes, "bandwidth limit reached, waiting for next window");
            tokio::time::sleep_until(window_end).await;
        }
    }

    /// Number of requests currently active for `client`.
    pub fn active_requests(&self, client: &str) -> u32 {
        let state = self.client_state(client);
        let state = state.lock().unwrap();
        state.active_requests
    }

    /// Number of client ids currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.clients.lock().unwrap().len()
    }

    /// Get or lazily create the state entry for `client`. Creation of a new
    /// entry also sweeps entries idle past the horizon, bounding map growth
    /// under client-id churn.
    fn client_state(&self, client: &str) -> Arc<Mutex<ClientState>> {
        let mut clients = self.clients.lock().unwrap();
        if let Some(state) = clients.get(client) {
            return Arc::clone(state);
        }

        let now = Instant::now();
        let horizon = self.idle_horizon;
        clients.retain(|_, entry| {
            let entry = entry.lock().unwrap();
            entry.active_requests > 0 || now.duration_since(entry.last_seen) < horizon
        });

        let state = Arc::new(Mutex::new(ClientState::new(now)));
        clients.insert(client.to_string(), Arc::clone(&state));
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrite_core::config::QosConfig;

    fn controller(max_concurrent: u32, max_bps: u64) -> QosController {
        QosController::new(&QosConfig {
            max_concurrent_requests: max_concurrent,
            max_bandwidth_bps: max_bps,
            idle_client_horizon_secs: 600,
        })
    }

    #[test]
    fn admits_up_to_cap_then_rejects() {
        let qos = controller(2, 1_000_000);
        assert!(qos.admit("c1"));
        assert!(qos.admit("c1"));
        assert!(!qos.admit("c1"));
        // Rejection must not have incremented the count.
        assert_eq!(qos.active_requests("c1"), 2);
        // Other clients are independent.
        assert!(qos.admit("c2"));
    }

    #[test]
    fn release_frees_a_slot_and_floors_at_zero() {
        let qos = controller(1, 1_000_000);
        assert!(qos.admit("c1"));
        assert!(!qos.admit("c1"));
        qos.release("c1");
        assert!(qos.admit("c1"));

        qos.release("c1");
        qos.release("c1"); // double release from an error path
        assert_eq!(qos.active_requests("c1"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn throttle_admits_within_window_without_waiting() {
        let qos = controller(1, 1000);
        let start = Instant::now();
        qos.throttle("c1", 400).await;
        qos.throttle("c1", 600).await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn throttle_waits_for_the_next_window_when_full() {
        let qos = controller(1, 1000);
        let start = Instant::now();
        qos.throttle("c1", 1000).await;
        qos.throttle("c1", 200).await;
        // The second chunk had to wait for the window to roll over.
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_chunk_is_admitted_into_an_empty_window() {
        let qos = controller(1, 100);
        qos.throttle("c1", 4096).await;

        let start = Instant::now();
        qos.throttle("c1", 4096).await;
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_clients_are_swept_on_insert() {
        let qos = controller(1, 1000);
        assert!(qos.admit("old"));
        qos.release("old");
        assert_eq!(qos.tracked_clients(), 1);

        tokio::time::advance(Duration::from_secs(601)).await;
        assert!(qos.admit("new"));
        // "old" was idle past the horizon and dropped on insertion of "new".
        assert_eq!(qos.tracked_clients(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn active_clients_survive_the_sweep() {
        let qos = controller(1, 1000);
        assert!(qos.admit("busy"));

        tokio::time::advance(Duration::from_secs(601)).await;
        assert!(qos.admit("new"));
        assert_eq!(qos.tracked_clients(), 2);
        assert_eq!(qos.active_requests("busy"), 1);
    }
}
