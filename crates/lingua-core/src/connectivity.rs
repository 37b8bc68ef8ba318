//! Connectivity watching: turns network-change notifications into flushes.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::util::{is_http_url, normalize_text_option};

const PROBE_TIMEOUT_SECS: u64 = 3;

/// Network connectivity state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkState {
    Online,
    Offline,
}

impl From<bool> for NetworkState {
    fn from(reachable: bool) -> Self {
        if reachable {
            Self::Online
        } else {
            Self::Offline
        }
    }
}

/// Whether the remote store can currently be reached.
pub trait Reachability: Send + Sync {
    fn is_reachable(&self) -> impl Future<Output = bool> + Send;
}

/// Reachability flag toggled by the host.
#[derive(Debug)]
pub struct SharedReachability {
    online: AtomicBool,
}

impl SharedReachability {
    pub const fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl Default for SharedReachability {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Reachability for SharedReachability {
    async fn is_reachable(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

/// Probes `{base}/healthz`; any HTTP response counts as reachable.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    url: String,
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(base_url: &str) -> crate::Result<Self> {
        let base_url = normalize_text_option(Some(base_url.to_string()))
            .filter(|url| is_http_url(url))
            .ok_or_else(|| {
                crate::Error::Config("probe URL must include http:// or https://".to_string())
            })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(PROBE_TIMEOUT_SECS))
            .build()
            .map_err(crate::remote::RemoteError::from)?;

        Ok(Self {
            url: format!("{}/healthz", base_url.trim_end_matches('/')),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Reachability for HttpProbe {
    async fn is_reachable(&self) -> bool {
        match self.client.get(&self.url).send().await {
            Ok(_) => true,
            Err(error) => {
                tracing::debug!("Reachability probe to {} failed: {error}", self.url);
                false
            }
        }
    }
}

/// Re-checks reachability on every notification and flushes while the
/// network is up.
///
/// The last observed state is kept only to log transitions.
#[derive(Debug)]
pub struct ConnectivityWatcher<N> {
    reachability: Arc<N>,
    last_state: Option<NetworkState>,
}

impl<N: Reachability> ConnectivityWatcher<N> {
    pub const fn new(reachability: Arc<N>) -> Self {
        Self {
            reachability,
            last_state: None,
        }
    }

    pub const fn last_state(&self) -> Option<NetworkState> {
        self.last_state
    }

    /// Re-check reachability and return the current state.
    pub async fn observe(&mut self) -> NetworkState {
        let state = NetworkState::from(self.reachability.is_reachable().await);
        match self.last_state {
            Some(previous) if previous != state => {
                tracing::info!("Network state changed: {previous:?} -> {state:?}");
            }
            None => tracing::debug!("Initial network state: {state:?}"),
            Some(_) => {}
        }
        self.last_state = Some(state);
        state
    }

    /// Consume notifications until the sender side closes, invoking
    /// `on_reachable` after every check that finds the network up.
    pub async fn run<F, Fut>(mut self, mut notifications: mpsc::Receiver<()>, mut on_reachable: F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        while notifications.recv().await.is_some() {
            if self.observe().await == NetworkState::Online {
                on_reachable().await;
            }
        }
        tracing::debug!("Connectivity notifications closed; watcher stopped");
    }
}

/// Emit a "re-check reachability now" notification every `period`.
///
/// The first notification is sent immediately. The task ends once the
/// receiver is dropped.
pub fn interval_notifications(period: Duration) -> (mpsc::Receiver<()>, JoinHandle<()>) {
    let (sender, receiver) = mpsc::channel(1);
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            match sender.try_send(()) {
                Ok(()) | Err(mpsc::error::TrySendError::Full(())) => {}
                Err(mpsc::error::TrySendError::Closed(())) => break,
            }
        }
    });
    (receiver, task)
}
