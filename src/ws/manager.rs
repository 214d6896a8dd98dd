//! Owner of every console shard of a client.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use backoff::ExponentialBackoff;
use backoff::backoff::Backoff as _;
use tokio::time::sleep;

use super::config::{Config, ReconnectConfig};
use super::shard::{Shard, ShardStatus};
use super::traits::Transport;
use crate::Result;
use crate::dict::Dict;
use crate::envelope::Frame;
use crate::error::Error;

/// Creates, tracks and tears down [`Shard`]s, one per server identifier.
///
/// Cloning is cheap; clones share the same shards. When the last clone is dropped
/// every shard is disconnected.
///
/// The process shutdown hook is opt-in. Only with [`Config::shutdown_hook`] set does
/// the manager listen for SIGINT/SIGTERM (Ctrl+C off Unix) and destroy its shards;
/// otherwise those signals keep their default behavior and cleanup relies on
/// [`ShardManager::destroy`] or dropping the manager.
#[derive(Clone)]
pub struct ShardManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    transport: Arc<dyn Transport>,
    config: Config,
    shards: Mutex<Dict<String, Shard>>,
    active: AtomicBool,
}

impl ManagerInner {
    fn shards(&self) -> MutexGuard<'_, Dict<String, Shard>> {
        // A poisoned map is still a consistent map; every mutation is a single call.
        self.shards.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn destroy(&self) {
        let shards: Vec<Shard> = {
            let mut guard = self.shards();
            let shards = guard.values().cloned().collect();
            guard.clear();
            shards
        };

        for shard in &shards {
            shard.disconnect();
        }
        self.active.store(false, Ordering::SeqCst);
    }
}

impl Drop for ManagerInner {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for ShardManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardManager")
            .field("shards", &self.ids())
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

impl ShardManager {
    /// Creates a manager whose shards fetch their credentials from `transport`.
    ///
    /// With [`Config::shutdown_hook`] set, this must run inside a Tokio runtime.
    #[must_use]
    pub fn new<T: Transport>(transport: T, config: Config) -> Self {
        Self::with_transport(Arc::new(transport), config)
    }

    #[must_use]
    pub fn with_transport(transport: Arc<dyn Transport>, config: Config) -> Self {
        let manager = Self {
            inner: Arc::new(ManagerInner {
                transport,
                config,
                shards: Mutex::new(Dict::new()),
                active: AtomicBool::new(false),
            }),
        };

        if manager.inner.config.shutdown_hook {
            install_shutdown_hook(Arc::downgrade(&manager.inner));
        }

        manager
    }

    /// Returns the shard of `id`, creating a closed one if there is none yet.
    ///
    /// The shard is not connected; subscribe to its events, then call
    /// [`Shard::connect`].
    pub fn create_shard(&self, id: &str) -> Result<Shard> {
        let mut shards = self.inner.shards();
        let key = id.to_owned();

        if let Some(shard) = shards.get(&key) {
            return Ok(shard.clone());
        }

        let shard = Shard::new(
            id,
            Arc::clone(&self.inner.transport),
            self.inner.config.clone(),
        );
        shards.set(key, shard.clone())?;
        self.inner.active.store(true, Ordering::SeqCst);

        Ok(shard)
    }

    #[must_use]
    pub fn shard(&self, id: &str) -> Option<Shard> {
        self.inner.shards().get(&id.to_owned()).cloned()
    }

    /// Disconnects and forgets the shard of `id`. Returns `false` if there was none.
    pub fn delete_shard(&self, id: &str) -> bool {
        let removed = {
            let mut shards = self.inner.shards();
            let removed = shards.take(&id.to_owned());
            self.inner.active.store(!shards.is_empty(), Ordering::SeqCst);
            removed
        };

        match removed {
            Some(shard) => {
                shard.disconnect();
                true
            }
            None => false,
        }
    }

    /// Whether the manager holds at least one shard.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.shards().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.shards().is_empty()
    }

    /// Server identifiers in the order their shards were created.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.inner.shards().keys().cloned().collect()
    }

    /// Mean auth round trip over the shards that completed a handshake, `None` if
    /// none has.
    #[must_use]
    pub fn ping(&self) -> Option<Duration> {
        let pings: Vec<Duration> = self
            .snapshot()
            .iter()
            .filter_map(Shard::ping)
            .collect();

        let count = u32::try_from(pings.len()).ok()?;
        pings.iter().sum::<Duration>().checked_div(count)
    }

    /// Sends `event` to every shard, one after the other, and collects each shard's
    /// first `reply` frame. Results are in shard creation order.
    pub async fn broadcast(
        &self,
        event: &str,
        args: Vec<String>,
        reply: &str,
    ) -> Vec<Result<Frame>> {
        let shards = self.snapshot();
        let mut replies = Vec::with_capacity(shards.len());

        for shard in shards {
            replies.push(shard.request(event, args.clone(), reply).await);
        }

        replies
    }

    /// Disconnects and forgets every shard.
    pub fn destroy(&self) {
        self.inner.destroy();
    }

    /// Connects the shard of `id`, retrying with exponential backoff until it opens
    /// or the attempts of `config` are used up.
    ///
    /// Shards never reconnect by themselves; call this after observing
    /// [`crate::ws::ShardEvent::ServerDisconnect`] if the connection should come back.
    pub async fn reconnect(&self, id: &str, config: &ReconnectConfig) -> Result<()> {
        let shard = self
            .shard(id)
            .ok_or_else(|| Error::validation(format!("no shard for server {id}")))?;
        let mut backoff: ExponentialBackoff = config.clone().into();
        let mut attempt = 0_u32;

        loop {
            attempt = attempt.saturating_add(1);

            let error = match shard.connect_and_wait().await {
                Ok(()) => return Ok(()),
                Err(e) => e,
            };

            #[cfg(feature = "tracing")]
            tracing::warn!(shard = %id, attempt, error = %error, "reconnect attempt failed");

            if shard.status() != ShardStatus::Closed {
                shard.disconnect();
            }

            if let Some(max) = config.max_attempts
                && attempt >= max
            {
                return Err(error);
            }

            match backoff.next_backoff() {
                Some(duration) => sleep(duration).await,
                None => return Err(error),
            }
        }
    }

    fn snapshot(&self) -> Vec<Shard> {
        self.inner.shards().values().cloned().collect()
    }
}

/// Destroys the manager on SIGINT or SIGTERM (Ctrl+C off Unix). The task ends
/// quietly once the manager is gone.
fn install_shutdown_hook(manager: Weak<ManagerInner>) {
    if tokio::runtime::Handle::try_current().is_err() {
        #[cfg(feature = "tracing")]
        tracing::warn!("no Tokio runtime, shard manager shutdown hook not installed");
        return;
    }

    tokio::spawn(async move {
        if let Err(e) = shutdown_signal().await {
            #[cfg(feature = "tracing")]
            tracing::error!("unable to listen for shutdown signals: {e}");
            #[cfg(not(feature = "tracing"))]
            let _: &std::io::Error = &e;
            return;
        }

        if let Some(manager) = manager.upgrade() {
            #[cfg(feature = "tracing")]
            tracing::info!("shutdown signal received, destroying shards");
            manager.destroy();
        }
    });
}

async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::error::Kind;
    use crate::ws::ConnectionAuth;

    struct Unreachable;

    #[async_trait]
    impl Transport for Unreachable {
        async fn connection_auth(&self, _server_id: &str) -> Result<ConnectionAuth> {
            Err(Error::validation("panel unreachable"))
        }
    }

    fn manager() -> ShardManager {
        ShardManager::new(Unreachable, Config::default())
    }

    #[test]
    fn create_shard_is_idempotent() {
        let manager = manager();
        assert!(!manager.is_active());

        let first = manager.create_shard("1a7ce997").unwrap();
        let second = manager.create_shard("1a7ce997").unwrap();
        manager.create_shard("5f2bc3a1").unwrap();

        assert_eq!(first.id(), second.id());
        assert_eq!(first.status(), ShardStatus::Closed);
        assert_eq!(manager.ids(), vec!["1a7ce997", "5f2bc3a1"]);
        assert!(manager.is_active());
    }

    #[test]
    fn delete_shard_updates_active() {
        let manager = manager();
        manager.create_shard("a").unwrap();

        assert!(!manager.delete_shard("missing"));
        assert!(manager.is_active());
        assert!(manager.delete_shard("a"));
        assert!(!manager.is_active());
        assert!(manager.shard("a").is_none());
    }

    #[test]
    fn destroy_clears_everything() {
        let manager = manager();
        manager.create_shard("a").unwrap();
        manager.create_shard("b").unwrap();

        manager.destroy();
        assert!(manager.is_empty());
        assert!(!manager.is_active());
    }

    #[test]
    fn ping_without_handshakes_is_none() {
        let manager = manager();
        assert_eq!(manager.ping(), None);

        manager.create_shard("a").unwrap();
        assert_eq!(manager.ping(), None);
    }

    #[tokio::test]
    async fn connect_failure_propagates_and_resets() {
        let manager = manager();
        let shard = manager.create_shard("a").unwrap();

        let err = shard.connect().await.unwrap_err();
        assert_eq!(err.kind(), Kind::Validation);
        assert_eq!(shard.status(), ShardStatus::Closed);
    }

    #[tokio::test]
    async fn reconnect_gives_up_after_max_attempts() {
        let manager = manager();
        manager.create_shard("a").unwrap();

        let config = ReconnectConfig::default()
            .with_max_attempts(Some(2))
            .with_initial_backoff(Duration::from_millis(1))
            .with_max_backoff(Duration::from_millis(2));

        let err = manager.reconnect("a", &config).await.unwrap_err();
        assert_eq!(err.kind(), Kind::Validation);

        let err = manager.reconnect("missing", &config).await.unwrap_err();
        assert_eq!(err.kind(), Kind::Validation);
    }
}
