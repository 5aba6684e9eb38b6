use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use tracing::info;

use crate::config::ServerConfig;
use crate::core::posts::{CatalogError, PostCatalog, PostLookup};
use crate::core::realtime::openai::OpenAIRealtimeConnector;

/// Why a new WebSocket connection was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionLimitError {
    GlobalLimitReached,
    PerIpLimitReached,
}

/// Process-wide state shared by every request.
///
/// Built once at startup. The catalog and connector are read-only; only the
/// connection counters change at runtime.
pub struct AppState {
    pub config: ServerConfig,
    pub posts: Arc<dyn PostLookup>,
    pub connector: OpenAIRealtimeConnector,
    ws_connections: AtomicUsize,
    ip_connections: DashMap<IpAddr, usize>,
}

impl AppState {
    /// Load the configured post catalog, or the bundled one.
    pub fn new(config: ServerConfig) -> Result<Arc<Self>, CatalogError> {
        let catalog = match &config.posts_path {
            Some(path) => PostCatalog::from_file(path)?,
            None => PostCatalog::bundled()?,
        };
        info!(posts = catalog.len(), "Post catalog loaded");
        Ok(Self::with_catalog(config, Arc::new(catalog)))
    }

    pub fn with_catalog(config: ServerConfig, posts: Arc<dyn PostLookup>) -> Arc<Self> {
        let connector =
            OpenAIRealtimeConnector::new(config.realtime.clone(), config.openai_api_key.clone());

        Arc::new(Self {
            config,
            posts,
            connector,
            ws_connections: AtomicUsize::new(0),
            ip_connections: DashMap::new(),
        })
    }

    /// Reserve a connection slot for `ip`.
    pub fn try_acquire_connection(&self, ip: IpAddr) -> Result<(), ConnectionLimitError> {
        if let Some(global_limit) = self.config.max_websocket_connections {
            let reserved = self
                .ws_connections
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                    (current < global_limit).then_some(current + 1)
                });
            if reserved.is_err() {
                return Err(ConnectionLimitError::GlobalLimitReached);
            }
        } else {
            self.ws_connections.fetch_add(1, Ordering::AcqRel);
        }

        // The entry guard holds the shard lock, so the per-IP check and
        // increment are atomic for this address.
        let mut per_ip = self.ip_connections.entry(ip).or_insert(0);
        if *per_ip >= self.config.max_connections_per_ip as usize {
            drop(per_ip);
            self.ws_connections.fetch_sub(1, Ordering::AcqRel);
            return Err(ConnectionLimitError::PerIpLimitReached);
        }
        *per_ip += 1;
        Ok(())
    }

    /// Return a slot taken by [`try_acquire_connection`](Self::try_acquire_connection).
    pub fn release_connection(&self, ip: IpAddr) {
        let _ = self
            .ws_connections
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current.checked_sub(1)
            });

        self.ip_connections.remove_if_mut(&ip, |_, count| {
            *count = count.saturating_sub(1);
            *count == 0
        });
    }

    pub fn ws_connection_count(&self) -> usize {
        self.ws_connections.load(Ordering::Acquire)
    }

    pub fn ip_connection_count(&self, ip: &IpAddr) -> usize {
        self.ip_connections.get(ip).map(|count| *count).unwrap_or(0)
    }
}
