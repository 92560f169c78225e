//! `simulate` subcommand.
//!
//! Every simulated tab owns a [`ClientLockCoordinator`] and all of them share
//! one store of the configured kind, the way browser tabs share
//! `document.cookie` or `localStorage`.  Each tab
//! increments a counter in the session record; with the lock off, lost
//! updates show up as a final count below the expected one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use ts_domain::config::{Config, LockConfig, StorageKind};
use ts_sessions::{
    retrieve_session, ClientLockCoordinator, CookieOptions, InMemoryCookieJar,
    InMemoryKeyValueStore, LockRequest, MemorySlot, SessionState, StorageBackend,
};

const COUNTER_KEY: &str = "count";

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub storage: StorageKind,
    pub tabs: usize,
    pub increments: usize,
    pub lock_enabled: bool,
    pub expected: u64,
    pub final_count: u64,
    /// Requests whose `after` ran; the rest gave up on contention.
    pub completed: u64,
}

impl SimulationReport {
    pub fn lost_updates(&self) -> u64 {
        self.completed.saturating_sub(self.final_count)
    }
}

fn counter(session: &SessionState) -> u64 {
    session
        .get(COUNTER_KEY)
        .and_then(|c| c.parse().ok())
        .unwrap_or(0)
}

/// Fresh shared store of the given kind.  Memory uses a private slot rather
/// than the process-wide one so runs do not see each other.
fn shared_backend(kind: StorageKind) -> StorageBackend {
    match kind {
        StorageKind::Cookie => StorageBackend::cookie(Arc::new(InMemoryCookieJar::new())),
        StorageKind::LocalStorage => {
            StorageBackend::local_storage(Arc::new(InMemoryKeyValueStore::new()))
        }
        StorageKind::SessionStorage => {
            StorageBackend::session_storage(Arc::new(InMemoryKeyValueStore::new()))
        }
        StorageKind::Memory => StorageBackend::memory(MemorySlot::new()),
    }
}

pub async fn run(
    config: &Config,
    tabs: usize,
    increments: usize,
    lock_enabled: bool,
) -> anyhow::Result<SimulationReport> {
    let backend = shared_backend(config.storage.kind).configured(&config.storage);
    let options = CookieOptions::from(&config.storage.cookie);
    let lock = LockConfig {
        enabled: lock_enabled,
        ..config.lock.clone()
    };
    let completed = Arc::new(AtomicU64::new(0));

    let mut coordinators = Vec::with_capacity(tabs);
    let mut handles = Vec::with_capacity(tabs);
    for tab in 0..tabs {
        let coordinator = ClientLockCoordinator::new(&lock)?;
        coordinators.push(coordinator.clone());

        let backend = backend.clone();
        let options = options.clone();
        let completed = completed.clone();
        handles.push(tokio::spawn(async move {
            for _ in 0..increments {
                let completed = completed.clone();
                coordinator.with_client_lock_access(
                    LockRequest::new(backend.clone(), options.clone(), |s| {
                        let next = counter(&s) + 1;
                        Some(s.with(COUNTER_KEY, next.to_string()))
                    })
                    .after(move |_| {
                        completed.fetch_add(1, Ordering::SeqCst);
                    }),
                );
                tokio::task::yield_now().await;
            }
            tracing::debug!(tab, "tab submitted all requests");
        }));
    }
    for handle in handles {
        handle.await?;
    }

    while !coordinators.iter().all(ClientLockCoordinator::is_idle) {
        tokio::time::sleep(lock.retry_delay()).await;
    }

    let report = SimulationReport {
        storage: backend.kind(),
        tabs,
        increments,
        lock_enabled,
        expected: (tabs * increments) as u64,
        final_count: counter(&retrieve_session(&backend)),
        completed: completed.load(Ordering::SeqCst),
    };
    tracing::info!(
        storage = %report.storage,
        expected = report.expected,
        final_count = report.final_count,
        completed = report.completed,
        "simulation finished"
    );
    Ok(report)
}
