//! Mesh handle for one running sync

use crate::config::{RetryPolicy, SyncConfig};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use wiki_core::{
    Identity, MeshEffects, ObjectHash, PeerGroup, SyncMode, SyncTarget, WikiError, WikiResult,
};

/// Mesh calls bound to one peer group, with retry and optional timeout
///
/// Created by the first `do_start` and dropped by `do_stop`.
pub(crate) struct MeshSession {
    mesh: Arc<dyn MeshEffects>,
    group: PeerGroup,
    mode: SyncMode,
    retry: RetryPolicy,
    call_timeout: Option<Duration>,
}

impl MeshSession {
    pub(crate) fn open(
        mesh: Arc<dyn MeshEffects>,
        space: ObjectHash,
        local_peer: Identity,
        config: &SyncConfig,
    ) -> Self {
        Self {
            mesh,
            group: PeerGroup::for_space(space, local_peer),
            mode: config.sync_mode,
            retry: config.retry.clone(),
            call_timeout: config.call_timeout,
        }
    }

    pub(crate) fn group(&self) -> &PeerGroup {
        &self.group
    }

    pub(crate) async fn subscribe(&self, target: SyncTarget) -> WikiResult<()> {
        self.call("sync", target.hash, || {
            self.mesh.sync(target, self.mode, &self.group)
        })
        .await
    }

    pub(crate) async fn unsubscribe(&self, target: SyncTarget) -> WikiResult<()> {
        self.call("stop_sync", target.hash, || {
            self.mesh.stop_sync(target, &self.group.id)
        })
        .await
    }

    pub(crate) async fn broadcast(&self, object: ObjectHash) -> WikiResult<()> {
        self.call("broadcast", object, || self.mesh.broadcast(object))
            .await
    }

    pub(crate) async fn stop_broadcast(&self, object: ObjectHash) -> WikiResult<()> {
        self.call("stop_broadcast", object, || self.mesh.stop_broadcast(object))
            .await
    }

    async fn call<F, Fut>(&self, operation: &'static str, object: ObjectHash, call: F) -> WikiResult<()>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = WikiResult<()>>,
    {
        let mut attempt = 0;
        loop {
            let result = match self.call_timeout {
                Some(limit) => tokio::time::timeout(limit, call())
                    .await
                    .unwrap_or_else(|_| Err(timeout_error(operation, limit))),
                None => call().await,
            };

            match result {
                Ok(()) => return Ok(()),
                Err(e) if e.is_transient() && self.retry.allows_retry(attempt) => {
                    let delay = self.retry.backoff_for(attempt);
                    tracing::warn!(
                        operation,
                        object = %object.short(),
                        attempt = attempt + 1,
                        error = %e,
                        "mesh call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::warn!(operation, object = %object.short(), error = %e, "mesh call failed");
                    return Err(e);
                }
            }
        }
    }
}

fn timeout_error(operation: &str, limit: Duration) -> WikiError {
    let millis = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
    WikiError::timeout(operation, millis)
}
