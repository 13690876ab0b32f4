//! Mesh doubles
//!
//! [`RecordingMesh`] logs every call and tracks what is currently synced and
//! broadcast, so tests can assert on the live subscription tree.
//! [`FlakyMesh`] fails a configurable number of calls before delegating.
//! [`YieldingMesh`] suspends around every call so tests can interleave tasks.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use wiki_core::{
    MeshEffects, ObjectHash, PeerGroup, PeerGroupId, SyncMode, SyncTarget, TargetKind, WikiError,
    WikiResult,
};

/// One call made against a mesh double
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeshCall {
    /// `broadcast(object)`
    Broadcast(ObjectHash),
    /// `stop_broadcast(object)`
    StopBroadcast(ObjectHash),
    /// `sync(target, mode, group)`
    Sync(SyncTarget, SyncMode, PeerGroupId),
    /// `stop_sync(target, group)`
    StopSync(SyncTarget, PeerGroupId),
}

#[derive(Debug, Default)]
struct MeshState {
    calls: Vec<MeshCall>,
    active: BTreeSet<SyncTarget>,
    broadcasting: BTreeSet<ObjectHash>,
}

/// Mesh that records calls and keeps the resulting state
#[derive(Debug, Default)]
pub struct RecordingMesh {
    state: Mutex<MeshState>,
}

impl RecordingMesh {
    /// Create an empty mesh
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a shared mesh
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Every call so far, in order
    pub fn calls(&self) -> Vec<MeshCall> {
        self.state.lock().calls.clone()
    }

    /// Forget the call log (state is kept)
    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Currently synced targets
    pub fn active_targets(&self) -> BTreeSet<SyncTarget> {
        self.state.lock().active.clone()
    }

    /// Number of currently synced targets
    pub fn active_count(&self) -> usize {
        self.state.lock().active.len()
    }

    /// Number of currently synced targets of `kind`
    pub fn active_of_kind(&self, kind: TargetKind) -> usize {
        self.state
            .lock()
            .active
            .iter()
            .filter(|t| t.kind == kind)
            .count()
    }

    /// Whether `object` is synced in any role
    pub fn is_syncing(&self, object: &ObjectHash) -> bool {
        self.state.lock().active.iter().any(|t| t.hash == *object)
    }

    /// Whether `object` is being broadcast
    pub fn is_broadcasting(&self, object: &ObjectHash) -> bool {
        self.state.lock().broadcasting.contains(object)
    }

    /// Number of objects being broadcast
    pub fn broadcast_count(&self) -> usize {
        self.state.lock().broadcasting.len()
    }

    /// Number of `sync` calls naming `object`
    pub fn sync_calls_for(&self, object: &ObjectHash) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| matches!(c, MeshCall::Sync(t, _, _) if t.hash == *object))
            .count()
    }

    /// Number of `stop_sync` calls naming `object`
    pub fn stop_calls_for(&self, object: &ObjectHash) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| matches!(c, MeshCall::StopSync(t, _) if t.hash == *object))
            .count()
    }

    /// `stop_sync` calls naming a target that was never synced before them
    pub fn stops_without_sync(&self) -> Vec<SyncTarget> {
        let state = self.state.lock();
        let mut synced = BTreeSet::new();
        let mut orphans = Vec::new();
        for call in &state.calls {
            match call {
                MeshCall::Sync(target, _, _) => {
                    synced.insert(*target);
                }
                MeshCall::StopSync(target, _) if !synced.contains(target) => {
                    orphans.push(*target);
                }
                _ => {}
            }
        }
        orphans
    }

    /// Number of `sync` calls of any kind
    pub fn sync_call_count(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| matches!(c, MeshCall::Sync(..)))
            .count()
    }
}

#[async_trait]
impl MeshEffects for RecordingMesh {
    async fn broadcast(&self, object: ObjectHash) -> WikiResult<()> {
        let mut state = self.state.lock();
        state.calls.push(MeshCall::Broadcast(object));
        state.broadcasting.insert(object);
        Ok(())
    }

    async fn stop_broadcast(&self, object: ObjectHash) -> WikiResult<()> {
        let mut state = self.state.lock();
        state.calls.push(MeshCall::StopBroadcast(object));
        state.broadcasting.remove(&object);
        Ok(())
    }

    async fn sync(&self, target: SyncTarget, mode: SyncMode, group: &PeerGroup) -> WikiResult<()> {
        let mut state = self.state.lock();
        state
            .calls
            .push(MeshCall::Sync(target, mode, group.id.clone()));
        state.active.insert(target);
        Ok(())
    }

    async fn stop_sync(&self, target: SyncTarget, group: &PeerGroupId) -> WikiResult<()> {
        let mut state = self.state.lock();
        state.calls.push(MeshCall::StopSync(target, group.clone()));
        state.active.remove(&target);
        Ok(())
    }
}

/// Mesh whose first calls fail with a transient network error
#[derive(Debug)]
pub struct FlakyMesh {
    inner: Arc<RecordingMesh>,
    failures_left: AtomicUsize,
    failed: AtomicUsize,
}

impl FlakyMesh {
    /// Fail the next `failures` calls, then behave like a [`RecordingMesh`]
    pub fn new(failures: usize) -> Self {
        Self {
            inner: RecordingMesh::shared(),
            failures_left: AtomicUsize::new(failures),
            failed: AtomicUsize::new(0),
        }
    }

    /// Recording mesh the successful calls reach
    pub fn inner(&self) -> &Arc<RecordingMesh> {
        &self.inner
    }

    /// Arm `failures` more failing calls
    pub fn fail_next(&self, failures: usize) {
        self.failures_left.store(failures, Ordering::SeqCst);
    }

    /// Number of calls that were failed so far
    pub fn failed_calls(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    fn inject(&self, operation: &str) -> WikiResult<()> {
        let took = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if took.is_ok() {
            self.failed.fetch_add(1, Ordering::SeqCst);
            tracing::debug!(operation, "injecting mesh failure");
            return Err(WikiError::network(format!("injected {operation} failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl MeshEffects for FlakyMesh {
    async fn broadcast(&self, object: ObjectHash) -> WikiResult<()> {
        self.inject("broadcast")?;
        self.inner.broadcast(object).await
    }

    async fn stop_broadcast(&self, object: ObjectHash) -> WikiResult<()> {
        self.inject("stop_broadcast")?;
        self.inner.stop_broadcast(object).await
    }

    async fn sync(&self, target: SyncTarget, mode: SyncMode, group: &PeerGroup) -> WikiResult<()> {
        self.inject("sync")?;
        self.inner.sync(target, mode, group).await
    }

    async fn stop_sync(&self, target: SyncTarget, group: &PeerGroupId) -> WikiResult<()> {
        self.inject("stop_sync")?;
        self.inner.stop_sync(target, group).await
    }
}

/// Mesh that yields to the scheduler around every call
///
/// Lets a concurrently running task interleave with an in-flight pass on a
/// single-threaded runtime.
#[derive(Debug, Default)]
pub struct YieldingMesh {
    inner: Arc<RecordingMesh>,
}

impl YieldingMesh {
    /// Create a shared mesh over a fresh [`RecordingMesh`]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Recording mesh every call reaches
    pub fn inner(&self) -> &Arc<RecordingMesh> {
        &self.inner
    }
}

#[async_trait]
impl MeshEffects for YieldingMesh {
    async fn broadcast(&self, object: ObjectHash) -> WikiResult<()> {
        tokio::task::yield_now().await;
        self.inner.broadcast(object).await?;
        tokio::task::yield_now().await;
        Ok(())
    }

    async fn stop_broadcast(&self, object: ObjectHash) -> WikiResult<()> {
        tokio::task::yield_now().await;
        self.inner.stop_broadcast(object).await?;
        tokio::task::yield_now().await;
        Ok(())
    }

    async fn sync(&self, target: SyncTarget, mode: SyncMode, group: &PeerGroup) -> WikiResult<()> {
        tokio::task::yield_now().await;
        self.inner.sync(target, mode, group).await?;
        tokio::task::yield_now().await;
        Ok(())
    }

    async fn stop_sync(&self, target: SyncTarget, group: &PeerGroupId) -> WikiResult<()> {
        tokio::task::yield_now().await;
        self.inner.stop_sync(target, group).await?;
        tokio::task::yield_now().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiki_core::Identity;

    fn group() -> PeerGroup {
        PeerGroup::for_space(ObjectHash::of(b"wiki"), Identity::named("alice"))
    }

    #[tokio::test]
    async fn recording_mesh_tracks_state() {
        let mesh = RecordingMesh::new();
        let target = SyncTarget::new(ObjectHash::of(b"pages"), TargetKind::Pages);

        mesh.sync(target, SyncMode::Single, &group()).await.unwrap();
        mesh.sync(target, SyncMode::Single, &group()).await.unwrap();
        assert_eq!(mesh.active_count(), 1);
        assert_eq!(mesh.sync_calls_for(&target.hash), 2);

        mesh.stop_sync(target, &group().id).await.unwrap();
        assert_eq!(mesh.active_count(), 0);
        assert_eq!(mesh.stop_calls_for(&target.hash), 1);
    }

    #[tokio::test]
    async fn flaky_mesh_recovers_after_failures() {
        let mesh = FlakyMesh::new(2);
        let object = ObjectHash::of(b"wiki");

        assert!(mesh.broadcast(object).await.unwrap_err().is_transient());
        assert!(mesh.broadcast(object).await.is_err());
        mesh.broadcast(object).await.unwrap();

        assert_eq!(mesh.failed_calls(), 2);
        assert!(mesh.inner().is_broadcasting(&object));
    }
}
