//! Structural changes while sync is running.

use std::sync::{Arc, OnceLock};
use wiki_core::{Identity, MeshEffects, ObjectStore, TargetKind};
use wiki_model::{BlockType, WikiSpace};
use wiki_sync::{SyncConfig, SyncResources, WikiSync};
use wiki_testkit::*;

struct Running {
    mesh: Arc<RecordingMesh>,
    wiki: Arc<WikiSpace>,
    sync: Arc<WikiSync>,
}

async fn running(wiki: Arc<WikiSpace>, store: Arc<dyn ObjectStore>) -> Running {
    init_tracing();
    let mesh = RecordingMesh::shared();
    let resources = SyncResources::new(mesh.clone() as Arc<dyn MeshEffects>)
        .with_identity(alice())
        .with_store(store);
    let sync = WikiSync::new(wiki.clone(), SyncConfig::for_testing(), resources);
    sync.start_sync().await.unwrap();
    mesh.clear_calls();
    Running { mesh, wiki, sync }
}

async fn running_sample() -> Running {
    let wiki = WikiBuilder::new().page("Ideas", 2).page("Notes", 1).build().await;
    running(wiki, memory_store()).await
}

/// Acting owner of every fixture space
fn owner() -> Option<&'static Identity> {
    static OWNER: OnceLock<Identity> = OnceLock::new();
    Some(OWNER.get_or_init(alice))
}

#[tokio::test]
async fn added_block_is_subscribed_once() {
    let Running { mesh, wiki, sync } = running_sample().await;
    let ideas = wiki.get_page("Ideas").unwrap();

    let block = ideas
        .add_block(None, BlockType::Text, owner())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sync.pending_events(), 1);
    assert!(!sync.is_block_subscribed(&ideas.id(), &block.id()));

    assert_eq!(sync.drain_events().await, 1);
    assert_eq!(mesh.sync_call_count(), 1);
    assert_eq!(mesh.sync_calls_for(&block.id()), 1);
    assert!(sync.is_block_subscribed(&ideas.id(), &block.id()));
    assert_eq!(sync.pending_events(), 0);
}

#[tokio::test]
async fn moving_a_block_changes_no_subscription() {
    let Running { mesh, wiki, sync } = running_sample().await;
    let ideas = wiki.get_page("Ideas").unwrap();

    assert!(ideas.move_block(0, 1, owner()).await.unwrap());
    sync.drain_events().await;

    assert_eq!(mesh.sync_call_count(), 0);
    assert_eq!(sync.subscribed_blocks(), 3);
}

#[tokio::test]
async fn removed_block_is_unsubscribed() {
    let Running { mesh, wiki, sync } = running_sample().await;
    let ideas = wiki.get_page("Ideas").unwrap();
    let block = ideas.blocks().value_at(0).unwrap();

    assert!(ideas.remove_block(&block.id(), owner()).await.unwrap());
    assert!(!ideas.remove_block(&block.id(), owner()).await.unwrap());
    sync.drain_events().await;

    assert_eq!(mesh.stop_calls_for(&block.id()), 1);
    assert!(!mesh.is_syncing(&block.id()));
    assert!(!sync.is_block_subscribed(&ideas.id(), &block.id()));
    assert_eq!(sync.subscribed_blocks(), 2);
}

#[tokio::test]
async fn added_page_is_subscribed_with_its_blocks() {
    let Running { mesh, wiki, sync } = running_sample().await;

    let later = wiki.navigate_to("Later", owner()).await.unwrap().unwrap();
    add_text_blocks(&later, 2, owner()).await;
    // the page event arrives before its watch exists
    assert_eq!(sync.pending_events(), 1);

    sync.drain_events().await;
    assert!(sync.is_page_subscribed(&later.id()));
    assert!(mesh.is_syncing(&later.blocks().id()));
    assert_eq!(sync.subscribed_blocks(), 5);
    assert_eq!(mesh.sync_call_count(), 3);

    // later blocks flow through the page watch
    add_text_blocks(&later, 1, owner()).await;
    assert_eq!(sync.drain_events().await, 1);
    assert_eq!(mesh.active_of_kind(TargetKind::Block), 6);
}

#[tokio::test]
async fn removed_page_is_torn_down() {
    let Running { mesh, wiki, sync } = running_sample().await;
    let ideas = wiki.get_page("Ideas").unwrap();
    let blocks = ideas.blocks().contents();

    assert!(wiki.remove_page(&ideas.id(), owner()).await.unwrap());
    assert_eq!(sync.drain_events().await, 1);

    assert!(!sync.is_page_subscribed(&ideas.id()));
    assert!(!mesh.is_syncing(&ideas.blocks().id()));
    for block in &blocks {
        assert!(!mesh.is_syncing(&block.id()));
    }
    assert!(!ideas.blocks().is_watched());

    // the removed page's blocks no longer produce events
    add_text_blocks(&ideas, 1, owner()).await;
    assert_eq!(sync.pending_events(), 0);

    assert!(!wiki.remove_page(&ideas.id(), owner()).await.unwrap());
    assert_eq!(sync.drain_events().await, 0);
}

#[tokio::test]
async fn add_then_remove_before_draining_settles_clean() {
    let Running { mesh, wiki, sync } = running_sample().await;

    let draft = wiki.navigate_to("Draft", owner()).await.unwrap().unwrap();
    assert!(wiki.remove_page(&draft.id(), owner()).await.unwrap());
    assert_eq!(sync.drain_events().await, 2);

    assert!(!sync.is_page_subscribed(&draft.id()));
    assert!(!mesh.is_syncing(&draft.blocks().id()));
    assert_eq!(sync.subscribed_pages(), 2);
}

#[tokio::test]
async fn events_after_stop_cause_no_calls() {
    let Running { mesh, wiki, sync } = running_sample().await;
    sync.stop_sync().await.unwrap();
    mesh.clear_calls();

    wiki.navigate_to("Later", owner()).await.unwrap().unwrap();
    let ideas = wiki.get_page("Ideas").unwrap();
    add_text_blocks(&ideas, 1, owner()).await;

    assert_eq!(sync.pending_events(), 0);
    assert_eq!(sync.drain_events().await, 0);
    assert!(mesh.calls().is_empty());
}

#[tokio::test]
async fn denied_edits_produce_no_events() {
    let Running { mesh, wiki, sync } = running_sample().await;
    let ideas = wiki.get_page("Ideas").unwrap();

    let added = ideas
        .add_block(None, BlockType::Text, Some(&carol()))
        .await
        .unwrap();
    assert!(added.is_none());
    assert!(wiki.navigate_to("Spam", Some(&carol())).await.unwrap().is_none());

    assert_eq!(sync.pending_events(), 0);
    assert_eq!(sync.drain_events().await, 0);
    assert!(mesh.calls().is_empty());
}

#[tokio::test]
async fn member_edits_are_synced() {
    let Running { mesh, wiki, sync } = running_sample().await;
    grant_member(&wiki, &bob(), &alice());

    let page = wiki.navigate_to("Bob's page", Some(&bob())).await.unwrap().unwrap();
    add_text_blocks(&page, 1, Some(&bob())).await;
    sync.drain_events().await;

    assert!(sync.is_page_subscribed(&page.id()));
    assert!(mesh.is_syncing(&page.blocks().id()));
    assert_eq!(sync.subscribed_blocks(), 4);
}

#[tokio::test]
async fn event_pump_applies_changes_in_the_background() {
    let Running { mesh, wiki, sync } = running_sample().await;
    let pump = sync.spawn_event_pump();

    let later = wiki.navigate_to("Later", owner()).await.unwrap().unwrap();
    let target = later.blocks().id();
    wait_until(|| mesh.is_syncing(&target)).await;

    let block = later
        .add_block(None, BlockType::Image, owner())
        .await
        .unwrap()
        .unwrap();
    let id = block.id();
    wait_until(|| mesh.is_syncing(&id)).await;

    pump.abort();
}

#[tokio::test]
async fn pump_ends_when_the_manager_is_dropped() {
    let Running { wiki, sync, .. } = running_sample().await;
    let pump = sync.spawn_event_pump();
    drop(sync);

    // the next event wakes the pump, which finds the manager gone
    wiki.navigate_to("Later", owner()).await.unwrap();
    within_a_second(pump).await.unwrap();
}

#[tokio::test]
async fn restored_checkpoint_is_resubscribed() {
    let store = memory_store();
    let origin = WikiBuilder::new().page("Ideas", 2).page("Notes", 1).build().await;
    origin.set_store(store.clone());
    origin.save_all().await.unwrap();

    let replica = Arc::new(WikiSpace::load(store.clone(), origin.id()).await.unwrap());
    let Running { mesh, sync, .. } = running(replica.clone(), store.clone()).await;
    let old_notes = replica.get_page("Notes").unwrap();
    assert!(old_notes.blocks().is_watched());

    // origin diverges: Ideas goes, Later arrives
    let ideas = origin.get_page("Ideas").unwrap();
    assert!(origin.remove_page(&ideas.id(), owner()).await.unwrap());
    let later = origin.navigate_to("Later", owner()).await.unwrap().unwrap();
    add_text_blocks(&later, 1, owner()).await;
    origin.save_all().await.unwrap();

    assert_eq!(replica.load_checkpoint().await.unwrap(), 2);
    assert_eq!(sync.drain_events().await, 1);

    assert!(!sync.is_page_subscribed(&ideas.id()));
    assert!(!mesh.is_syncing(&ideas.blocks().id()));
    assert!(sync.is_page_subscribed(&later.id()));
    assert!(mesh.is_syncing(&later.blocks().value_at(0).unwrap().id()));
    assert_eq!(sync.subscribed_pages(), 2);
    assert_eq!(sync.subscribed_blocks(), 2);

    // the restored Notes object is watched in place of the old one
    let new_notes = replica.get_page("Notes").unwrap();
    assert!(!Arc::ptr_eq(&old_notes, &new_notes));
    assert!(!old_notes.blocks().is_watched());
    assert!(new_notes.blocks().is_watched());
    assert_eq!(mesh.sync_calls_for(&new_notes.blocks().id()), 0);
}

#[tokio::test]
async fn restored_page_drops_blocks_it_no_longer_holds() {
    let store = memory_store();
    let origin = WikiBuilder::new().page("Notes", 2).build().await;
    origin.set_store(store.clone());
    origin.save_all().await.unwrap();

    let replica = Arc::new(WikiSpace::load(store.clone(), origin.id()).await.unwrap());
    let Running { mesh, sync, .. } = running(replica.clone(), store.clone()).await;
    assert_eq!(sync.subscribed_blocks(), 2);

    let notes = origin.get_page("Notes").unwrap();
    let gone = notes.blocks().value_at(0).unwrap();
    let kept = notes.blocks().value_at(1).unwrap();
    assert!(notes.remove_block(&gone.id(), owner()).await.unwrap());

    assert_eq!(replica.load_checkpoint().await.unwrap(), 1);
    sync.drain_events().await;

    let restored = replica.get_page("Notes").unwrap();
    assert_eq!(restored.blocks().len(), 1);
    assert_eq!(sync.subscribed_blocks(), 1);
    assert!(!sync.is_block_subscribed(&restored.id(), &gone.id()));
    assert!(!mesh.is_syncing(&gone.id()));
    assert_eq!(mesh.stop_calls_for(&gone.id()), 1);
    assert!(mesh.is_syncing(&kept.id()));
}

/// Running sync over a mesh that suspends inside every call
async fn running_yielding() -> (Arc<YieldingMesh>, Arc<WikiSpace>, Arc<WikiSync>) {
    init_tracing();
    let mesh = YieldingMesh::shared();
    let wiki = WikiBuilder::new().page("Ideas", 2).page("Notes", 1).build().await;
    let resources = SyncResources::new(mesh.clone() as Arc<dyn MeshEffects>)
        .with_identity(alice())
        .with_store(memory_store());
    let sync = WikiSync::new(wiki.clone(), SyncConfig::for_testing(), resources);
    sync.start_sync().await.unwrap();
    (mesh, wiki, sync)
}

#[tokio::test]
async fn stop_racing_a_queued_page_leaves_nothing_behind() {
    let (mesh, wiki, sync) = running_yielding().await;
    let later = wiki.navigate_to("Later", owner()).await.unwrap().unwrap();
    assert_eq!(sync.pending_events(), 1);

    let (stopped, applied) = tokio::join!(sync.stop_sync(), sync.drain_events());
    stopped.unwrap();
    assert_eq!(applied, 1);

    assert!(!sync.is_synchronizing());
    assert!(sync.is_idle());
    assert_eq!(mesh.inner().active_count(), 0);
    assert_eq!(mesh.inner().broadcast_count(), 0);
    assert!(!mesh.inner().is_syncing(&later.blocks().id()));
    assert!(!later.blocks().is_watched());
    assert!(!wiki.pages().is_watched());
}

#[tokio::test]
async fn queued_page_applied_before_a_racing_stop_is_torn_down() {
    let (mesh, wiki, sync) = running_yielding().await;
    let later = wiki.navigate_to("Later", owner()).await.unwrap().unwrap();
    add_text_blocks(&later, 1, owner()).await;

    let (applied, stopped) = tokio::join!(sync.drain_events(), sync.stop_sync());
    stopped.unwrap();
    assert_eq!(applied, 1);

    assert!(sync.is_idle());
    assert_eq!(mesh.inner().active_count(), 0);
    assert!(!later.blocks().is_watched());
    assert!(mesh.inner().stops_without_sync().is_empty());
}

#[tokio::test]
async fn removal_during_start_settles_without_orphan_calls() {
    init_tracing();
    // vary when the removal lands relative to the start traversal
    for delay in 0..40 {
        let mesh = YieldingMesh::shared();
        let wiki = WikiBuilder::new().page("Ideas", 2).page("Notes", 1).build().await;
        let ideas = wiki.get_page("Ideas").unwrap();
        let resources = SyncResources::new(mesh.clone() as Arc<dyn MeshEffects>)
            .with_identity(alice())
            .with_store(memory_store());
        let sync = WikiSync::new(wiki.clone(), SyncConfig::for_testing(), resources);

        let (started, _) = tokio::join!(sync.start_sync(), async {
            for _ in 0..delay {
                tokio::task::yield_now().await;
            }
            assert!(wiki.remove_page(&ideas.id(), owner()).await.unwrap());
            sync.drain_events().await
        });
        started.unwrap();
        sync.drain_events().await;

        let recorder = mesh.inner();
        assert!(recorder.stops_without_sync().is_empty(), "delay {delay}");
        assert!(!sync.is_page_subscribed(&ideas.id()), "delay {delay}");
        assert!(!recorder.is_syncing(&ideas.blocks().id()), "delay {delay}");
        for block in ideas.blocks().contents() {
            assert!(!recorder.is_syncing(&block.id()), "delay {delay}");
        }
        // Notes collection, its block and the six space-level targets
        assert_eq!(recorder.active_count(), 8, "delay {delay}");

        sync.stop_sync().await.unwrap();
        assert_eq!(recorder.active_count(), 0, "delay {delay}");
        assert!(recorder.stops_without_sync().is_empty(), "delay {delay}");
        assert!(sync.is_idle(), "delay {delay}");
    }
}
