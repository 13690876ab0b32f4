//! Identity and wiki fixtures

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use wiki_authorization::PermFlag;
use wiki_core::{Identity, MemoryStore, ObjectStore};
use wiki_model::{BlockType, Page, WikiSpace};

/// The usual owner
pub fn alice() -> Identity {
    Identity::named("alice")
}

/// The usual outsider
pub fn bob() -> Identity {
    Identity::named("bob")
}

/// A third actor
pub fn carol() -> Identity {
    Identity::named("carol")
}

/// Fresh in-memory store
pub fn memory_store() -> Arc<dyn ObjectStore> {
    Arc::new(MemoryStore::new())
}

/// Make `member` a member and enable the members write flag, acting as `owner`
pub fn grant_member(wiki: &WikiSpace, member: &Identity, owner: &Identity) {
    let logic = wiki.permission_logic();
    logic.members().add(member.clone(), Some(owner));
    logic.write_flags().add(PermFlag::Members, Some(owner));
}

/// Builder for populated wiki spaces owned by [`alice`]
#[derive(Debug, Clone, Default)]
pub struct WikiBuilder {
    title: Option<String>,
    owners: Option<Vec<Identity>>,
    pages: Vec<(String, usize)>,
}

impl WikiBuilder {
    /// Start an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the title
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Replace the owner set (default: alice)
    pub fn owners(mut self, owners: impl IntoIterator<Item = Identity>) -> Self {
        self.owners = Some(owners.into_iter().collect());
        self
    }

    /// Add page `name` holding `blocks` text blocks
    pub fn page(mut self, name: impl Into<String>, blocks: usize) -> Self {
        self.pages.push((name.into(), blocks));
        self
    }

    /// Build the space, acting as its first owner
    pub async fn build(self) -> Arc<WikiSpace> {
        let owners = self.owners.unwrap_or_else(|| vec![alice()]);
        let actor = owners.first().cloned();
        let wiki = Arc::new(WikiSpace::new(
            owners,
            self.title.unwrap_or_else(|| "Test Wiki".to_string()),
        ));

        for (name, blocks) in self.pages {
            let page = wiki
                .navigate_to(&name, actor.as_ref())
                .await
                .expect("page creation")
                .expect("owner may create pages");
            add_text_blocks(&page, blocks, actor.as_ref()).await;
        }
        wiki
    }
}

/// Append `count` text blocks to `page`
pub async fn add_text_blocks(page: &Page, count: usize, actor: Option<&Identity>) {
    for i in 0..count {
        let block = page
            .add_block(None, BlockType::Text, actor)
            .await
            .expect("block creation")
            .expect("actor may add blocks");
        block.set_value(format!("block {i}"), actor);
    }
}

/// Poll `condition` until it holds, failing the test after one second
pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    let polled = tokio::time::timeout(Duration::from_secs(1), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await;
    assert!(polled.is_ok(), "condition not reached within one second");
}

/// Await `future`, failing the test after one second
pub async fn within_a_second<T>(future: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(1), future)
        .await
        .expect("future did not complete within one second")
}
