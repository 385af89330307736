//! Discovery feeds: producers of entities to enrich.

mod camera;
mod inventory;

use futures::stream::{self, BoxStream, StreamExt};
use vigil_model::Entity;

pub use self::camera::{CameraSweep, GENERIC_PRODUCT, SweepFinding};
pub use self::inventory::{InventoryError, load_inventory};

/// A finite, ordered producer of entities for one run.
pub trait DiscoveryFeed: Send + Sync {
    fn name(&self) -> &str;

    fn entities(&self) -> BoxStream<'_, Entity>;
}

/// Feed over a fixed list, e.g. command-line arguments or a software
/// inventory.
#[derive(Debug, Clone, Default)]
pub struct StaticFeed {
    name: String,
    entities: Vec<Entity>,
}

impl StaticFeed {
    pub fn new(name: impl Into<String>, entities: Vec<Entity>) -> Self {
        Self {
            name: name.into(),
            entities,
        }
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl DiscoveryFeed for StaticFeed {
    fn name(&self) -> &str {
        &self.name
    }

    fn entities(&self) -> BoxStream<'_, Entity> {
        stream::iter(self.entities.iter().cloned()).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_feed_preserves_order() {
        let feed = StaticFeed::new(
            "cli",
            vec![Entity::ip("1.1.1.1"), Entity::software("nginx", "1.18.0")],
        );
        let seen: Vec<Entity> = feed.entities().collect().await;
        assert_eq!(seen[0], Entity::ip("1.1.1.1"));
        assert_eq!(seen[1], Entity::software("nginx", "1.18.0"));
        assert_eq!(feed.name(), "cli");
    }
}
