//! Ordered set of known players.
//!
//! Clients address players by position, so the registry keeps an explicit
//! order next to the lookup tables. Positions of later players shift down
//! by one when an earlier player is removed.

use std::collections::HashMap;

/// A player's handle and the unique bus name its signals come from.
#[derive(Debug, Clone)]
pub struct RegisteredPlayer<H> {
    /// Control handle
    pub handle: H,
    /// Unique connection name (`:1.42`) of the player
    pub sender: String,
}

/// Name-ordered player table with a sender index.
#[derive(Debug)]
pub struct PlayerRegistry<H> {
    order: Vec<String>,
    players: HashMap<String, RegisteredPlayer<H>>,
    senders: HashMap<String, String>,
}

impl<H> Default for PlayerRegistry<H> {
    fn default() -> Self {
        Self {
            order: Vec::new(),
            players: HashMap::new(),
            senders: HashMap::new(),
        }
    }
}

impl<H: Clone> PlayerRegistry<H> {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered players.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no player is registered.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.players.contains_key(name)
    }

    /// Well-known names in index order.
    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Position of `name`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.order.iter().position(|n| n == name)
    }

    /// Handle of `name`.
    pub fn handle(&self, name: &str) -> Option<H> {
        self.players.get(name).map(|p| p.handle.clone())
    }

    /// Name and handle at `index`.
    pub fn at(&self, index: usize) -> Option<(String, H)> {
        let name = self.order.get(index)?;
        let player = self.players.get(name)?;
        Some((name.clone(), player.handle.clone()))
    }

    /// Resolves a signal's unique sender to `(index, name, handle)`.
    pub fn by_sender(&self, sender: &str) -> Option<(usize, String, H)> {
        let name = self.senders.get(sender)?;
        let index = self.index_of(name)?;
        let handle = self.handle(name)?;
        Some((index, name.clone(), handle))
    }

    /// Appends a player, replacing any previous entry of the same name.
    ///
    /// Returns the replaced entry. If another player was indexed under the
    /// same sender, the sender now resolves to the new player.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        sender: impl Into<String>,
        handle: H,
    ) -> Option<RegisteredPlayer<H>> {
        let name = name.into();
        let sender = sender.into();
        let replaced = self.remove(&name).map(|(_, player)| player);

        self.order.push(name.clone());
        self.senders.insert(sender.clone(), name.clone());
        self.players.insert(name, RegisteredPlayer { handle, sender });

        replaced
    }

    /// Removes `name`, returning its former index and entry.
    pub fn remove(&mut self, name: &str) -> Option<(usize, RegisteredPlayer<H>)> {
        let index = self.index_of(name)?;
        self.order.remove(index);
        let player = self.players.remove(name)?;

        if self.senders.get(&player.sender).is_some_and(|n| n == name) {
            self.senders.remove(&player.sender);
        }

        Some((index, player))
    }

    /// Removes every player, in index order.
    pub fn drain(&mut self) -> Vec<(String, RegisteredPlayer<H>)> {
        self.senders.clear();
        let order = std::mem::take(&mut self.order);
        order
            .into_iter()
            .filter_map(|name| self.players.remove(&name).map(|player| (name, player)))
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::RwLock;

    use super::*;

    fn assert_consistent<H: Clone>(registry: &PlayerRegistry<H>) {
        assert_eq!(registry.order.len(), registry.players.len());
        assert_eq!(registry.order.len(), registry.senders.len());
        for (sender, name) in &registry.senders {
            assert_eq!(&registry.players[name].sender, sender);
        }
    }

    fn three() -> PlayerRegistry<u32> {
        let mut registry = PlayerRegistry::new();
        registry.insert("org.mpris.MediaPlayer2.a", ":1.1", 1);
        registry.insert("org.mpris.MediaPlayer2.b", ":1.2", 2);
        registry.insert("org.mpris.MediaPlayer2.c", ":1.3", 3);
        registry
    }

    #[test]
    fn removal_shifts_later_indices() {
        let mut registry = three();

        let (index, player) = registry.remove("org.mpris.MediaPlayer2.b").unwrap();

        assert_eq!(index, 1);
        assert_eq!(player.handle, 2);
        assert_eq!(registry.index_of("org.mpris.MediaPlayer2.c"), Some(1));
        assert_eq!(
            registry.at(1),
            Some(("org.mpris.MediaPlayer2.c".to_string(), 3))
        );
        assert!(registry.by_sender(":1.2").is_none());
        assert_consistent(&registry);
    }

    #[test]
    fn sender_resolves_to_current_index() {
        let mut registry = three();
        registry.remove("org.mpris.MediaPlayer2.a");

        assert_eq!(
            registry.by_sender(":1.3"),
            Some((1, "org.mpris.MediaPlayer2.c".to_string(), 3))
        );
    }

    #[test]
    fn reinserting_a_name_moves_it_to_the_end() {
        let mut registry = three();

        let replaced = registry.insert("org.mpris.MediaPlayer2.a", ":1.9", 10);

        assert_eq!(replaced.map(|p| p.handle), Some(1));
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.index_of("org.mpris.MediaPlayer2.a"), Some(2));
        assert!(registry.by_sender(":1.1").is_none());
        assert_eq!(registry.by_sender(":1.9").map(|(i, _, h)| (i, h)), Some((2, 10)));
        assert_consistent(&registry);
    }

    #[test]
    fn out_of_range_index_is_none() {
        let registry = three();

        assert!(registry.at(3).is_none());
        assert!(PlayerRegistry::<u32>::new().at(0).is_none());
    }

    #[test]
    fn drain_empties_in_order() {
        let mut registry = three();

        let drained: Vec<_> = registry.drain().into_iter().map(|(n, _)| n).collect();

        assert_eq!(
            drained,
            vec![
                "org.mpris.MediaPlayer2.a",
                "org.mpris.MediaPlayer2.b",
                "org.mpris.MediaPlayer2.c"
            ]
        );
        assert!(registry.is_empty());
        assert_consistent(&registry);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_adds_and_removes_stay_consistent() {
        let registry = Arc::new(RwLock::new(PlayerRegistry::<usize>::new()));

        let mut tasks = Vec::new();
        for worker in 0..8 {
            let registry = Arc::clone(&registry);
            tasks.push(tokio::spawn(async move {
                for round in 0..50 {
                    let name = format!("org.mpris.MediaPlayer2.p{}", (worker + round) % 5);
                    let sender = format!(":1.{worker}{round}");
                    if round % 3 == 0 {
                        registry.write().await.remove(&name);
                    } else {
                        registry.write().await.insert(name, sender, worker);
                    }
                    let guard = registry.read().await;
                    if let Some((name, _)) = guard.at(0) {
                        assert_eq!(guard.index_of(&name), Some(0));
                    }
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let registry = registry.read().await;
        assert!(registry.len() <= 5);
        assert_eq!(registry.order.len(), registry.players.len());
    }
}
