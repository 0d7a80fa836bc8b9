//! Observable in-memory plant state.
//!
//! `PlantStore::commit` is the only way the state changes. The mutation is
//! applied under the write lock before `commit` returns, so the next read
//! observes it; afterwards a copy of the event is queued to every
//! subscriber, in commit order.

use tokio::sync::{broadcast, RwLock};

use crate::models::PlantRecord;

const EVENT_CAPACITY: usize = 256;

/// Notifications produced by the sync actions.
#[derive(Debug, Clone, PartialEq)]
pub enum PlantEvent {
    LoadPlants { plants: Vec<PlantRecord> },
    LoadPlantItem { item: Option<PlantRecord> },
    AddPlant { item: PlantRecord },
    DeletePlants { guids: Vec<String> },
    UpdatePlant { config: PlantRecord },
}

impl PlantEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PlantEvent::LoadPlants { .. } => "LOAD_PLANTS",
            PlantEvent::LoadPlantItem { .. } => "LOAD_PLANT_ITEM",
            PlantEvent::AddPlant { .. } => "ADD_PLANT",
            PlantEvent::DeletePlants { .. } => "DELETE_PLANTS",
            PlantEvent::UpdatePlant { .. } => "UPDATE_PLANT",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlantState {
    pub plants: Vec<PlantRecord>,
    pub current: Option<PlantRecord>,
}

impl PlantState {
    pub fn find(&self, guid: &str) -> Option<&PlantRecord> {
        self.plants.iter().find(|p| p.guid == guid)
    }

    fn apply(&mut self, event: &PlantEvent) {
        match event {
            PlantEvent::LoadPlants { plants } => {
                self.plants = plants.clone();
            }
            PlantEvent::LoadPlantItem { item } => {
                self.current = item.clone();
            }
            PlantEvent::AddPlant { item } => {
                self.plants.push(item.clone());
            }
            PlantEvent::DeletePlants { guids } => {
                self.plants.retain(|p| !guids.contains(&p.guid));
                if self
                    .current
                    .as_ref()
                    .is_some_and(|c| guids.contains(&c.guid))
                {
                    self.current = None;
                }
            }
            PlantEvent::UpdatePlant { config } => {
                match self.plants.iter_mut().find(|p| p.guid == config.guid) {
                    Some(existing) => *existing = config.clone(),
                    None => self.plants.push(config.clone()),
                }
                if let Some(current) = self.current.as_mut() {
                    if current.guid == config.guid {
                        *current = config.clone();
                    }
                }
            }
        }
    }
}

pub struct PlantStore {
    state: RwLock<PlantState>,
    events: broadcast::Sender<PlantEvent>,
}

impl PlantStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: RwLock::new(PlantState::default()),
            events,
        }
    }

    /// Applies `event` to the state, then queues it to subscribers.
    pub async fn commit(&self, event: PlantEvent) {
        {
            let mut state = self.state.write().await;
            state.apply(&event);
        }
        tracing::debug!(event = event.name(), "Committed plant event");
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Receives every event committed after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<PlantEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> PlantState {
        self.state.read().await.clone()
    }

    pub async fn plants(&self) -> Vec<PlantRecord> {
        self.state.read().await.plants.clone()
    }

    pub async fn find(&self, guid: &str) -> Option<PlantRecord> {
        self.state.read().await.find(guid).cloned()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.plants.is_empty()
    }

    pub async fn current(&self) -> Option<PlantRecord> {
        self.state.read().await.current.clone()
    }
}

impl Default for PlantStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewPlant;

    fn plant(name: &str) -> PlantRecord {
        PlantRecord::create(NewPlant::new().with_field("name", name), 0)
    }

    fn guids(plants: &[PlantRecord]) -> Vec<&str> {
        plants.iter().map(|p| p.guid.as_str()).collect()
    }

    #[tokio::test]
    async fn test_load_replaces_collection() {
        let store = PlantStore::new();
        store.commit(PlantEvent::AddPlant { item: plant("old") }).await;

        let fresh = vec![plant("a"), plant("b")];
        store
            .commit(PlantEvent::LoadPlants {
                plants: fresh.clone(),
            })
            .await;

        assert_eq!(store.plants().await, fresh);
    }

    #[tokio::test]
    async fn test_add_appends_in_order() {
        let store = PlantStore::new();
        let a = plant("a");
        let b = plant("b");
        store.commit(PlantEvent::AddPlant { item: a.clone() }).await;
        store.commit(PlantEvent::AddPlant { item: b.clone() }).await;

        let plants = store.plants().await;
        assert_eq!(guids(&plants), vec![a.guid.as_str(), b.guid.as_str()]);
    }

    #[tokio::test]
    async fn test_delete_ignores_unknown_and_clears_current() {
        let store = PlantStore::new();
        let a = plant("a");
        let b = plant("b");
        store
            .commit(PlantEvent::LoadPlants {
                plants: vec![a.clone(), b.clone()],
            })
            .await;
        store
            .commit(PlantEvent::LoadPlantItem {
                item: Some(a.clone()),
            })
            .await;

        store
            .commit(PlantEvent::DeletePlants {
                guids: vec![a.guid.clone(), "missing".to_string()],
            })
            .await;

        let state = store.snapshot().await;
        assert_eq!(guids(&state.plants), vec![b.guid.as_str()]);
        assert_eq!(state.current, None);
    }

    #[tokio::test]
    async fn test_update_replaces_in_place_or_appends() {
        let store = PlantStore::new();
        let a = plant("a");
        let b = plant("b");
        store
            .commit(PlantEvent::LoadPlants {
                plants: vec![a.clone(), b.clone()],
            })
            .await;
        store
            .commit(PlantEvent::LoadPlantItem {
                item: Some(a.clone()),
            })
            .await;

        let mut renamed = a.clone();
        renamed.fields.insert("name".into(), "renamed".into());
        store
            .commit(PlantEvent::UpdatePlant {
                config: renamed.clone(),
            })
            .await;

        let stray = plant("stray");
        store
            .commit(PlantEvent::UpdatePlant {
                config: stray.clone(),
            })
            .await;

        let state = store.snapshot().await;
        assert_eq!(state.plants, vec![renamed.clone(), b, stray]);
        assert_eq!(state.current, Some(renamed));
    }

    #[tokio::test]
    async fn test_subscribers_receive_events_in_order() {
        let store = PlantStore::new();
        let mut rx = store.subscribe();
        let a = plant("a");

        store.commit(PlantEvent::AddPlant { item: a.clone() }).await;
        store
            .commit(PlantEvent::DeletePlants {
                guids: vec![a.guid.clone()],
            })
            .await;

        assert_eq!(rx.recv().await.unwrap(), PlantEvent::AddPlant { item: a.clone() });
        assert_eq!(rx.recv().await.unwrap().name(), "DELETE_PLANTS");
    }

    #[tokio::test]
    async fn test_commit_without_subscribers() {
        let store = PlantStore::new();
        store.commit(PlantEvent::LoadPlantItem { item: None }).await;
        assert!(store.is_empty().await);
        assert_eq!(store.current().await, None);
    }
}
