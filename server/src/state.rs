use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use bincode::{Decode, Encode};
use thiserror::Error;
use tokio::sync::RwLock;

use drawdeck_shared::DiagramRecord;

use crate::auth::TokenStore;
use crate::storage::Storage;

pub const DEFAULT_TITLE: &str = "Untitled";
pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_CONTENT_LEN: usize = 8 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RwLock<Store>>,
    pub tokens: Arc<RwLock<TokenStore>>,
    pub storage: Arc<dyn Storage>,
}

#[derive(Clone, Debug, Encode, Decode)]
pub struct UserRecord {
    pub username: String,
    pub salt: String,
    pub password_digest: Vec<u8>,
}

#[derive(Clone, Debug, Encode, Decode)]
pub struct StoredDiagram {
    pub id: u64,
    pub title: String,
    /// Base64 data URL of the rendered board.
    pub content: String,
    pub owner: String,
}

/// Everything the flush task writes through [`Storage`].
#[derive(Clone, Debug, Default, Encode, Decode)]
pub struct PersistentData {
    pub users: Vec<UserRecord>,
    pub diagrams: Vec<StoredDiagram>,
    pub next_diagram_id: u64,
}

#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    #[error("Username already exists")]
    UsernameTaken,
    #[error("Diagram not found")]
    DiagramNotFound,
}

/// In-memory users + diagrams database. `dirty` is set on every mutation and
/// cleared by the periodic flush.
#[derive(Default)]
pub struct Store {
    users: HashMap<String, UserRecord>,
    diagrams: BTreeMap<u64, StoredDiagram>,
    next_diagram_id: u64,
    pub dirty: bool,
}

impl Store {
    pub fn from_persistent(data: PersistentData) -> Self {
        let next_diagram_id = data
            .next_diagram_id
            .max(data.diagrams.iter().map(|d| d.id + 1).max().unwrap_or(1));
        Self {
            users: data
                .users
                .into_iter()
                .map(|user| (user.username.clone(), user))
                .collect(),
            diagrams: data
                .diagrams
                .into_iter()
                .map(|diagram| (diagram.id, diagram))
                .collect(),
            next_diagram_id,
            dirty: false,
        }
    }

    pub fn to_persistent(&self) -> PersistentData {
        PersistentData {
            users: self.users.values().cloned().collect(),
            diagrams: self.diagrams.values().cloned().collect(),
            next_diagram_id: self.next_diagram_id,
        }
    }

    pub fn register_user(&mut self, user: UserRecord) -> Result<(), StoreError> {
        if self.users.contains_key(&user.username) {
            return Err(StoreError::UsernameTaken);
        }
        self.users.insert(user.username.clone(), user);
        self.dirty = true;
        Ok(())
    }

    pub fn user(&self, username: &str) -> Option<&UserRecord> {
        self.users.get(username)
    }

    /// Creates a new diagram, or overwrites an existing one when `id` is
    /// given. Returns the diagram id.
    pub fn save_diagram(
        &mut self,
        owner: &str,
        title: Option<String>,
        content: String,
        id: Option<u64>,
    ) -> Result<u64, StoreError> {
        let title = normalize_title(title);
        match id {
            Some(id) => {
                let diagram = self
                    .diagrams
                    .get_mut(&id)
                    .filter(|diagram| diagram.owner == owner)
                    .ok_or(StoreError::DiagramNotFound)?;
                diagram.title = title;
                diagram.content = content;
                self.dirty = true;
                Ok(id)
            }
            None => {
                let id = self.next_diagram_id.max(1);
                self.next_diagram_id = id + 1;
                self.diagrams.insert(
                    id,
                    StoredDiagram {
                        id,
                        title,
                        content,
                        owner: owner.to_string(),
                    },
                );
                self.dirty = true;
                Ok(id)
            }
        }
    }

    pub fn diagrams_for(&self, username: &str) -> Vec<DiagramRecord> {
        self.diagrams
            .values()
            .filter(|diagram| diagram.owner == username)
            .map(|diagram| DiagramRecord {
                id: diagram.id,
                title: diagram.title.clone(),
                content: diagram.content.clone(),
            })
            .collect()
    }

    pub fn diagram_owner(&self, id: u64) -> Option<&str> {
        self.diagrams.get(&id).map(|diagram| diagram.owner.as_str())
    }

    pub fn delete_diagram(&mut self, id: u64) -> Result<(), StoreError> {
        self.diagrams
            .remove(&id)
            .map(|_| {
                self.dirty = true;
            })
            .ok_or(StoreError::DiagramNotFound)
    }

    pub fn rename_diagram(&mut self, id: u64, title: String) -> Result<(), StoreError> {
        let diagram = self
            .diagrams
            .get_mut(&id)
            .ok_or(StoreError::DiagramNotFound)?;
        diagram.title = normalize_title(Some(title));
        self.dirty = true;
        Ok(())
    }
}

fn normalize_title(title: Option<String>) -> String {
    let mut title = match title {
        Some(title) if !title.trim().is_empty() => title.trim().to_string(),
        _ => return DEFAULT_TITLE.to_string(),
    };
    if title.len() > MAX_TITLE_LEN {
        let mut cut = MAX_TITLE_LEN;
        while !title.is_char_boundary(cut) {
            cut -= 1;
        }
        title.truncate(cut);
    }
    title
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str) -> UserRecord {
        UserRecord {
            username: name.to_string(),
            salt: "salt".to_string(),
            password_digest: vec![0; 32],
        }
    }

    #[test]
    fn duplicate_usernames_are_rejected() {
        let mut store = Store::default();
        store.register_user(user("ada")).unwrap();
        assert_eq!(
            store.register_user(user("ada")),
            Err(StoreError::UsernameTaken)
        );
        assert!(store.dirty);
    }

    #[test]
    fn save_assigns_sequential_ids_and_defaults_title() {
        let mut store = Store::default();
        let first = store
            .save_diagram("ada", None, "data:image/png;base64,".into(), None)
            .unwrap();
        let second = store
            .save_diagram("ada", Some("  ".into()), "data:image/png;base64,".into(), None)
            .unwrap();
        assert_eq!((first, second), (1, 2));
        let diagrams = store.diagrams_for("ada");
        assert!(diagrams.iter().all(|d| d.title == DEFAULT_TITLE));
    }

    #[test]
    fn save_with_id_overwrites_only_own_diagrams() {
        let mut store = Store::default();
        let id = store
            .save_diagram("ada", Some("v1".into()), "a".into(), None)
            .unwrap();
        store
            .save_diagram("ada", Some("v2".into()), "b".into(), Some(id))
            .unwrap();
        assert_eq!(store.diagrams_for("ada")[0].title, "v2");
        assert_eq!(store.diagrams_for("ada")[0].content, "b");

        assert_eq!(
            store.save_diagram("bob", Some("theft".into()), "c".into(), Some(id)),
            Err(StoreError::DiagramNotFound)
        );
    }

    #[test]
    fn listing_is_scoped_to_owner() {
        let mut store = Store::default();
        store.save_diagram("ada", None, "a".into(), None).unwrap();
        store.save_diagram("bob", None, "b".into(), None).unwrap();
        assert_eq!(store.diagrams_for("ada").len(), 1);
        assert_eq!(store.diagrams_for("bob").len(), 1);
        assert!(store.diagrams_for("eve").is_empty());
    }

    #[test]
    fn delete_and_rename_report_missing_diagrams() {
        let mut store = Store::default();
        assert_eq!(store.delete_diagram(7), Err(StoreError::DiagramNotFound));
        assert_eq!(
            store.rename_diagram(7, "x".into()),
            Err(StoreError::DiagramNotFound)
        );

        let id = store.save_diagram("ada", None, "a".into(), None).unwrap();
        store.rename_diagram(id, "renamed".into()).unwrap();
        assert_eq!(store.diagrams_for("ada")[0].title, "renamed");
        store.delete_diagram(id).unwrap();
        assert!(store.diagrams_for("ada").is_empty());
    }

    #[test]
    fn persistent_round_trip_keeps_id_counter() {
        let mut store = Store::default();
        store.register_user(user("ada")).unwrap();
        store.save_diagram("ada", None, "a".into(), None).unwrap();
        store.save_diagram("ada", None, "b".into(), None).unwrap();

        let restored = Store::from_persistent(store.to_persistent());
        let id = restored.to_persistent().next_diagram_id;
        assert_eq!(id, 3);
        assert_eq!(restored.diagrams_for("ada").len(), 2);
        assert!(restored.user("ada").is_some());
        assert!(!restored.dirty);
    }
}
