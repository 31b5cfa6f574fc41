//! Character records and the provider boundary
//! Character profile storage is an external concern; the core only needs a
//! lookup and the access rule.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sled::Db;

const CHARACTERS_TREE: &str = "characters";

/// A fixed virtual character the user converses with
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Character {
    pub id: String,
    pub name: String,
    /// Free-text persona description
    pub personality: String,
    /// Free-text backstory
    pub story: String,
    pub is_public: bool,
    pub owner_id: String,
    /// Voice model id for speech synthesis; a character without one cannot speak
    pub voice_id: Option<String>,
}

impl Character {
    /// A character is usable only if public or owned by the requester
    pub fn accessible_by(&self, user_id: &str) -> bool {
        self.is_public || self.owner_id == user_id
    }
}

/// Lookup boundary for character records
#[async_trait]
pub trait CharacterProvider: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Character>>;
}

/// Sled-backed character store
pub struct SledCharacters {
    db: Arc<Db>,
}

impl SledCharacters {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }

    /// Insert or replace a character record
    pub fn upsert(&self, character: &Character) -> Result<()> {
        let tree = self.db.open_tree(CHARACTERS_TREE)?;
        let bytes = serde_json::to_vec(character)?;
        tree.insert(character.id.as_bytes(), bytes)?;
        tree.flush()?;
        Ok(())
    }
}

#[async_trait]
impl CharacterProvider for SledCharacters {
    async fn get(&self, id: &str) -> Result<Option<Character>> {
        let tree = self.db.open_tree(CHARACTERS_TREE)?;
        match tree.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}
