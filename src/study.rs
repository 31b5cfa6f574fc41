//! Situational context lookup
//! Today's study content, merged into the prompt when present

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use sled::Db;

const STUDY_TREE: &str = "todays_study";

/// Per-day study content, keyed by date
pub struct StudyLog {
    db: Arc<Db>,
}

impl StudyLog {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }

    fn date_key() -> String {
        Utc::now().format("%Y-%m-%d").to_string()
    }

    /// Set today's study content
    pub fn set_today(&self, content: &str) -> Result<()> {
        let tree = self.db.open_tree(STUDY_TREE)?;
        tree.insert(Self::date_key().as_bytes(), content.as_bytes())?;
        tree.flush()?;
        Ok(())
    }

    /// Get today's study content, if any was recorded
    pub fn today(&self) -> Result<Option<String>> {
        let tree = self.db.open_tree(STUDY_TREE)?;
        match tree.get(Self::date_key().as_bytes())? {
            Some(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            None => Ok(None),
        }
    }
}
