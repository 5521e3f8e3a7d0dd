//! Self-reported life changes ("stopped alcohol", "started meditation").
//!
//! Held in memory, newest first. The session core never touches this log;
//! it only feeds the insights view.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::AuthError;

const STOP_SUGGESTIONS: &[&str] = &["Alcohol", "Nicotine", "Sugar", "Late-night screens"];
const START_SUGGESTIONS: &[&str] = &["Exercise routine", "Dieting", "Sleep routine", "Meditation"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Start,
    Stop,
}

impl ChangeKind {
    /// Predefined labels offered when logging a change of this kind.
    pub fn suggestions(self) -> &'static [&'static str] {
        match self {
            ChangeKind::Start => START_SUGGESTIONS,
            ChangeKind::Stop => STOP_SUGGESTIONS,
        }
    }

    /// "starting" / "stopping", for insight headlines.
    pub fn gerund(self) -> &'static str {
        match self {
            ChangeKind::Start => "starting",
            ChangeKind::Stop => "stopping",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactDirection {
    Positive,
    Negative,
}

/// Impact the user attributes to a change themselves.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReportedImpact {
    pub value: f64,
    #[serde(rename = "type")]
    pub direction: ImpactDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifeChange {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    pub name: String,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact: Option<ReportedImpact>,
}

/// A change as submitted, before it has an id.
#[derive(Debug, Clone, Deserialize)]
pub struct NewLifeChange {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    pub name: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub impact: Option<ReportedImpact>,
}

#[derive(Default)]
pub struct ChangeLog {
    entries: RwLock<Vec<LifeChange>>,
}

impl ChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a change as the newest entry.
    pub async fn add_change(&self, change: NewLifeChange) -> Result<LifeChange, AuthError> {
        let name = change.name.trim();
        if name.is_empty() {
            return Err(AuthError::BadRequest("change name must not be empty".into()));
        }

        let entry = LifeChange {
            id: Uuid::new_v4(),
            kind: change.kind,
            name: name.to_string(),
            date: change.date,
            impact: change.impact,
        };
        self.entries.write().await.insert(0, entry.clone());
        Ok(entry)
    }

    /// The most recently added change.
    pub async fn latest(&self) -> Option<LifeChange> {
        self.entries.read().await.first().cloned()
    }

    pub async fn list(&self) -> Vec<LifeChange> {
        self.entries.read().await.clone()
    }
}
