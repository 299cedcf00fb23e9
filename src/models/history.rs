use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::message::MessageRecord;

/// One message inside a [`History`] tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryNode {
    pub id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub children_ids: Vec<String>,
    #[serde(flatten)]
    pub message: MessageRecord,
}

/// Tree of chat turns keyed by node id, plus the active leaf.
///
/// Serializes as `{"messages": {...}, "currentId": ...}`, the shape chat
/// records persist.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct History {
    #[serde(default)]
    pub messages: HashMap<String, HistoryNode>,
    #[serde(default)]
    pub current_id: Option<String>,
}
