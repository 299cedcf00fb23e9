//! Editing and walking a [`History`] after it has been built.
//!
//! The builder only ever produces a straight path. Branches appear here:
//! regenerating a reply adds a sibling under the same parent, and the
//! current leaf moves between siblings as the user flips through them.
//! Every operation keeps the invariants checked by [`History::validate`].

use thiserror::Error;

use crate::history::builder::new_node;
use crate::history::ids::IdGenerator;
use crate::models::{History, HistoryNode, MessageRecord};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("message {0} not found in history")]
    NodeNotFound(String),

    #[error("history already has a root message")]
    RootExists,

    #[error("root message {0} cannot have siblings")]
    RootHasNoSiblings(String),

    #[error("message {id} is stored under key {key}")]
    KeyMismatch { key: String, id: String },

    #[error("message {id} points at missing parent {parent_id}")]
    MissingParent { id: String, parent_id: String },

    #[error("message {id} is not listed as a child of {parent_id}")]
    ChildNotListed { id: String, parent_id: String },

    #[error("message {parent_id} lists child {child_id} more than once")]
    DuplicateChild { parent_id: String, child_id: String },

    #[error("message {parent_id} lists {child_id}, which is missing or has another parent")]
    StrayChild { parent_id: String, child_id: String },

    #[error("history has {0} root messages")]
    MultipleRoots(usize),

    #[error("parent chain starting at {0} loops back on itself")]
    Cycle(String),

    #[error("current message {0} not found in history")]
    CurrentNotFound(String),

    #[error("history has messages but no current message")]
    MissingCurrent,
}

pub type Result<T> = std::result::Result<T, HistoryError>;

impl History {
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&HistoryNode> {
        self.messages.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut HistoryNode> {
        self.messages.get_mut(id)
    }

    pub fn current(&self) -> Option<&HistoryNode> {
        self.current_id.as_deref().and_then(|id| self.messages.get(id))
    }

    pub fn current_mut(&mut self) -> Option<&mut HistoryNode> {
        let id = self.current_id.clone()?;
        self.messages.get_mut(&id)
    }

    /// Ids of nodes without a parent
    pub fn roots(&self) -> Vec<&str> {
        self.messages.values().filter(|n| n.parent_id.is_none()).map(|n| n.id.as_str()).collect()
    }

    /// Append `record` below the current node (or as the root of an empty
    /// history) and make it current
    pub fn push<G>(&mut self, record: MessageRecord, ids: &mut G) -> Result<String>
    where
        G: IdGenerator + ?Sized,
    {
        let parent = self.current_id.clone();
        if let Some(missing) = parent.as_deref().filter(|id| !self.messages.contains_key(*id)) {
            return Err(HistoryError::CurrentNotFound(missing.to_string()));
        }
        self.append_child(parent.as_deref(), record, ids)
    }

    /// Append `record` under an explicit parent and make it current.
    ///
    /// `None` creates the root, which is only allowed while the history is empty.
    pub fn append_child<G>(
        &mut self,
        parent_id: Option<&str>,
        record: MessageRecord,
        ids: &mut G,
    ) -> Result<String>
    where
        G: IdGenerator + ?Sized,
    {
        match parent_id {
            Some(parent) if !self.messages.contains_key(parent) => {
                Err(HistoryError::NodeNotFound(parent.to_string()))
            }
            None if !self.messages.is_empty() => Err(HistoryError::RootExists),
            _ => {
                let id = ids.next_id();
                self.attach(id.clone(), parent_id.map(str::to_string), record);
                Ok(id)
            }
        }
    }

    /// Append `record` next to `sibling_of`, under the same parent, and make
    /// it current. This is how a regenerated reply enters the tree.
    pub fn add_sibling<G>(&mut self, sibling_of: &str, record: MessageRecord, ids: &mut G) -> Result<String>
    where
        G: IdGenerator + ?Sized,
    {
        let node = self.get(sibling_of).ok_or_else(|| HistoryError::NodeNotFound(sibling_of.to_string()))?;
        let parent = node.parent_id.clone().ok_or_else(|| HistoryError::RootHasNoSiblings(sibling_of.to_string()))?;
        self.append_child(Some(&parent), record, ids)
    }

    fn attach(&mut self, id: String, parent_id: Option<String>, record: MessageRecord) {
        if let Some(parent) = parent_id.as_ref().and_then(|p| self.messages.get_mut(p)) {
            parent.children_ids.push(id.clone());
        }
        self.messages.insert(id.clone(), new_node(id.clone(), parent_id, record));
        self.current_id = Some(id);
    }

    /// Nodes from the root down to `id`, inclusive
    pub fn path_to(&self, id: &str) -> Result<Vec<&HistoryNode>> {
        let mut path = Vec::new();
        let mut cursor = Some(id);

        while let Some(current) = cursor {
            if path.len() > self.messages.len() {
                return Err(HistoryError::Cycle(id.to_string()));
            }
            let node = self.get(current).ok_or_else(|| HistoryError::NodeNotFound(current.to_string()))?;
            path.push(node);
            cursor = node.parent_id.as_deref();
        }

        path.reverse();
        Ok(path)
    }

    /// Root-to-current path; empty for an empty history
    pub fn active_path(&self) -> Result<Vec<&HistoryNode>> {
        match self.current_id.as_deref() {
            Some(id) => self.path_to(id),
            None => Ok(Vec::new()),
        }
    }

    /// Records along the active path, the flat form stored as a chat's `messages`
    pub fn to_messages(&self) -> Result<Vec<MessageRecord>> {
        Ok(self.active_path()?.into_iter().map(|n| n.message.clone()).collect())
    }

    /// Ids sharing `id`'s parent, in the order they were added (including `id`)
    pub fn siblings(&self, id: &str) -> Result<Vec<&str>> {
        let node = self.get(id).ok_or_else(|| HistoryError::NodeNotFound(id.to_string()))?;
        match node.parent_id.as_deref() {
            Some(parent_id) => {
                let parent = self.get(parent_id).ok_or_else(|| HistoryError::MissingParent {
                    id: id.to_string(),
                    parent_id: parent_id.to_string(),
                })?;
                Ok(parent.children_ids.iter().map(String::as_str).collect())
            }
            None => Ok(vec![node.id.as_str()]),
        }
    }

    /// Follow the most recent child from `id` until reaching a leaf
    pub fn leaf_from(&self, id: &str) -> Result<String> {
        let mut node = self.get(id).ok_or_else(|| HistoryError::NodeNotFound(id.to_string()))?;
        let mut steps = 0;

        while let Some(child) = node.children_ids.last() {
            steps += 1;
            if steps > self.messages.len() {
                return Err(HistoryError::Cycle(id.to_string()));
            }
            node = self.get(child).ok_or_else(|| HistoryError::StrayChild {
                parent_id: node.id.clone(),
                child_id: child.clone(),
            })?;
        }

        Ok(node.id.clone())
    }

    /// Move `offset` siblings away from `id` (clamped to the first/last) and
    /// make the deepest leaf under that sibling current. Returns the new
    /// current id.
    pub fn select_sibling(&mut self, id: &str, offset: isize) -> Result<String> {
        let siblings = self.siblings(id)?;
        let Some(position) = siblings.iter().position(|s| *s == id) else {
            let parent_id = self.get(id).and_then(|n| n.parent_id.clone()).unwrap_or_default();
            return Err(HistoryError::ChildNotListed { id: id.to_string(), parent_id });
        };
        let last = siblings.len().saturating_sub(1) as isize;
        let target = (position as isize + offset).clamp(0, last) as usize;
        let sibling = siblings[target].to_string();

        let leaf = self.leaf_from(&sibling)?;
        self.current_id = Some(leaf.clone());
        Ok(leaf)
    }

    /// Check the structural invariants, reporting the first violation found
    pub fn validate(&self) -> Result<()> {
        let mut roots = 0;

        for (key, node) in &self.messages {
            if *key != node.id {
                return Err(HistoryError::KeyMismatch { key: key.clone(), id: node.id.clone() });
            }

            match node.parent_id.as_deref() {
                None => roots += 1,
                Some(parent_id) => {
                    let parent = self.get(parent_id).ok_or_else(|| HistoryError::MissingParent {
                        id: node.id.clone(),
                        parent_id: parent_id.to_string(),
                    })?;
                    if !parent.children_ids.contains(&node.id) {
                        return Err(HistoryError::ChildNotListed {
                            id: node.id.clone(),
                            parent_id: parent_id.to_string(),
                        });
                    }
                }
            }

            for (index, child_id) in node.children_ids.iter().enumerate() {
                if node.children_ids[..index].contains(child_id) {
                    return Err(HistoryError::DuplicateChild {
                        parent_id: node.id.clone(),
                        child_id: child_id.clone(),
                    });
                }
                let points_back = self
                    .get(child_id)
                    .is_some_and(|child| child.parent_id.as_deref() == Some(node.id.as_str()));
                if !points_back {
                    return Err(HistoryError::StrayChild {
                        parent_id: node.id.clone(),
                        child_id: child_id.clone(),
                    });
                }
            }
        }

        if roots > 1 {
            return Err(HistoryError::MultipleRoots(roots));
        }

        match self.current_id.as_deref() {
            Some(id) if !self.messages.contains_key(id) => {
                Err(HistoryError::CurrentNotFound(id.to_string()))
            }
            None if !self.messages.is_empty() => Err(HistoryError::MissingCurrent),
            _ => {
                // Every node has one listed parent and there is at most one
                // root, so a parent chain that never reaches it is a loop.
                for id in self.messages.keys() {
                    self.path_to(id)?;
                }
                Ok(())
            }
        }
    }
}
