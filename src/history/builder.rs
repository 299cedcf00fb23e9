//! Flat message list → message tree.

use crate::history::ids::IdGenerator;
use crate::models::{History, HistoryNode, MessageRecord};

/// Keys owned by the tree; a record carrying them in its extra fields loses them
pub(crate) const RESERVED_KEYS: [&str; 3] = ["id", "parentId", "childrenIds"];

/// Build a [`History`] from messages in conversation order
///
/// Every record becomes one node with a freshly generated id. Each node is
/// the only child of the node before it, so the result is a single unbranched
/// path and `current_id` points at the node built from the last record.
///
/// Never fails. An empty input gives an empty history with no current node.
///
/// # Examples
///
/// ```
/// use ollama_chat::history::{SequentialIds, build_history};
/// use ollama_chat::models::MessageRecord;
///
/// let history = build_history(
///     vec![MessageRecord::user("Hello"), MessageRecord::assistant("Hi there")],
///     &mut SequentialIds::new("m"),
/// );
///
/// assert_eq!(history.current_id.as_deref(), Some("m2"));
/// assert_eq!(history.messages["m1"].children_ids, vec!["m2".to_string()]);
/// assert_eq!(history.messages["m2"].parent_id.as_deref(), Some("m1"));
/// ```
pub fn build_history<I, G>(messages: I, ids: &mut G) -> History
where
    I: IntoIterator<Item = MessageRecord>,
    G: IdGenerator + ?Sized,
{
    let mut history = History::default();
    let mut parent_id: Option<String> = None;

    for record in messages {
        let id = ids.next_id();

        if let Some(parent) = parent_id.as_ref().and_then(|p| history.messages.get_mut(p)) {
            parent.children_ids.push(id.clone());
        }

        history.messages.insert(id.clone(), new_node(id.clone(), parent_id.take(), record));
        parent_id = Some(id);
    }

    history.current_id = parent_id;
    history
}

pub(crate) fn new_node(id: String, parent_id: Option<String>, mut message: MessageRecord) -> HistoryNode {
    for key in RESERVED_KEYS {
        message.extra.remove(key);
    }
    HistoryNode { id, parent_id, children_ids: Vec::new(), message }
}
