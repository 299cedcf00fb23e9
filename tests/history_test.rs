/// Integration tests for building and growing message trees
mod common;

use common::conversation;
use ollama_chat::history::HistoryError;
use ollama_chat::{History, MessageRecord, Role, SequentialIds, UuidIds, build_history};
use serde_json::json;

#[test]
fn test_three_turns_form_a_path() {
    let messages = vec![
        MessageRecord::user("A"),
        MessageRecord::assistant("B"),
        MessageRecord::user("C"),
    ];
    let history = build_history(messages, &mut SequentialIds::new("n"));

    assert_eq!(history.len(), 3);
    assert_eq!(history.current_id.as_deref(), Some("n3"));

    let a = history.get("n1").unwrap();
    assert_eq!(a.parent_id, None);
    assert_eq!(a.children_ids, vec!["n2"]);
    assert_eq!(a.message.content_str(), "A");

    let b = history.get("n2").unwrap();
    assert_eq!(b.parent_id.as_deref(), Some("n1"));
    assert_eq!(b.children_ids, vec!["n3"]);
    assert_eq!(b.message.role, Role::Assistant);

    let c = history.get("n3").unwrap();
    assert_eq!(c.parent_id.as_deref(), Some("n2"));
    assert!(c.children_ids.is_empty());

    history.validate().unwrap();
}

#[test]
fn test_node_count_and_single_root_for_many_sizes() {
    for n in [1, 2, 5, 17, 64] {
        let history = build_history(conversation(n), &mut UuidIds);

        assert_eq!(history.len(), n);
        assert_eq!(history.roots().len(), 1);
        assert!(history.messages.values().all(|node| node.children_ids.len() <= 1));
        history.validate().unwrap();

        // Walking down from the root visits every record in input order
        let path = history.active_path().unwrap();
        let contents: Vec<&str> = path.iter().map(|node| node.message.content_str()).collect();
        let expected: Vec<String> = (0..n).map(|i| format!("turn {}", i)).collect();
        assert_eq!(contents, expected);
        assert!(path.last().unwrap().children_ids.is_empty());
    }
}

#[test]
fn test_empty_input() {
    let history = build_history(Vec::new(), &mut SequentialIds::default());
    assert!(history.is_empty());
    assert!(history.current_id.is_none());
    assert!(history.active_path().unwrap().is_empty());
    history.validate().unwrap();
}

#[test]
fn test_identical_messages_get_distinct_nodes() {
    let messages = vec![MessageRecord::user("same"), MessageRecord::user("same")];
    let history = build_history(messages, &mut UuidIds);

    assert_eq!(history.len(), 2);
    let ids: Vec<&String> = history.messages.keys().collect();
    assert_ne!(ids[0], ids[1]);
}

#[test]
fn test_extra_fields_pass_through_and_reserved_keys_are_replaced() {
    let record: MessageRecord = serde_json::from_value(json!({
        "role": "assistant",
        "content": "hi",
        "model": "llama2",
        "context": [1, 2],
        "id": "stale",
        "parentId": "stale-parent",
        "childrenIds": ["x"]
    }))
    .unwrap();

    let history = build_history(vec![record], &mut SequentialIds::new("n"));
    let json = serde_json::to_value(&history).unwrap();
    let node = &json["messages"]["n1"];

    assert_eq!(node["id"], "n1");
    assert_eq!(node["parentId"], serde_json::Value::Null);
    assert_eq!(node["childrenIds"], json!([]));
    assert_eq!(node["model"], "llama2");
    assert_eq!(node["context"], json!([1, 2]));
    assert_eq!(json["currentId"], "n1");
}

#[test]
fn test_malformed_record_passes_through() {
    let record: MessageRecord = serde_json::from_value(json!({"role": "user", "attachment": {"kind": "image"}})).unwrap();
    let history = build_history(vec![record], &mut SequentialIds::new("n"));

    let node = history.get("n1").unwrap();
    assert!(node.message.content.is_none());
    assert_eq!(node.message.extra["attachment"]["kind"], "image");
}

#[test]
fn test_closure_id_generator() {
    let mut counter = 100;
    let mut ids = || {
        counter += 1;
        format!("id-{}", counter)
    };
    let history = build_history(conversation(2), &mut ids);
    assert_eq!(history.current_id.as_deref(), Some("id-102"));
}

#[test]
fn test_history_round_trips_through_json() {
    let history = build_history(conversation(4), &mut SequentialIds::new("n"));
    let json = serde_json::to_string(&history).unwrap();
    let loaded: History = serde_json::from_str(&json).unwrap();

    assert_eq!(loaded, history);
    loaded.validate().unwrap();
}

#[test]
fn test_regenerated_reply_branches_and_navigates() {
    let mut ids = SequentialIds::new("n");
    let mut history = build_history(vec![MessageRecord::user("Q"), MessageRecord::assistant("first")], &mut ids);

    let second = history.add_sibling("n2", MessageRecord::assistant("second"), &mut ids).unwrap();
    assert_eq!(second, "n3");
    assert_eq!(history.siblings("n2").unwrap(), vec!["n2", "n3"]);
    assert_eq!(history.current_id.as_deref(), Some("n3"));

    // Follow-up on the second reply
    let follow_up = history.push(MessageRecord::user("more"), &mut ids).unwrap();
    assert_eq!(history.get(&follow_up).unwrap().parent_id.as_deref(), Some("n3"));

    // Back to the first reply: it has no follow-up, so it is the leaf
    assert_eq!(history.select_sibling("n3", -1).unwrap(), "n2");
    let contents: Vec<MessageRecord> = history.to_messages().unwrap();
    assert_eq!(contents.iter().map(|m| m.content_str()).collect::<Vec<_>>(), vec!["Q", "first"]);

    // Forward again lands on the deepest node under the second reply
    assert_eq!(history.select_sibling("n2", 1).unwrap(), follow_up);
    // Clamped at the end
    assert_eq!(history.select_sibling("n3", 5).unwrap(), follow_up);

    history.validate().unwrap();
}

#[test]
fn test_tree_mutation_errors() {
    let mut ids = SequentialIds::new("n");
    let mut history = build_history(conversation(2), &mut ids);

    assert_eq!(
        history.append_child(None, MessageRecord::user("x"), &mut ids),
        Err(HistoryError::RootExists)
    );
    assert_eq!(
        history.append_child(Some("ghost"), MessageRecord::user("x"), &mut ids),
        Err(HistoryError::NodeNotFound("ghost".to_string()))
    );
    assert_eq!(
        history.add_sibling("n1", MessageRecord::user("x"), &mut ids),
        Err(HistoryError::RootHasNoSiblings("n1".to_string()))
    );
    assert_eq!(history.len(), 2);
}

#[test]
fn test_validate_reports_dangling_current() {
    let mut history = build_history(conversation(2), &mut SequentialIds::new("n"));
    history.current_id = Some("gone".to_string());
    assert_eq!(history.validate(), Err(HistoryError::CurrentNotFound("gone".to_string())));
}
