//! Property-based tests: convergence seen through the wrappers, and
//! identity stability of the pool under random operation sequences.

use proptest::prelude::*;

use witness::doc::{Doc, Value};
use witness::observe::{ObservableMovableList, ObservableText, Pool};

// =============================================================================
// Test helpers
// =============================================================================

/// A random edit against one document's wrappers.
#[derive(Clone, Debug)]
enum EditOp {
    MapSet { key: u8, value: i64 },
    MapDelete { key: u8 },
    ListInsert { pos_pct: f64, value: i64 },
    ListDelete { pos_pct: f64 },
    ListMove { from_pct: f64, to_pct: f64 },
    ListSet { pos_pct: f64, value: i64 },
    TextInsert { pos_pct: f64, content: String },
    TextDelete { pos_pct: f64, len_pct: f64 },
}

fn arbitrary_edit_op() -> impl Strategy<Value = EditOp> {
    prop_oneof![
        (0u8..8, any::<i64>()).prop_map(|(key, value)| EditOp::MapSet { key, value }),
        (0u8..8).prop_map(|key| EditOp::MapDelete { key }),
        (0.0..=1.0f64, any::<i64>())
            .prop_map(|(pos_pct, value)| EditOp::ListInsert { pos_pct, value }),
        (0.0..=1.0f64).prop_map(|pos_pct| EditOp::ListDelete { pos_pct }),
        (0.0..=1.0f64, 0.0..=1.0f64)
            .prop_map(|(from_pct, to_pct)| EditOp::ListMove { from_pct, to_pct }),
        (0.0..=1.0f64, any::<i64>())
            .prop_map(|(pos_pct, value)| EditOp::ListSet { pos_pct, value }),
        (0.0..=1.0f64, "[a-z]{1,6}")
            .prop_map(|(pos_pct, content)| EditOp::TextInsert { pos_pct, content }),
        (0.0..=1.0f64, 0.0..=0.5f64)
            .prop_map(|(pos_pct, len_pct)| EditOp::TextDelete { pos_pct, len_pct }),
    ]
}

fn scale(pct: f64, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    return ((pct * len as f64) as usize).min(len - 1);
}

fn apply_edit(pool: &Pool, op: &EditOp) {
    let doc = pool.doc().clone();
    let map = pool.get(doc.map("m"));
    let list = pool.get(doc.movable_list("l"));
    let text = pool.get(doc.text("t"));
    match op {
        EditOp::MapSet { key, value } => {
            map.insert(&format!("k{}", key), *value);
        }
        EditOp::MapDelete { key } => {
            // Deleting an absent key is a legitimate failure; skip it
            let _ = map.delete(&format!("k{}", key));
        }
        EditOp::ListInsert { pos_pct, value } => {
            let pos = ((*pos_pct * list.len() as f64) as usize).min(list.len());
            list.insert(pos, *value).expect("position clamped");
        }
        EditOp::ListDelete { pos_pct } => {
            if list.is_empty() {
                return;
            }
            let pos = scale(*pos_pct, list.len());
            list.delete(pos, 1).expect("position clamped");
        }
        EditOp::ListMove { from_pct, to_pct } => {
            if list.is_empty() {
                return;
            }
            let from = scale(*from_pct, list.len());
            let to = scale(*to_pct, list.len());
            list.mov(from, to).expect("positions clamped");
        }
        EditOp::ListSet { pos_pct, value } => {
            if list.is_empty() {
                return;
            }
            let pos = scale(*pos_pct, list.len());
            list.set(pos, *value).expect("position clamped");
        }
        EditOp::TextInsert { pos_pct, content } => {
            let pos = ((*pos_pct * text.len() as f64) as usize).min(text.len());
            text.insert(pos, content).expect("position clamped");
        }
        EditOp::TextDelete { pos_pct, len_pct } => {
            if text.is_empty() {
                return;
            }
            let pos = scale(*pos_pct, text.len());
            let max_len = text.len() - pos;
            let len = ((*len_pct * max_len as f64) as usize).max(1).min(max_len);
            text.delete(pos, len).expect("range clamped");
        }
    }
}

/// The full observable state of one document, as plain data.
fn snapshot(pool: &Pool) -> (Vec<(String, Value)>, Vec<Value>, String) {
    let doc = pool.doc().clone();
    let map = pool.get(doc.map("m"));
    let list = pool.get(doc.movable_list("l"));
    let text = pool.get(doc.text("t"));

    let mut entries: Vec<(String, Value)> = map
        .keys()
        .into_iter()
        .map(|key| {
            let value = map
                .get(&key)
                .and_then(|v| v.as_plain().cloned())
                .expect("plain entry");
            return (key, value);
        })
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let items: Vec<Value> = list
        .to_vec()
        .into_iter()
        .map(|v| v.as_plain().cloned().expect("plain element"))
        .collect();

    return (entries, items, text.to_string());
}

fn sync_both_ways(d1: &Doc, d2: &Doc) {
    d2.import(&d1.export()).expect("decodes");
    d1.import(&d2.export()).expect("decodes");
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Two peers editing independently converge to identical wrapper
    /// views after exchanging updates, regardless of the edits made.
    #[test]
    fn independent_edits_converge(
        ops1 in prop::collection::vec(arbitrary_edit_op(), 0..25),
        ops2 in prop::collection::vec(arbitrary_edit_op(), 0..25),
    ) {
        let d1 = Doc::new();
        let d2 = Doc::new();
        let pool1 = Pool::new(&d1);
        let pool2 = Pool::new(&d2);

        for op in &ops1 {
            apply_edit(&pool1, op);
        }
        for op in &ops2 {
            apply_edit(&pool2, op);
        }

        sync_both_ways(&d1, &d2);
        prop_assert_eq!(snapshot(&pool1), snapshot(&pool2));
    }

    /// Re-delivering updates never changes the converged state.
    #[test]
    fn repeated_sync_is_idempotent(
        ops in prop::collection::vec(arbitrary_edit_op(), 1..25),
    ) {
        let d1 = Doc::new();
        let d2 = Doc::new();
        let pool1 = Pool::new(&d1);
        let pool2 = Pool::new(&d2);

        for op in &ops {
            apply_edit(&pool1, op);
        }
        sync_both_ways(&d1, &d2);
        let settled = snapshot(&pool2);

        sync_both_ways(&d1, &d2);
        sync_both_ways(&d1, &d2);
        prop_assert_eq!(snapshot(&pool2), settled.clone());
        prop_assert_eq!(snapshot(&pool1), settled);
    }

    /// Wrapper identity survives any edit sequence: resolving the same
    /// containers afterward returns the original wrappers.
    #[test]
    fn wrapper_identity_survives_edits(
        ops in prop::collection::vec(arbitrary_edit_op(), 0..30),
    ) {
        let doc = Doc::new();
        let pool = Pool::new(&doc);
        let map = pool.get(doc.map("m"));
        let list: ObservableMovableList = pool.get(doc.movable_list("l"));
        let text: ObservableText = pool.get(doc.text("t"));

        for op in &ops {
            apply_edit(&pool, op);
        }

        prop_assert_eq!(pool.get(doc.map("m")), map);
        prop_assert_eq!(pool.get(doc.movable_list("l")), list);
        prop_assert_eq!(pool.get(doc.text("t")), text);
        prop_assert_eq!(pool.size(), 3);
    }
}
