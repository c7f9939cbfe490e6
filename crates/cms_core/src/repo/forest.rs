//! Forest assembly from flat, ordered record lists.
//!
//! Children are derived from the parent-id index at query time; records
//! never hold references to each other.

use crate::model::record::{Record, RecordId, TreeNode};
use std::collections::HashMap;

/// Builds the subtrees hanging below `anchor` (`None` = roots).
///
/// Sibling order follows the input order. Records whose parent is not in
/// `records` (and is not `anchor`) are unreachable and dropped.
pub(crate) fn assemble(records: Vec<Record>, anchor: Option<RecordId>) -> Vec<TreeNode> {
    let mut children_of: HashMap<Option<RecordId>, Vec<usize>> = HashMap::new();
    for (index, record) in records.iter().enumerate() {
        children_of.entry(record.parent_id()).or_default().push(index);
    }

    let mut slots: Vec<Option<Record>> = records.into_iter().map(Some).collect();
    attach(anchor, &children_of, &mut slots)
}

fn attach(
    parent: Option<RecordId>,
    children_of: &HashMap<Option<RecordId>, Vec<usize>>,
    slots: &mut [Option<Record>],
) -> Vec<TreeNode> {
    let Some(indexes) = children_of.get(&parent) else {
        return Vec::new();
    };

    let mut nodes = Vec::with_capacity(indexes.len());
    for &index in indexes {
        // `take` guarantees each record is placed once, even on corrupt cycles.
        let Some(record) = slots[index].take() else {
            continue;
        };
        let children = attach(Some(record.id), children_of, slots);
        nodes.push(TreeNode { record, children });
    }
    nodes
}
