use crate::model::{AggregateKey, AggregatedRow, CommitRecord};
use std::collections::HashMap;

/// Merge commit records into one row per (project, author, branch).
///
/// Rows come out in the order their key was first seen.
pub fn aggregate(records: &[CommitRecord]) -> Vec<AggregatedRow> {
    let mut index: HashMap<AggregateKey, usize> = HashMap::new();
    let mut rows: Vec<AggregatedRow> = Vec::new();

    for record in records {
        let key = AggregateKey::from(record);
        let slot = match index.get(&key) {
            Some(&slot) => slot,
            None => {
                rows.push(AggregatedRow::new(key.clone()));
                index.insert(key, rows.len() - 1);
                rows.len() - 1
            }
        };
        rows[slot].add_record(record);
    }

    rows
}
