//! Identity alignment: reorder and truncate ID-keyed parallel columns so that
//! they follow an authoritative ID ordering.
//!
//! This is the primitive that keeps every frame's ID column pointing at the
//! same physical object after each matching round. Given a table whose key
//! column holds IDs and a target ordering `new_id` (a subset of those IDs,
//! each present exactly once), the table is permuted so that row `i` carries
//! `new_id[i]` and then truncated to `new_id.len()` rows.
//!
//! The lookup is a hash map from ID to row rather than a forward linear scan;
//! the resulting table is identical.

use std::collections::HashMap;

use crate::{Error, Result};

/// Compute the source row for each target position.
///
/// `order[i]` is the row in `ids` holding `new_id[i]`. Fails with
/// [`Error::IdNotFound`] if an ID is absent, or requested twice.
pub fn alignment_order(ids: &[u64], new_id: &[u64]) -> Result<Vec<usize>> {
    let mut row_of: HashMap<u64, usize> = HashMap::with_capacity(ids.len());
    for (row, &id) in ids.iter().enumerate() {
        row_of.entry(id).or_insert(row);
    }

    new_id
        .iter()
        .map(|&id| row_of.remove(&id).ok_or(Error::IdNotFound { id, frame: None }))
        .collect()
}

/// Rebuild `column` as `column[order[0]], column[order[1]], ...`.
pub fn apply_order<T: Copy>(column: &mut Vec<T>, order: &[usize]) {
    let reordered: Vec<T> = order.iter().map(|&row| column[row]).collect();
    *column = reordered;
}

/// Align every column of `table` to `new_id`, keyed on `table[key_column]`.
///
/// On error the table is left untouched.
pub fn align_table(table: &mut [Vec<u64>], key_column: usize, new_id: &[u64]) -> Result<()> {
    let rows = table[key_column].len();
    debug_assert!(table.iter().all(|column| column.len() == rows));

    let order = alignment_order(&table[key_column], new_id)?;
    for column in table.iter_mut() {
        apply_order(column, &order);
    }
    Ok(())
}
