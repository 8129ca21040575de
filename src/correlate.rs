//! Joins independently walked table columns into rows.
//!
//! Rows are matched on the table index (the last OID sub-identifier), never
//! on position, so a column that skips a row or comes back in a different
//! order cannot shift values onto a neighbouring row.

use crate::record::{FieldValue, Record};
use crate::snmp::{SnmpValue, WalkResult};
use std::collections::{HashMap, HashSet};

/// A walked column and the record field it fills
#[derive(Debug, Clone, Copy)]
pub struct Column<'a> {
    pub name: &'a str,
    pub walk: &'a WalkResult,
}

impl<'a> Column<'a> {
    pub fn new(name: &'a str, walk: &'a WalkResult) -> Self {
        Self { name, walk }
    }
}

/// Build one record per distinct index of the first (primary) column, in its
/// walk order. A repeated primary index keeps its first binding. Secondary
/// columns without a value for a row's index contribute
/// [`FieldValue::Missing`]; indexes found only in secondary columns are
/// dropped.
pub fn correlate(columns: &[Column<'_>]) -> Vec<Record> {
    let Some((primary, secondary)) = columns.split_first() else {
        return Vec::new();
    };

    let lookups: Vec<(&str, HashMap<u32, &SnmpValue>)> = secondary
        .iter()
        .map(|column| (column.name, index_values(column.walk)))
        .collect();

    let primary_indexes: HashSet<u32> = primary
        .walk
        .iter()
        .filter_map(|b| b.oid.table_index())
        .collect();
    for (name, values) in &lookups {
        let unmatched = values
            .keys()
            .filter(|index| !primary_indexes.contains(index))
            .count();
        if unmatched > 0 {
            tracing::debug!(
                "Column {} has {} rows with no match in {}",
                name,
                unmatched,
                primary.name
            );
        }
    }

    let mut emitted = HashSet::with_capacity(primary_indexes.len());
    let mut records = Vec::with_capacity(primary_indexes.len());
    for binding in primary.walk {
        let Some(index) = binding.oid.table_index() else {
            continue;
        };
        if !emitted.insert(index) {
            tracing::debug!(
                "Column {} repeats index {} at {}, keeping the first row",
                primary.name,
                index,
                binding.oid
            );
            continue;
        }

        let mut record = Record::with_index(index);
        record.set(primary.name, FieldValue::from(binding.value.clone()));

        for (name, values) in &lookups {
            let value = values
                .get(&index)
                .map(|v| FieldValue::from((*v).clone()))
                .unwrap_or(FieldValue::Missing);
            record.set(*name, value);
        }

        records.push(record);
    }

    records
}

/// index -> value, first occurrence wins
fn index_values(walk: &WalkResult) -> HashMap<u32, &SnmpValue> {
    let mut values = HashMap::with_capacity(walk.len());
    for binding in walk {
        if let Some(index) = binding.oid.table_index() {
            values.entry(index).or_insert(&binding.value);
        }
    }
    values
}
