use std::collections::BTreeSet;

use crate::index::InventoryIndex;
use crate::model::{DuplicateSerial, RecordId};

/// Full keys holding more than one distinct record.
///
/// Keys with an empty batch or serial segment are skipped: they describe
/// "any batch" / "any serial" and sharing them is not a data-quality problem.
/// A record set already reported under one key is not reported again under
/// its smart-zero alias.
pub fn find_duplicate_serials(index: &InventoryIndex) -> Vec<DuplicateSerial> {
    let mut reported: BTreeSet<Vec<RecordId>> = BTreeSet::new();
    let mut duplicates = Vec::new();

    for (_, ids) in index.exact_buckets() {
        let distinct: BTreeSet<RecordId> = ids.iter().copied().collect();
        if distinct.len() < 2 {
            continue;
        }

        let first = index.record(ids[0]);
        if first.batch.is_empty() || first.serial.is_empty() {
            continue;
        }

        if !reported.insert(distinct.iter().copied().collect()) {
            continue;
        }

        duplicates.push(DuplicateSerial {
            material: first.material.clone(),
            batch: first.batch.clone(),
            serial: first.serial.clone(),
            count: distinct.len(),
        });
    }

    if !duplicates.is_empty() {
        log::warn!(
            "{} duplicate serial(s) in system data; matching may pick either copy",
            duplicates.len()
        );
    }

    duplicates
}
