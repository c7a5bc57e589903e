//! Three-pass, quantity-aware allocation of scans against the inventory index.
//!
//! Each pass runs over the whole scan batch before the next one starts, so
//! every serial-level match is settled before any batch-level match can take
//! shared stock, and every batch-level match before any material-level one.

use crate::config::MatchingConfig;
use crate::index::{batch_key, canonical_numeric, full_key, material_key, InventoryIndex, KeyLevel};
use crate::model::{MatchResult, MatchTier, RecordId, ScanRecord};

#[derive(Debug, Clone, Copy)]
pub struct AllocationOptions<'a> {
    pub enable_concat: bool,
    pub concat_delimiter: &'a str,
    /// Uppercase plant codes, most preferred first. Empty = bucket order.
    pub plant_priority: &'a [String],
    /// Retry a missed lookup with the scanned material's leading zeros removed.
    pub smart_zero: bool,
}

impl<'a> AllocationOptions<'a> {
    pub fn from_config(config: &'a MatchingConfig) -> Self {
        Self {
            enable_concat: config.enable_concat,
            concat_delimiter: &config.concat_delimiter,
            plant_priority: &config.plant_priority,
            smart_zero: config.smart_zero,
        }
    }

    /// Plain first-available selection: no concat retry, no plant ranking.
    pub fn first_available() -> Self {
        Self {
            enable_concat: false,
            concat_delimiter: "",
            plant_priority: &[],
            smart_zero: false,
        }
    }

    /// Same selection, with the smart-zero retry switched on or off.
    pub fn with_smart_zero(mut self, smart_zero: bool) -> Self {
        self.smart_zero = smart_zero;
        self
    }
}

enum Lookup {
    /// A record with stock left.
    Hit(RecordId),
    /// The bucket exists but every record in it is used up.
    Exhausted(RecordId),
    Missing,
}

/// Allocate every scan. Returns one result per scan, in scan order.
///
/// Invalid scans and scans without any bucket get [`MatchTier::None`] and
/// their full quantity as shortfall. A scan whose buckets all turned out to be
/// exhausted keeps the tier of the first bucket it hit, with nothing consumed.
pub fn allocate(
    scans: &[ScanRecord],
    index: &mut InventoryIndex,
    options: &AllocationOptions<'_>,
) -> Vec<MatchResult> {
    let mut hits: Vec<Option<(MatchTier, RecordId, f64)>> = vec![None; scans.len()];
    let mut exhausted: Vec<Option<(MatchTier, RecordId)>> = vec![None; scans.len()];

    // Pass 1: exact, with the concatenated-serial retry.
    for (i, scan) in scans.iter().enumerate() {
        if !scan.is_valid() {
            continue;
        }
        let b = &scan.barcode;
        let long_serial = format!("{}{}{}", b.batch, options.concat_delimiter, b.serial);

        for material in material_candidates(&b.material, options) {
            let key = full_key(&material, &b.batch, &b.serial);
            if try_take(index, KeyLevel::Full, &key, MatchTier::Exact, scan, options, &mut hits[i], &mut exhausted[i]) {
                break;
            }

            if options.enable_concat {
                let key = full_key(&material, &b.batch, &long_serial);
                if try_take(index, KeyLevel::Full, &key, MatchTier::Concat, scan, options, &mut hits[i], &mut exhausted[i]) {
                    break;
                }
            }
        }
    }

    // Pass 2: batch.
    for (i, scan) in scans.iter().enumerate() {
        if hits[i].is_some() || !scan.is_valid() {
            continue;
        }
        for material in material_candidates(&scan.barcode.material, options) {
            let key = batch_key(&material, &scan.barcode.batch);
            if try_take(index, KeyLevel::Batch, &key, MatchTier::BatchMatch, scan, options, &mut hits[i], &mut exhausted[i]) {
                break;
            }
        }
    }

    // Pass 3: material.
    for (i, scan) in scans.iter().enumerate() {
        if hits[i].is_some() || !scan.is_valid() {
            continue;
        }
        for material in material_candidates(&scan.barcode.material, options) {
            let key = material_key(&material);
            if try_take(index, KeyLevel::Material, &key, MatchTier::MaterialOnly, scan, options, &mut hits[i], &mut exhausted[i]) {
                break;
            }
        }
    }

    let results: Vec<MatchResult> = scans
        .iter()
        .enumerate()
        .map(|(i, scan)| match (hits[i], exhausted[i]) {
            (Some((tier, id, consumed)), _) => MatchResult {
                scan: i,
                record: Some(id),
                tier,
                requested: scan.quantity,
                consumed,
                shortfall: scan.quantity - consumed,
            },
            (None, Some((tier, id))) => MatchResult {
                scan: i,
                record: Some(id),
                tier,
                requested: scan.quantity,
                consumed: 0.0,
                shortfall: scan.quantity,
            },
            (None, None) => MatchResult::unmatched(i, scan.quantity),
        })
        .collect();

    log::debug!(
        "allocation: {} scans, {} hit, {} exhausted, {} unmatched",
        scans.len(),
        hits.iter().filter(|h| h.is_some()).count(),
        hits.iter().zip(&exhausted).filter(|(h, e)| h.is_none() && e.is_some()).count(),
        results.iter().filter(|r| r.tier == MatchTier::None).count(),
    );

    results
}

/// The scanned material, then (with smart zero) its leading-zero-free form.
/// Inventory aliases cover short scans against padded stock; this covers
/// padded scans against short stock.
fn material_candidates(material: &str, options: &AllocationOptions<'_>) -> Vec<String> {
    let mut candidates = vec![material.to_string()];
    if options.smart_zero {
        candidates.extend(canonical_numeric(material));
    }
    candidates
}

/// Look up one bucket and consume from it on a hit. Returns true on a hit.
/// The first exhausted bucket seen for a scan is remembered.
#[allow(clippy::too_many_arguments)]
fn try_take(
    index: &mut InventoryIndex,
    level: KeyLevel,
    key: &str,
    tier: MatchTier,
    scan: &ScanRecord,
    options: &AllocationOptions<'_>,
    hit: &mut Option<(MatchTier, RecordId, f64)>,
    exhausted: &mut Option<(MatchTier, RecordId)>,
) -> bool {
    match lookup(index, level, key, options.plant_priority) {
        Lookup::Hit(id) => {
            let consumed = index.consume(id, scan.quantity);
            *hit = Some((tier, id, consumed));
            true
        }
        Lookup::Exhausted(id) => {
            if exhausted.is_none() {
                *exhausted = Some((tier, id));
            }
            false
        }
        Lookup::Missing => false,
    }
}

fn lookup(index: &InventoryIndex, level: KeyLevel, key: &str, plant_priority: &[String]) -> Lookup {
    let Some(ids) = index.bucket(level, key) else {
        return Lookup::Missing;
    };

    let available = ids.iter().copied().filter(|id| index.record(*id).available() > 0.0);
    if let Some(id) = pick(index, available, plant_priority) {
        return Lookup::Hit(id);
    }

    match pick(index, ids.iter().copied(), plant_priority) {
        Some(id) => Lookup::Exhausted(id),
        None => Lookup::Missing,
    }
}

/// First candidate by plant rank; plants missing from the list rank last and
/// ties keep bucket order.
fn pick(
    index: &InventoryIndex,
    mut candidates: impl Iterator<Item = RecordId>,
    plant_priority: &[String],
) -> Option<RecordId> {
    if plant_priority.is_empty() {
        return candidates.next();
    }
    candidates.min_by_key(|id| {
        let plant = &index.record(*id).plant;
        plant_priority
            .iter()
            .position(|p| p == plant)
            .unwrap_or(usize::MAX)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::barcode::BarcodeParser;
    use crate::model::{StockAssessment, StockStatus, SystemRow};

    fn scan(raw: &str, qty: f64) -> ScanRecord {
        ScanRecord {
            row: 1,
            raw: raw.into(),
            barcode: BarcodeParser::default().parse(raw),
            quantity: qty,
            condition: String::new(),
            description: String::new(),
            customer_name: String::new(),
            customer_code: String::new(),
            stock: StockAssessment {
                status: StockStatus::NoExpiry,
                priority: 6,
                days_left: None,
            },
        }
    }

    fn sys(mat: &str, batch: &str, ser: &str, qty: f64, plant: &str) -> SystemRow {
        SystemRow {
            material: mat.into(),
            batch: batch.into(),
            serial: ser.into(),
            quantity: Some(qty),
            plant: plant.into(),
            ..SystemRow::default()
        }
    }

    fn run(scans: &[ScanRecord], index: &mut InventoryIndex) -> Vec<MatchResult> {
        let config = MatchingConfig::default();
        allocate(scans, index, &AllocationOptions::from_config(&config))
    }

    #[test]
    fn exact_then_batch() {
        let mut index = InventoryIndex::build(vec![sys("100", "B1", "S1", 5.0, "")], false);
        let scans = vec![scan("(240)100(10)B1(21)S1", 1.0), scan("(240)100(10)B1(21)S2", 1.0)];
        let results = run(&scans, &mut index);

        assert_eq!(results[0].tier, MatchTier::Exact);
        assert_eq!(results[0].consumed, 1.0);
        assert_eq!(results[1].tier, MatchTier::BatchMatch);
        assert_eq!(results[1].consumed, 1.0);
        assert_eq!(index.record(RecordId(0)).consumed, 2.0);
    }

    #[test]
    fn exhausted_exact_keeps_tier_with_full_shortfall() {
        let mut index = InventoryIndex::build(vec![sys("100", "B1", "S1", 1.0, "")], false);
        let scans = vec![scan("(240)100(10)B1(21)S1", 1.0), scan("(240)100(10)B1(21)S1", 1.0)];
        let results = run(&scans, &mut index);

        assert_eq!(results[0].tier, MatchTier::Exact);
        assert!(!results[0].is_partial());
        assert_eq!(results[1].tier, MatchTier::Exact);
        assert_eq!(results[1].record, Some(RecordId(0)));
        assert_eq!(results[1].consumed, 0.0);
        assert_eq!(results[1].shortfall, 1.0);
        assert!(results[1].is_partial());
    }

    #[test]
    fn exhausted_exact_falls_back_to_other_stock_in_batch() {
        let mut index = InventoryIndex::build(
            vec![sys("100", "B1", "S1", 1.0, ""), sys("100", "B1", "S2", 1.0, "")],
            false,
        );
        let scans = vec![scan("(240)100(10)B1(21)S1", 1.0), scan("(240)100(10)B1(21)S1", 1.0)];
        let results = run(&scans, &mut index);
        assert_eq!(results[1].tier, MatchTier::BatchMatch);
        assert_eq!(results[1].record, Some(RecordId(1)));
        assert_eq!(results[1].shortfall, 0.0);
    }

    #[test]
    fn partial_consumption() {
        let mut index = InventoryIndex::build(vec![sys("100", "B1", "S1", 3.0, "")], false);
        let scans = vec![scan("(240)100(10)B1(21)S1", 5.0)];
        let results = run(&scans, &mut index);
        assert_eq!(results[0].tier, MatchTier::Exact);
        assert_eq!(results[0].consumed, 3.0);
        assert_eq!(results[0].shortfall, 2.0);
        assert!(results[0].is_partial());
        assert_eq!(index.record(RecordId(0)).consumed, 3.0);
    }

    #[test]
    fn pass_order_protects_exact_matches() {
        // One unit in stock. The batch-level scan comes first in the file but
        // must not take the unit the exact scan is entitled to.
        let mut index = InventoryIndex::build(vec![sys("100", "B1", "S1", 1.0, "")], false);
        let scans = vec![scan("(240)100(10)B1(21)S9", 1.0), scan("(240)100(10)B1(21)S1", 1.0)];
        let results = run(&scans, &mut index);
        assert_eq!(results[1].tier, MatchTier::Exact);
        assert_eq!(results[1].consumed, 1.0);
        assert_eq!(results[0].tier, MatchTier::BatchMatch);
        assert_eq!(results[0].consumed, 0.0);
        assert_eq!(results[0].shortfall, 1.0);
    }

    #[test]
    fn material_only_pass() {
        let mut index = InventoryIndex::build(vec![sys("ABCDEFGH", "X", "Y", 2.0, "")], false);
        let scans = vec![scan("ABCDEFGH", 1.0)];
        let results = run(&scans, &mut index);
        assert_eq!(results[0].tier, MatchTier::MaterialOnly);
        assert_eq!(results[0].consumed, 1.0);
    }

    #[test]
    fn concat_serial() {
        let mut index = InventoryIndex::build(vec![sys("100", "B1", "B1-S1", 1.0, "")], false);
        let scans = vec![scan("(240)100(10)B1(21)S1", 1.0)];

        let mut config = MatchingConfig::default();
        config.concat_delimiter = "-".into();
        let results = allocate(&scans, &mut index, &AllocationOptions::from_config(&config));
        assert_eq!(results[0].tier, MatchTier::Concat);
        assert_eq!(results[0].consumed, 1.0);
    }

    #[test]
    fn concat_disabled_falls_to_batch() {
        let mut index = InventoryIndex::build(vec![sys("100", "B1", "B1S1", 1.0, "")], false);
        let scans = vec![scan("(240)100(10)B1(21)S1", 1.0)];

        let mut config = MatchingConfig::default();
        config.enable_concat = false;
        let results = allocate(&scans, &mut index, &AllocationOptions::from_config(&config));
        assert_eq!(results[0].tier, MatchTier::BatchMatch);
    }

    #[test]
    fn plant_priority_orders_candidates() {
        let mut index = InventoryIndex::build(
            vec![
                sys("100", "B1", "S1", 1.0, "P9"),
                sys("100", "B1", "S2", 1.0, "P2"),
                sys("100", "B1", "S3", 1.0, "P1"),
                sys("100", "B1", "S4", 1.0, "P2"),
            ],
            false,
        );
        let scans: Vec<ScanRecord> = (0..4).map(|_| scan("(240)100(10)B1(21)NONE", 1.0)).collect();

        let mut config = MatchingConfig::default();
        config.plant_priority = vec!["P1".into(), "P2".into()];
        let results = allocate(&scans, &mut index, &AllocationOptions::from_config(&config));
        let order: Vec<usize> = results.iter().map(|r| r.record.unwrap().index()).collect();
        // P1, then both P2 in bucket order, then the unlisted plant.
        assert_eq!(order, vec![2, 1, 3, 0]);
    }

    #[test]
    fn no_priority_takes_bucket_order() {
        let mut index = InventoryIndex::build(
            vec![sys("100", "B1", "S1", 1.0, "P9"), sys("100", "B1", "S2", 1.0, "P1")],
            false,
        );
        let scans = vec![scan("(240)100(10)B1(21)X", 1.0)];
        let results = run(&scans, &mut index);
        assert_eq!(results[0].record, Some(RecordId(0)));
    }

    #[test]
    fn invalid_and_unknown_scans_are_variance() {
        let mut index = InventoryIndex::build(vec![sys("100", "B1", "S1", 1.0, "")], false);
        let scans = vec![scan("AB", 2.0), scan("(240)999(10)B1(21)S1", 3.0)];
        let results = run(&scans, &mut index);
        for r in &results {
            assert_eq!(r.tier, MatchTier::None);
            assert_eq!(r.record, None);
            assert_eq!(r.consumed, 0.0);
            assert_eq!(r.shortfall, r.requested);
        }
        assert_eq!(index.total_consumed(), 0.0);
    }

    #[test]
    fn smart_zero_resolves_short_barcode() {
        let mut index = InventoryIndex::build(vec![sys("000100", "B1", "S1", 1.0, "")], true);
        let scans = vec![scan("(240)100(10)B1(21)S1", 1.0)];
        let results = run(&scans, &mut index);
        assert_eq!(results[0].tier, MatchTier::Exact);
    }

    #[test]
    fn smart_zero_resolves_padded_barcode() {
        let mut index = InventoryIndex::build(vec![sys("100", "B1", "S1", 1.0, "")], true);
        let scans = vec![scan("(240)0100(10)B1(21)S1", 1.0), scan("(240)00100(10)B1(21)S2", 1.0)];

        let mut config = MatchingConfig::default();
        config.smart_zero = true;
        let results = allocate(&scans, &mut index, &AllocationOptions::from_config(&config));
        assert_eq!(results[0].tier, MatchTier::Exact);
        assert_eq!(results[0].consumed, 1.0);
        // Stock is gone; the second scan still finds the batch, exhausted.
        assert_eq!(results[1].tier, MatchTier::BatchMatch);
        assert_eq!(results[1].record, Some(RecordId(0)));
        assert_eq!(results[1].consumed, 0.0);
    }

    #[test]
    fn padded_barcode_misses_without_smart_zero() {
        let mut index = InventoryIndex::build(vec![sys("100", "B1", "S1", 1.0, "")], false);
        let results = run(&[scan("(240)0100(10)B1(21)S1", 1.0)], &mut index);
        assert_eq!(results[0].tier, MatchTier::None);
        assert_eq!(index.total_consumed(), 0.0);
    }

    #[test]
    fn conservation_holds() {
        let mut index = InventoryIndex::build(
            vec![sys("100", "B1", "S1", 2.0, ""), sys("100", "B2", "S2", 1.5, ""), sys("200", "", "", 1.0, "")],
            false,
        );
        let scans = vec![
            scan("(240)100(10)B1(21)S1", 3.0),
            scan("(240)100(10)B2(21)S7", 1.0),
            scan("(240)100(10)B9(21)S7", 1.0),
            scan("(240)200", 0.5),
            scan("(240)300", 1.0),
        ];
        let results = run(&scans, &mut index);
        for r in &results {
            assert_eq!(r.consumed + r.shortfall, r.requested);
        }
        for rec in index.records() {
            assert!(rec.consumed >= 0.0 && rec.consumed <= rec.quantity);
        }
    }

    #[test]
    fn first_available_options_ignore_priority_and_concat() {
        let opts = AllocationOptions::first_available();
        assert!(!opts.enable_concat);
        assert!(opts.plant_priority.is_empty());
        assert!(!opts.smart_zero);
        assert!(opts.with_smart_zero(true).smart_zero);
    }
}
