// Aggregations and derived ratios over the normalized dataset.
//
// Everything here is pure: inputs are borrowed, nothing is mutated, and the
// same inputs always give the same output. Degenerate arithmetic (zero
// denominators, zero growth bases) is reported as 0 rather than an error.
use crate::error::{Error, Result};
use crate::types::{
    CompetitorRow, Dataset, Field, Metric, MoleculeScope, MoleculeSummary, PackLine,
    ProductSummary, SalesRecord, LATEST, YEARS,
};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// Growth periods between the first and last year of the span.
pub const GROWTH_PERIODS: u32 = (YEARS - 1) as u32;

/// Most frequent value of `field` among `records`.
///
/// Ties go to the value that appears first in `records`.
pub fn resolve_mode(records: &[&SalesRecord], field: Field) -> Result<String> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for r in records {
        let v = r.field(field);
        match counts.iter_mut().find(|(seen, _)| *seen == v) {
            Some((_, n)) => *n += 1,
            None => counts.push((v, 1)),
        }
    }
    let mut best: Option<(&str, usize)> = None;
    for (v, n) in counts {
        if best.map_or(true, |(_, b)| n > b) {
            best = Some((v, n));
        }
    }
    best.map(|(v, _)| v.to_string())
        .ok_or(Error::EmptyGroup { field: field.name() })
}

pub fn sum_by_year(records: &[&SalesRecord], metric: Metric, year_index: usize) -> f64 {
    records.iter().map(|r| r.metric(metric, year_index)).sum()
}

fn sum_all_years(records: &[&SalesRecord], metric: Metric) -> [f64; YEARS] {
    std::array::from_fn(|i| sum_by_year(records, metric, i))
}

/// Percentage of the class total; 0 when the class total is 0.
pub fn share_of_class(molecule_total: f64, class_total: f64) -> f64 {
    if class_total == 0.0 {
        return 0.0;
    }
    molecule_total / class_total * 100.0
}

/// Compound growth rate in percent over `periods`.
///
/// A zero start (or any input that leaves the rate undefined) yields 0.
pub fn compound_growth_rate(start: f64, end: f64, periods: u32) -> f64 {
    if start == 0.0 || periods == 0 {
        return 0.0;
    }
    let rate = ((end / start).powf(1.0 / periods as f64) - 1.0) * 100.0;
    if rate.is_finite() {
        rate
    } else {
        0.0
    }
}

/// Group records by a categorical field, keeping first-seen group order and
/// row order inside each group.
fn group_by<'a>(records: &[&'a SalesRecord], field: Field) -> Vec<(&'a str, Vec<&'a SalesRecord>)> {
    let mut slots: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(&str, Vec<&SalesRecord>)> = Vec::new();
    for &r in records {
        let key = r.field(field);
        match slots.get(key) {
            Some(&i) => groups[i].1.push(r),
            None => {
                slots.insert(key, groups.len());
                groups.push((key, vec![r]));
            }
        }
    }
    groups
}

pub fn build_molecule_summary(dataset: &Dataset, molecule: &str) -> Result<MoleculeSummary> {
    let records = dataset.molecule_records(molecule);
    if records.is_empty() {
        return Err(Error::UnknownMolecule(molecule.to_string()));
    }

    let atc = [
        resolve_mode(&records, Field::Atc(0))?,
        resolve_mode(&records, Field::Atc(1))?,
        resolve_mode(&records, Field::Atc(2))?,
        resolve_mode(&records, Field::Atc(3))?,
    ];
    let units = sum_all_years(&records, Metric::Units);
    let value = sum_all_years(&records, Metric::Value);
    let first_launch = records.iter().filter_map(|r| r.launch_year).min();

    let class = dataset.class_records(&atc[3]);
    let class_units = sum_all_years(&class, Metric::Units);
    let class_value = sum_all_years(&class, Metric::Value);
    let class_share = std::array::from_fn(|i| share_of_class(units[i], class_units[i]));

    Ok(MoleculeSummary {
        molecule: molecule.to_string(),
        atc,
        units,
        value,
        forecast: dataset.forecast(molecule),
        first_launch,
        class_units,
        class_value,
        class_share,
        units_growth: compound_growth_rate(units[0], units[LATEST], GROWTH_PERIODS),
        value_growth: compound_growth_rate(value[0], value[LATEST], GROWTH_PERIODS),
    })
}

/// Per-product breakdown of one molecule's records.
///
/// The mono/shared flag looks at every record in `dataset`, so a product
/// sold under several molecules is reported as shared.
pub fn build_product_summaries(
    dataset: &Dataset,
    molecule_records: &[&SalesRecord],
) -> Result<Vec<ProductSummary>> {
    let molecule_latest = sum_by_year(molecule_records, Metric::Units, LATEST);

    let groups = group_by(molecule_records, Field::Product);
    let wanted: HashSet<&str> = groups.iter().map(|(p, _)| *p).collect();
    let mut molecules_per_product: HashMap<&str, HashSet<&str>> = HashMap::new();
    for r in dataset.records.iter().filter(|r| wanted.contains(r.product.as_str())) {
        molecules_per_product
            .entry(r.product.as_str())
            .or_default()
            .insert(r.molecule.as_str());
    }

    groups
        .into_iter()
        .map(|(product, rows)| {
            let latest_units = sum_by_year(&rows, Metric::Units, LATEST);
            let distinct = molecules_per_product.get(product).map_or(1, HashSet::len);
            Ok(ProductSummary {
                product: product.to_string(),
                manufacturer: resolve_mode(&rows, Field::Manufacturer)?,
                combination_type: resolve_mode(&rows, Field::CombinationType)?,
                latest_units,
                molecule_share: share_of_class(latest_units, molecule_latest),
                scope: if distinct <= 1 { MoleculeScope::Mono } else { MoleculeScope::Shared },
                packs: rows
                    .iter()
                    .map(|r| PackLine {
                        pack: r.pack.clone(),
                        retail_price: r.retail_price,
                        latest_units: r.units[LATEST],
                    })
                    .collect(),
            })
        })
        .collect()
}

/// Every molecule in an ATC4 class with its latest-year standing, largest
/// first.
pub fn build_class_competitor_table(dataset: &Dataset, atc4: &str) -> Vec<CompetitorRow> {
    let class = dataset.class_records(atc4);
    let mut total_units = sum_by_year(&class, Metric::Units, LATEST);
    let mut total_value = sum_by_year(&class, Metric::Value, LATEST);
    if total_units == 0.0 {
        total_units = 1.0;
    }
    if total_value == 0.0 {
        total_value = 1.0;
    }

    let mut rows: Vec<CompetitorRow> = group_by(&class, Field::Molecule)
        .into_iter()
        .map(|(molecule, rows)| {
            let latest_units = sum_by_year(&rows, Metric::Units, LATEST);
            let latest_value = sum_by_year(&rows, Metric::Value, LATEST);
            CompetitorRow {
                molecule: molecule.to_string(),
                latest_units,
                latest_value,
                units_pct: latest_units / total_units * 100.0,
                value_pct: latest_value / total_value * 100.0,
                competitors: dataset
                    .forecasts
                    .get(molecule)
                    .map(|f| f.competitors.clone())
                    .unwrap_or_default(),
            }
        })
        .collect();

    // `sort_by` is stable, so equal units keep grouping order.
    rows.sort_by(|a, b| {
        b.latest_units
            .partial_cmp(&a.latest_units)
            .unwrap_or(Ordering::Equal)
    });
    rows
}

/// Competitor table for the class the molecule resolves to.
pub fn molecule_competitor_table(dataset: &Dataset, molecule: &str) -> Result<(String, Vec<CompetitorRow>)> {
    let records = dataset.molecule_records(molecule);
    if records.is_empty() {
        return Err(Error::UnknownMolecule(molecule.to_string()));
    }
    let atc4 = resolve_mode(&records, Field::Atc(3))?;
    let table = build_class_competitor_table(dataset, &atc4);
    Ok((atc4, table))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::{Competitors, ForecastEntry, YearSpan};

    pub(crate) fn record(
        molecule: &str,
        product: &str,
        atc4: &str,
        units: [f64; YEARS],
        value: [f64; YEARS],
    ) -> SalesRecord {
        SalesRecord {
            molecule: molecule.into(),
            product: product.into(),
            manufacturer: format!("{product} Labs"),
            pack: format!("{product} 10mg"),
            combination_type: "mono".into(),
            atc: ["A".into(), "A1".into(), "A1B".into(), atc4.into()],
            launch_year: Some(2018),
            retail_price: 12.5,
            units,
            value,
        }
    }

    /// Molecule X (two products) in class C1 alongside Y and Z; class units
    /// are 1000 every year.
    pub(crate) fn scenario() -> Dataset {
        let mut p1 = record("X", "P1", "C1", [60.0, 90.0, 120.0], [600.0, 900.0, 1200.0]);
        p1.launch_year = Some(2016);
        let p2 = record("X", "P2", "C1", [40.0, 60.0, 80.0], [400.0, 500.0, 700.0]);
        let y = record("Y", "Q1", "C1", [500.0, 450.0, 400.0], [5000.0, 4500.0, 4000.0]);
        let z = record("Z", "R1", "C1", [400.0, 400.0, 400.0], [1000.0, 1000.0, 1000.0]);
        let other = record("W", "S1", "C2", [7.0, 7.0, 7.0], [7.0, 7.0, 7.0]);
        let mut forecasts = HashMap::new();
        forecasts.insert(
            "X".to_string(),
            ForecastEntry { cagr: 8.0, private_share: 0.35, competitors: Competitors::Count(4) },
        );
        Dataset::new(vec![p1, p2, y, z, other], forecasts, YearSpan::new(2022))
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn mode_prefers_first_seen_on_ties() {
        let mut a = record("X", "P1", "C1", [0.0; 3], [0.0; 3]);
        let mut b = a.clone();
        let mut c = a.clone();
        a.manufacturer = "Beta".into();
        b.manufacturer = "Alpha".into();
        c.manufacturer = "Alpha".into();
        let rows = vec![&a, &b];
        assert_eq!(resolve_mode(&rows, Field::Manufacturer).unwrap(), "Beta");
        let rows = vec![&a, &b, &c];
        assert_eq!(resolve_mode(&rows, Field::Manufacturer).unwrap(), "Alpha");
    }

    #[test]
    fn mode_of_empty_group_fails() {
        let err = resolve_mode(&[], Field::Atc(3)).unwrap_err();
        assert!(matches!(err, Error::EmptyGroup { field: "ATC4" }));
    }

    #[test]
    fn sum_of_nothing_is_zero() {
        assert_eq!(sum_by_year(&[], Metric::Units, 0), 0.0);
    }

    #[test]
    fn zero_denominators_are_neutral() {
        assert_eq!(share_of_class(42.0, 0.0), 0.0);
        assert_eq!(share_of_class(0.0, 0.0), 0.0);
        assert_eq!(compound_growth_rate(0.0, 500.0, 2), 0.0);
        assert_eq!(compound_growth_rate(100.0, 100.0, 2), 0.0);
        assert_eq!(compound_growth_rate(100.0, 100.0, 0), 0.0);
    }

    #[test]
    fn growth_rate_over_two_periods() {
        assert!(approx(compound_growth_rate(100.0, 121.0, 2), 10.0));
        assert!(approx(compound_growth_rate(100.0, 200.0, 2), (2f64.sqrt() - 1.0) * 100.0));
    }

    #[test]
    fn molecule_summary_end_to_end() {
        let ds = scenario();
        let s = build_molecule_summary(&ds, "X").unwrap();
        assert_eq!(s.atc[3], "C1");
        assert_eq!(s.units, [100.0, 150.0, 200.0]);
        assert_eq!(s.value, [1000.0, 1400.0, 1900.0]);
        assert_eq!(s.class_units, [1000.0, 1000.0, 1000.0]);
        assert!(approx(s.class_share[0], 10.0));
        assert!(approx(s.class_share[2], 20.0));
        assert!((s.units_growth - 41.42).abs() < 0.01);
        assert_eq!(s.first_launch, Some(2016));
        assert_eq!(s.forecast.competitors, Competitors::Count(4));
    }

    #[test]
    fn missing_forecast_defaults() {
        let ds = scenario();
        let s = build_molecule_summary(&ds, "Y").unwrap();
        assert_eq!(s.forecast.cagr, 0.0);
        assert_eq!(s.forecast.private_share, 0.0);
        assert_eq!(s.forecast.competitors.to_string(), "N/A");
    }

    #[test]
    fn unknown_molecule_is_an_error() {
        let ds = scenario();
        let err = build_molecule_summary(&ds, "NOPE").unwrap_err();
        assert!(matches!(err, Error::UnknownMolecule(ref m) if m == "NOPE"));
    }

    #[test]
    fn product_units_add_up_to_molecule_total() {
        let ds = scenario();
        for molecule in ds.molecules() {
            let rows = ds.molecule_records(&molecule);
            let products = build_product_summaries(&ds, &rows).unwrap();
            let total: f64 = products.iter().map(|p| p.latest_units).sum();
            assert!(approx(total, sum_by_year(&rows, Metric::Units, LATEST)));
        }
    }

    #[test]
    fn products_keep_first_seen_order_and_packs() {
        let mut ds = scenario();
        let mut extra = record("X", "P1", "C1", [0.0, 0.0, 20.0], [0.0; 3]);
        extra.pack = "P1 20mg".into();
        ds.records.push(extra);
        let rows = ds.molecule_records("X");
        let products = build_product_summaries(&ds, &rows).unwrap();
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].product, "P1");
        assert_eq!(products[0].latest_units, 140.0);
        assert!(approx(products[0].molecule_share, 140.0 / 220.0 * 100.0));
        let packs: Vec<&str> = products[0].packs.iter().map(|p| p.pack.as_str()).collect();
        assert_eq!(packs, ["P1 10mg", "P1 20mg"]);
        assert_eq!(products[0].scope, MoleculeScope::Mono);
    }

    #[test]
    fn product_sold_under_two_molecules_is_shared() {
        let mut ds = scenario();
        ds.records.push(record("Y", "P2", "C1", [1.0; 3], [1.0; 3]));
        let rows = ds.molecule_records("X");
        let products = build_product_summaries(&ds, &rows).unwrap();
        assert_eq!(products[0].scope, MoleculeScope::Mono);
        assert_eq!(products[1].scope, MoleculeScope::Shared);
    }

    #[test]
    fn zero_molecule_total_gives_zero_product_share() {
        let ds = Dataset::new(
            vec![record("X", "P1", "C1", [0.0; 3], [0.0; 3])],
            HashMap::new(),
            YearSpan::default(),
        );
        let rows = ds.molecule_records("X");
        let products = build_product_summaries(&ds, &rows).unwrap();
        assert_eq!(products[0].molecule_share, 0.0);
    }

    #[test]
    fn competitor_table_is_sorted_and_sums_to_100() {
        let ds = scenario();
        let table = build_class_competitor_table(&ds, "C1");
        let names: Vec<&str> = table.iter().map(|r| r.molecule.as_str()).collect();
        // Y and Z tie on 400 units; Y was grouped first.
        assert_eq!(names, ["Y", "Z", "X"]);
        assert!(table.windows(2).all(|w| w[0].latest_units >= w[1].latest_units));
        let units: f64 = table.iter().map(|r| r.units_pct).sum();
        let value: f64 = table.iter().map(|r| r.value_pct).sum();
        assert!(approx(units, 100.0));
        assert!(approx(value, 100.0));
        assert_eq!(table[2].competitors, Competitors::Count(4));
        assert_eq!(table[0].competitors, Competitors::Unknown);
    }

    #[test]
    fn competitor_table_with_zero_totals_is_all_zero() {
        let ds = Dataset::new(
            vec![
                record("A", "P1", "C9", [0.0; 3], [0.0; 3]),
                record("B", "P2", "C9", [0.0; 3], [0.0; 3]),
            ],
            HashMap::new(),
            YearSpan::default(),
        );
        let table = build_class_competitor_table(&ds, "C9");
        assert_eq!(table.len(), 2);
        assert!(table.iter().all(|r| r.units_pct == 0.0 && r.value_pct == 0.0));
    }

    #[test]
    fn competitor_table_for_molecule_resolves_its_class() {
        let ds = scenario();
        let (atc4, table) = molecule_competitor_table(&ds, "W").unwrap();
        assert_eq!(atc4, "C2");
        assert_eq!(table.len(), 1);
        assert!(approx(table[0].units_pct, 100.0));
    }

    #[test]
    fn competitor_table_for_unknown_molecule_fails() {
        let ds = scenario();
        let err = molecule_competitor_table(&ds, "NOPE").unwrap_err();
        assert!(matches!(err, Error::UnknownMolecule(ref m) if m == "NOPE"));
    }
}
