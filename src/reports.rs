use crate::error::{Error, Result};
use crate::metrics::{build_molecule_summary, build_product_summaries};
use crate::types::{Dataset, MoleculeSummary, ProductSummary, YearSpan, LATEST};
use crate::util::{format_number, format_whole, join_years};
use chrono::{DateTime, Local};
use log::warn;
use serde::Serialize;

/// Everything shown for a single molecule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoleculeReport {
    pub summary: MoleculeSummary,
    pub products: Vec<ProductSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PortfolioReport {
    pub generated_at: DateTime<Local>,
    pub years: YearSpan,
    pub molecules: Vec<MoleculeReport>,
    /// Shortlisted ids with no rows in the current dataset.
    pub skipped: Vec<String>,
}

pub fn build_report_for_molecule(dataset: &Dataset, molecule: &str) -> Result<MoleculeReport> {
    let summary = build_molecule_summary(dataset, molecule)?;
    let records = dataset.molecule_records(molecule);
    let products = build_product_summaries(dataset, &records)?;
    Ok(MoleculeReport { summary, products })
}

/// One report per shortlisted molecule, in shortlist order.
pub fn build_portfolio_report(dataset: &Dataset, shortlist: &[String]) -> Result<PortfolioReport> {
    let mut molecules = Vec::with_capacity(shortlist.len());
    let mut skipped = Vec::new();
    for id in shortlist {
        match build_report_for_molecule(dataset, id) {
            Ok(report) => molecules.push(report),
            Err(Error::UnknownMolecule(m)) => {
                warn!("Shortlisted molecule {m} has no sales rows; skipping");
                skipped.push(m);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(PortfolioReport { generated_at: Local::now(), years: dataset.years, molecules, skipped })
}

/// Header fields of a molecule report in display order.
pub fn summary_lines(summary: &MoleculeSummary, years: YearSpan, currency: &str) -> Vec<String> {
    let yy = years.short_label();
    let latest = years.latest();
    let s = summary;
    let f = &s.forecast;
    let pct = |v: f64| format!("{}%", format_number(v, 2));
    vec![
        format!("Class: {}", s.atc.join(" / ")),
        format!("Units {yy}: {}", join_years(&s.units, format_whole)),
        format!("CAGR: {:.0}%", f.cagr),
        format!("Value {latest}: {} {currency}", format_whole(s.value[LATEST])),
        format!("Private Share: {:.1}%", f.private_share * 100.0),
        format!("Competitors: {}", f.competitors),
        format!(
            "First Launch: {}",
            s.first_launch.map_or_else(|| "N/A".to_string(), |y| y.to_string())
        ),
        format!("ATC4 Share {yy}: {}", join_years(&s.class_share, pct)),
        format!("Value {yy}: {} {currency}", join_years(&s.value, format_whole)),
        format!("ATC4 Units {yy}: {}", join_years(&s.class_units, format_whole)),
        format!("ATC4 Values {yy}: {} {currency}", join_years(&s.class_value, format_whole)),
        format!("Units CAGR ({}→{}): {}", yy_first(years), yy_last(years), pct(s.units_growth)),
        format!("Value CAGR ({}→{}): {}", yy_first(years), yy_last(years), pct(s.value_growth)),
    ]
}

/// Latest-year class share on its own, shown ahead of the three-year line in
/// the interactive view.
pub fn latest_share_line(summary: &MoleculeSummary) -> String {
    format!("ATC4 Unit Share: {}%", format_number(summary.class_share[LATEST], 2))
}

fn yy_first(years: YearSpan) -> String {
    format!("{:02}", years.year(0).rem_euclid(100))
}

fn yy_last(years: YearSpan) -> String {
    format!("{:02}", years.latest().rem_euclid(100))
}

/// Product heading line: name, manufacturer, combination type and share.
pub fn product_line(p: &ProductSummary) -> String {
    format!(
        "{} — {} — {} — {}% of molecule",
        p.product,
        p.manufacturer,
        p.combination_type,
        format_number(p.molecule_share, 2)
    )
}

pub fn pack_lines(p: &ProductSummary, currency: &str) -> Vec<String> {
    p.packs
        .iter()
        .map(|pack| {
            format!(
                "{} — {} {currency} — {} units",
                pack.pack,
                format_number(pack.retail_price, 2),
                format_whole(pack.latest_units)
            )
        })
        .collect()
}
