use crate::reports::{
    latest_share_line, pack_lines, product_line, summary_lines, MoleculeReport, PortfolioReport,
};
use crate::types::{CompetitorRow, CompetitorTableRow, YearSpan};
use crate::util::{format_number, format_whole};
use serde::Serialize;
use std::error::Error;
use std::fmt::Write as _;
use std::path::Path;
use tabled::{settings::Style, Table, Tabled};

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), Box<dyn Error>> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), Box<dyn Error>> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

pub fn preview_table<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}

pub fn competitor_table_rows(rows: &[CompetitorRow]) -> Vec<CompetitorTableRow> {
    rows.iter()
        .map(|r| CompetitorTableRow {
            molecule: r.molecule.clone(),
            units: format_whole(r.latest_units),
            value: format_whole(r.latest_value),
            units_pct: format_number(r.units_pct, 2),
            value_pct: format_number(r.value_pct, 2),
            competitors: r.competitors.to_string(),
        })
        .collect()
}

/// Console rendering of one molecule with its product and pack breakdown.
pub fn render_molecule(report: &MoleculeReport, years: YearSpan, currency: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "### Molecule: {}", report.summary.molecule);
    for (i, line) in summary_lines(&report.summary, years, currency).iter().enumerate() {
        // Latest-year share goes right before the three-year share line.
        if i == 7 {
            let _ = writeln!(out, "  {}", latest_share_line(&report.summary));
        }
        let _ = writeln!(out, "  {line}");
    }
    for p in &report.products {
        let _ = writeln!(out, "\n  {}", product_line(p));
        let _ = writeln!(out, "  {}", p.scope.label());
        for pack in pack_lines(p, currency) {
            let _ = writeln!(out, "   • {pack}");
        }
    }
    out
}

/// Markdown document for the portfolio: one section per molecule.
pub fn render_portfolio_markdown(portfolio: &PortfolioReport, currency: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Molecule Portfolio Report\n");
    let _ = writeln!(out, "_Generated {}_\n", portfolio.generated_at.format("%Y-%m-%d %H:%M"));
    for report in &portfolio.molecules {
        let _ = writeln!(out, "## {}\n", report.summary.molecule);
        for line in summary_lines(&report.summary, portfolio.years, currency) {
            let _ = writeln!(out, "{line}  ");
        }
        for p in &report.products {
            let _ = writeln!(out, "\n**{}**  ", product_line(p));
            let _ = writeln!(out, "{}  ", p.scope.label());
            for pack in pack_lines(p, currency) {
                let _ = writeln!(out, " • {pack}  ");
            }
        }
        out.push('\n');
    }
    if !portfolio.skipped.is_empty() {
        let _ = writeln!(out, "_Not in current data: {}_", portfolio.skipped.join(", "));
    }
    out
}

pub fn write_portfolio(
    path: &Path,
    portfolio: &PortfolioReport,
    currency: &str,
) -> Result<(), Box<dyn Error>> {
    std::fs::write(path, render_portfolio_markdown(portfolio, currency))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::build_class_competitor_table;
    use crate::metrics::tests::scenario;
    use crate::reports::{build_portfolio_report, build_report_for_molecule};

    #[test]
    fn molecule_rendering_includes_products_and_packs() {
        let ds = scenario();
        let report = build_report_for_molecule(&ds, "X").unwrap();
        let text = render_molecule(&report, ds.years, "AED");
        assert!(text.starts_with("### Molecule: X\n"));
        assert!(text.contains("Mono-molecule Product"));
        assert!(text.contains("• P2 10mg — 12.50 AED — 80 units"));
        let latest = text.find("ATC4 Unit Share: 20.00%").unwrap();
        let three_year = text.find("ATC4 Share 22/23/24").unwrap();
        assert!(latest < three_year);
    }

    #[test]
    fn portfolio_markdown_has_a_section_per_molecule() {
        let ds = scenario();
        let shortlist = vec!["X".to_string(), "Y".to_string(), "GONE".to_string()];
        let portfolio = build_portfolio_report(&ds, &shortlist).unwrap();
        let md = render_portfolio_markdown(&portfolio, "AED");
        assert!(md.starts_with("# Molecule Portfolio Report"));
        let x = md.find("## X").unwrap();
        let y = md.find("## Y").unwrap();
        assert!(x < y);
        assert!(!md.contains("## GONE"));
        assert!(md.contains("Not in current data: GONE"));
    }

    #[test]
    fn portfolio_markdown_labels_shared_products() {
        let mut ds = scenario();
        ds.records.push(crate::metrics::tests::record("Y", "P2", "C1", [1.0; 3], [1.0; 3]));
        let portfolio = build_portfolio_report(&ds, &["X".to_string()]).unwrap();
        let md = render_portfolio_markdown(&portfolio, "AED");
        let p1 = md.find("**P1 — ").unwrap();
        let mono = md.find("Mono-molecule Product").unwrap();
        let p2 = md.find("**P2 — ").unwrap();
        let shared = md.find("Shared Product").unwrap();
        assert!(p1 < mono && mono < p2 && p2 < shared);
    }

    #[test]
    fn competitor_csv_is_written() {
        let ds = scenario();
        let rows = competitor_table_rows(&build_class_competitor_table(&ds, "C1"));
        assert_eq!(rows[0].units_pct, "40.00");
        assert_eq!(rows[0].competitors, "N/A");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("competitors.csv");
        write_csv(&path, &rows).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Molecule,Units,LC Value,% of ATC4 Units,% of ATC4 Value,Competitors"));
        assert_eq!(text.lines().count(), 4);
    }
}
