use clap::Parser;
use std::path::PathBuf;

/// Molecule market analytics over sales and forecast CSV exports.
#[derive(Debug, Clone, Parser)]
#[command(name = "pharma_report", version)]
pub struct Config {
    /// Sales data CSV (one row per pack and manufacturer).
    #[arg(long, default_value = "GoldMine Second Try.csv")]
    pub sales: PathBuf,

    /// Forecast CSV keyed by Molecule with CAGR, Private and Comp columns.
    #[arg(long, default_value = "HGDR_with_forecast2.csv")]
    pub forecast: PathBuf,

    /// JSON file holding the persisted shortlist.
    #[arg(long, default_value = "shortlist.txt")]
    pub shortlist: PathBuf,

    /// Markdown file the portfolio report is written to.
    #[arg(long, default_value = "Molecule_Portfolio_Report.md")]
    pub export: PathBuf,

    /// Directory for competitor CSVs and the JSON portfolio dump.
    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,

    /// First of the three consecutive years in the sales columns.
    #[arg(long, default_value_t = 2022)]
    pub first_year: i32,

    /// Currency suffix for monetary figures.
    #[arg(long, default_value = "AED")]
    pub currency: String,
}
