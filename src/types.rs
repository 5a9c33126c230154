use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use tabled::Tabled;

/// Number of yearly unit/value columns carried per sales row.
pub const YEARS: usize = 3;

/// Index of the most recent year inside a per-year array.
pub const LATEST: usize = YEARS - 1;

/// The three consecutive years covered by the sales file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct YearSpan {
    pub first: i32,
}

impl YearSpan {
    pub fn new(first: i32) -> Self {
        Self { first }
    }

    pub fn year(&self, index: usize) -> i32 {
        self.first + index as i32
    }

    pub fn all(&self) -> [i32; YEARS] {
        [self.year(0), self.year(1), self.year(2)]
    }

    /// Two-digit labels, e.g. `22/23/24`.
    pub fn short_label(&self) -> String {
        self.all()
            .iter()
            .map(|y| format!("{:02}", y.rem_euclid(100)))
            .collect::<Vec<_>>()
            .join("/")
    }

    pub fn latest(&self) -> i32 {
        self.year(LATEST)
    }
}

impl Default for YearSpan {
    fn default() -> Self {
        Self::new(2022)
    }
}

/// One normalized row of the sales file.
#[derive(Debug, Clone, PartialEq)]
pub struct SalesRecord {
    pub molecule: String,
    pub product: String,
    pub manufacturer: String,
    pub pack: String,
    pub combination_type: String,
    /// ATC1 (coarsest) through ATC4 (finest).
    pub atc: [String; 4],
    pub launch_year: Option<i32>,
    pub retail_price: f64,
    pub units: [f64; YEARS],
    pub value: [f64; YEARS],
}

/// Categorical columns that can be resolved by mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Molecule,
    Product,
    Manufacturer,
    CombinationType,
    Atc(usize),
}

impl Field {
    pub fn name(&self) -> &'static str {
        match self {
            Field::Molecule => "Molecule",
            Field::Product => "Product",
            Field::Manufacturer => "Manufacturer",
            Field::CombinationType => "Molecule Combination Type",
            Field::Atc(0) => "ATC1",
            Field::Atc(1) => "ATC2",
            Field::Atc(2) => "ATC3",
            Field::Atc(_) => "ATC4",
        }
    }
}

/// Numeric per-year measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Units,
    Value,
}

impl SalesRecord {
    pub fn field(&self, field: Field) -> &str {
        match field {
            Field::Molecule => &self.molecule,
            Field::Product => &self.product,
            Field::Manufacturer => &self.manufacturer,
            Field::CombinationType => &self.combination_type,
            Field::Atc(level) => &self.atc[level.min(3)],
        }
    }

    pub fn metric(&self, metric: Metric, year_index: usize) -> f64 {
        match metric {
            Metric::Units => self.units[year_index],
            Metric::Value => self.value[year_index],
        }
    }

    pub fn atc4(&self) -> &str {
        &self.atc[3]
    }
}

/// Competitor count from the forecast file. The column mixes numbers and
/// placeholder text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Competitors {
    Count(u32),
    Text(String),
    #[default]
    Unknown,
}

impl Serialize for Competitors {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            Competitors::Count(n) => s.serialize_u32(*n),
            other => s.collect_str(other),
        }
    }
}

impl fmt::Display for Competitors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Competitors::Count(n) => write!(f, "{n}"),
            Competitors::Text(s) => write!(f, "{s}"),
            Competitors::Unknown => write!(f, "N/A"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ForecastEntry {
    /// Forecast CAGR in percent, any sign.
    pub cagr: f64,
    /// Private-sector share as a fraction.
    pub private_share: f64,
    pub competitors: Competitors,
}

/// The normalized, read-only input to every computation.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub records: Vec<SalesRecord>,
    pub forecasts: HashMap<String, ForecastEntry>,
    pub years: YearSpan,
}

impl Dataset {
    pub fn new(
        records: Vec<SalesRecord>,
        forecasts: HashMap<String, ForecastEntry>,
        years: YearSpan,
    ) -> Self {
        Self { records, forecasts, years }
    }

    pub fn molecule_records(&self, molecule: &str) -> Vec<&SalesRecord> {
        self.records.iter().filter(|r| r.molecule == molecule).collect()
    }

    pub fn class_records(&self, atc4: &str) -> Vec<&SalesRecord> {
        self.records.iter().filter(|r| r.atc4() == atc4).collect()
    }

    /// Sorted distinct molecule ids, blanks excluded.
    pub fn molecules(&self) -> Vec<String> {
        let set: BTreeSet<&str> = self
            .records
            .iter()
            .map(|r| r.molecule.as_str())
            .filter(|m| !m.is_empty())
            .collect();
        set.into_iter().map(str::to_string).collect()
    }

    pub fn forecast(&self, molecule: &str) -> ForecastEntry {
        self.forecasts.get(molecule).cloned().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoleculeSummary {
    pub molecule: String,
    pub atc: [String; 4],
    pub units: [f64; YEARS],
    pub value: [f64; YEARS],
    pub forecast: ForecastEntry,
    pub first_launch: Option<i32>,
    pub class_units: [f64; YEARS],
    pub class_value: [f64; YEARS],
    /// Molecule units as a percentage of its ATC4 class, per year.
    pub class_share: [f64; YEARS],
    pub units_growth: f64,
    pub value_growth: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MoleculeScope {
    Mono,
    Shared,
}

impl MoleculeScope {
    pub fn label(&self) -> &'static str {
        match self {
            MoleculeScope::Mono => "Mono-molecule Product",
            MoleculeScope::Shared => "Shared Product",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackLine {
    pub pack: String,
    pub retail_price: f64,
    pub latest_units: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductSummary {
    pub product: String,
    pub manufacturer: String,
    pub combination_type: String,
    pub latest_units: f64,
    /// Percentage of the molecule's latest-year units.
    pub molecule_share: f64,
    pub scope: MoleculeScope,
    pub packs: Vec<PackLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompetitorRow {
    pub molecule: String,
    pub latest_units: f64,
    pub latest_value: f64,
    pub units_pct: f64,
    pub value_pct: f64,
    pub competitors: Competitors,
}

/// Display form of [`CompetitorRow`] for console tables and CSV.
#[derive(Debug, Serialize, Tabled, Clone)]
pub struct CompetitorTableRow {
    #[serde(rename = "Molecule")]
    #[tabled(rename = "Molecule")]
    pub molecule: String,
    #[serde(rename = "Units")]
    #[tabled(rename = "Units")]
    pub units: String,
    #[serde(rename = "LC Value")]
    #[tabled(rename = "LC Value")]
    pub value: String,
    #[serde(rename = "% of ATC4 Units")]
    #[tabled(rename = "% of ATC4 Units")]
    pub units_pct: String,
    #[serde(rename = "% of ATC4 Value")]
    #[tabled(rename = "% of ATC4 Value")]
    pub value_pct: String,
    #[serde(rename = "Competitors")]
    #[tabled(rename = "Competitors")]
    pub competitors: String,
}
