use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::{Competitors, Dataset, ForecastEntry, SalesRecord, YearSpan, YEARS};
use crate::util::{clean_header, coerce_amount, coerce_signed, parse_f64_lenient, parse_year};
use csv::{ReaderBuilder, StringRecord};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub loaded_rows: usize,
    pub parse_errors: usize,
    /// Non-blank amount cells (unparseable or negative) that were set to 0.
    pub coerced_cells: usize,
}

/// Cleaned header names mapped to their column positions.
struct Columns {
    file: String,
    index: HashMap<String, usize>,
}

impl Columns {
    fn new(file: &str, headers: &StringRecord) -> Self {
        let mut index = HashMap::new();
        for (i, h) in headers.iter().enumerate() {
            // First occurrence wins for duplicated headers.
            index.entry(clean_header(h)).or_insert(i);
        }
        Self { file: file.to_string(), index }
    }

    fn require(&self, name: &str) -> Result<usize> {
        self.index.get(name).copied().ok_or_else(|| Error::MissingColumn {
            file: self.file.clone(),
            column: name.to_string(),
        })
    }
}

fn cell<'a>(row: &'a StringRecord, idx: usize) -> &'a str {
    row.get(idx).unwrap_or("").trim()
}

/// Coerce an amount cell, counting non-blank cells that end up as 0 without
/// reading as a non-negative number.
fn amount(row: &StringRecord, idx: usize, coerced: &mut usize) -> f64 {
    let raw = cell(row, idx);
    if !raw.is_empty() {
        match parse_f64_lenient(raw) {
            Some(v) if v >= 0.0 => {}
            _ => *coerced += 1,
        }
    }
    coerce_amount(raw)
}

struct SalesColumns {
    molecule: usize,
    product: usize,
    manufacturer: usize,
    pack: usize,
    combination_type: usize,
    atc: [usize; 4],
    launch_year: usize,
    retail_price: usize,
    units: [usize; YEARS],
    value: [usize; YEARS],
}

impl SalesColumns {
    fn resolve(cols: &Columns, years: YearSpan) -> Result<Self> {
        let mut units = [0; YEARS];
        let mut value = [0; YEARS];
        for (i, y) in years.all().iter().enumerate() {
            units[i] = cols.require(&format!("{y} Units"))?;
            value[i] = cols.require(&format!("{y} LC Value"))?;
        }
        Ok(Self {
            molecule: cols.require("Molecule")?,
            product: cols.require("Product")?,
            manufacturer: cols.require("Manufacturer")?,
            pack: cols.require("Pack")?,
            combination_type: cols.require("Molecule Combination Type")?,
            atc: [
                cols.require("ATC1")?,
                cols.require("ATC2")?,
                cols.require("ATC3")?,
                cols.require("ATC4")?,
            ],
            launch_year: cols.require("Launch Year")?,
            retail_price: cols.require("Retail Price")?,
            units,
            value,
        })
    }
}

/// Read and normalize the sales file.
pub fn load_sales(path: &Path, years: YearSpan) -> Result<(Vec<SalesRecord>, LoadReport)> {
    let rdr = ReaderBuilder::new().flexible(true).from_path(path)?;
    read_sales(rdr, &path.display().to_string(), years)
}

pub fn read_sales<R: Read>(
    mut rdr: csv::Reader<R>,
    file: &str,
    years: YearSpan,
) -> Result<(Vec<SalesRecord>, LoadReport)> {
    let cols = Columns::new(file, rdr.headers()?);
    let sc = SalesColumns::resolve(&cols, years)?;

    let mut report = LoadReport::default();
    let mut records = Vec::new();
    for result in rdr.records() {
        report.total_rows += 1;
        let row = match result {
            Ok(r) => r,
            Err(e) => {
                debug!("{file}: skipping malformed row {}: {e}", report.total_rows);
                report.parse_errors += 1;
                continue;
            }
        };

        let mut units = [0.0; YEARS];
        let mut value = [0.0; YEARS];
        for i in 0..YEARS {
            units[i] = amount(&row, sc.units[i], &mut report.coerced_cells);
            value[i] = amount(&row, sc.value[i], &mut report.coerced_cells);
        }

        records.push(SalesRecord {
            molecule: cell(&row, sc.molecule).to_string(),
            product: cell(&row, sc.product).to_string(),
            manufacturer: cell(&row, sc.manufacturer).to_string(),
            pack: cell(&row, sc.pack).to_string(),
            combination_type: cell(&row, sc.combination_type).to_string(),
            atc: sc.atc.map(|i| cell(&row, i).to_string()),
            launch_year: parse_year(cell(&row, sc.launch_year)),
            retail_price: amount(&row, sc.retail_price, &mut report.coerced_cells),
            units,
            value,
        });
    }
    report.loaded_rows = records.len();
    if report.coerced_cells > 0 {
        debug!("{file}: {} amount cells coerced to 0", report.coerced_cells);
    }
    Ok((records, report))
}

fn parse_competitors(raw: &str) -> Competitors {
    if raw.is_empty() {
        return Competitors::Unknown;
    }
    match parse_f64_lenient(raw) {
        Some(v) if v >= 0.0 && v.fract() == 0.0 && v <= u32::MAX as f64 => {
            Competitors::Count(v as u32)
        }
        _ => Competitors::Text(raw.to_string()),
    }
}

/// Read the forecast/mapping file keyed by molecule.
pub fn load_forecasts(path: &Path) -> Result<HashMap<String, ForecastEntry>> {
    let rdr = ReaderBuilder::new().flexible(true).from_path(path)?;
    read_forecasts(rdr, &path.display().to_string())
}

pub fn read_forecasts<R: Read>(
    mut rdr: csv::Reader<R>,
    file: &str,
) -> Result<HashMap<String, ForecastEntry>> {
    let cols = Columns::new(file, rdr.headers()?);
    let molecule = cols.require("Molecule")?;
    let cagr = cols.require("CAGR")?;
    let private = cols.require("Private")?;
    let comp = cols.require("Comp")?;

    let mut out = HashMap::new();
    for (row_no, result) in rdr.records().enumerate() {
        let row = match result {
            Ok(r) => r,
            Err(e) => {
                debug!("{file}: skipping malformed row {}: {e}", row_no + 1);
                continue;
            }
        };
        let key = cell(&row, molecule);
        if key.is_empty() {
            continue;
        }
        let entry = ForecastEntry {
            cagr: coerce_signed(cell(&row, cagr)),
            private_share: coerce_signed(cell(&row, private)),
            competitors: parse_competitors(cell(&row, comp)),
        };
        // Later rows override earlier ones for the same molecule.
        if out.insert(key.to_string(), entry).is_some() {
            debug!("{file}: duplicate forecast for {key}, keeping last");
        }
    }
    Ok(out)
}

/// Load both input files into a read-only [`Dataset`].
pub fn load_dataset(config: &Config) -> Result<(Dataset, LoadReport)> {
    let years = YearSpan::new(config.first_year);
    let (records, report) = load_sales(&config.sales, years)?;
    info!(
        "Loaded {} of {} sales rows from {}",
        report.loaded_rows,
        report.total_rows,
        config.sales.display()
    );
    if report.parse_errors > 0 {
        warn!("{} sales rows skipped as malformed", report.parse_errors);
    }
    let forecasts = load_forecasts(&config.forecast)?;
    info!("Loaded {} forecast entries from {}", forecasts.len(), config.forecast.display());
    Ok((Dataset::new(records, forecasts, years), report))
}
