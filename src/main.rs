// Entry point and interactive menu.
//
// - Option [1] loads both CSV files and the persisted shortlist.
// - Options [2] and [3] show the molecule overview and its ATC4 competitors.
// - Options [4] to [7] manage the shortlist and export the portfolio report.
mod config;
mod error;
mod loader;
mod metrics;
mod output;
mod reports;
mod shortlist;
mod types;
mod util;

use clap::Parser;
use config::Config;
use log::{error, info};
use once_cell::sync::{Lazy, OnceCell};
use shortlist::{FileStorage, ShortlistStore};
use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard};
use types::Dataset;

static CONFIG: OnceCell<Config> = OnceCell::new();

// The dataset is loaded once and then only read; the shortlist is the one
// mutable piece, and every mutation happens while holding this lock.
static APP_STATE: Lazy<Mutex<AppState>> = Lazy::new(|| {
    Mutex::new(AppState { data: None, shortlist: None, selected: None })
});

struct AppState {
    data: Option<Dataset>,
    shortlist: Option<ShortlistStore<FileStorage>>,
    selected: Option<String>,
}

fn config() -> &'static Config {
    CONFIG.get_or_init(Config::parse)
}

fn state() -> MutexGuard<'static, AppState> {
    APP_STATE.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn prompt(label: &str) -> String {
    print!("{label}: ");
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

fn read_choice() -> String {
    prompt("Enter choice")
}

/// Resolve user input to a molecule id: exact, then case-insensitive. On a
/// miss, print up to ten ids containing the input.
fn pick_molecule(data: &Dataset, input: &str) -> Option<String> {
    let molecules = data.molecules();
    if let Some(m) = molecules.iter().find(|m| m.as_str() == input) {
        return Some(m.clone());
    }
    if let Some(m) = molecules.iter().find(|m| m.eq_ignore_ascii_case(input)) {
        return Some(m.clone());
    }
    let needle = input.to_lowercase();
    let close: Vec<&String> = molecules
        .iter()
        .filter(|m| m.to_lowercase().contains(&needle))
        .take(10)
        .collect();
    if close.is_empty() {
        println!("No molecule matches '{input}'.\n");
    } else {
        println!("No exact match. Did you mean:");
        for m in close {
            println!("  - {m}");
        }
        println!();
    }
    None
}

/// Ask for a molecule, defaulting to the current selection on empty input.
fn ask_molecule(state: &AppState, data: &Dataset) -> Option<String> {
    let label = match &state.selected {
        Some(m) => format!("Molecule [{m}]"),
        None => "Molecule".to_string(),
    };
    let input = prompt(&label);
    if input.is_empty() {
        return state.selected.clone();
    }
    pick_molecule(data, &input)
}

/// Handle option [1]: load both CSV files and the persisted shortlist.
fn handle_load() {
    let cfg = config();
    match loader::load_dataset(cfg) {
        Ok((data, report)) => {
            println!(
                "Processing dataset... ({} rows loaded, {} molecules, {} forecasts)",
                util::format_int(report.loaded_rows),
                util::format_int(data.molecules().len()),
                util::format_int(data.forecasts.len())
            );
            if report.parse_errors > 0 {
                println!(
                    "Note: {} rows skipped due to parse errors.",
                    util::format_int(report.parse_errors)
                );
            }
            if report.coerced_cells > 0 {
                println!(
                    "Info: {} non-numeric or negative amounts treated as 0.",
                    util::format_int(report.coerced_cells)
                );
            }
            let mut st = state();
            st.selected = data.molecules().into_iter().next();
            st.data = Some(data);
        }
        Err(e) => {
            error!("Load failed: {e}");
            eprintln!("Failed to load data: {}\n", e);
            return;
        }
    }

    match ShortlistStore::load(FileStorage::new(&cfg.shortlist)) {
        Ok(store) => {
            println!("Shortlist: {} molecules.\n", store.len());
            state().shortlist = Some(store);
        }
        Err(e) => eprintln!("Failed to load shortlist: {}\n", e),
    }
}

/// Handle option [2]: summary, products and packs for one molecule.
fn handle_overview() {
    let mut st = state();
    let Some(data) = st.data.take() else {
        println!("Error: No data loaded. Please load the files first (option 1).\n");
        return;
    };
    if let Some(molecule) = ask_molecule(&st, &data) {
        match reports::build_report_for_molecule(&data, &molecule) {
            Ok(report) => {
                println!();
                println!("{}", output::render_molecule(&report, data.years, &config().currency));
                st.selected = Some(molecule);
            }
            Err(e) => eprintln!("Error: {}\n", e),
        }
    }
    st.data = Some(data);
}

/// Handle option [3]: ATC4 competitor map for one molecule.
fn handle_competition() {
    let mut st = state();
    let Some(data) = st.data.take() else {
        println!("Error: No data loaded. Please load the files first (option 1).\n");
        return;
    };
    if let Some(molecule) = ask_molecule(&st, &data) {
        match metrics::molecule_competitor_table(&data, &molecule) {
            Ok((atc4, table)) => {
                let rows = output::competitor_table_rows(&table);
                println!("\nATC4 Competitor Map: {} ({})\n", atc4, data.years.latest());
                output::preview_table(&rows, rows.len());
                let file = config().out_dir.join(format!("atc4_{}.csv", file_stem(&atc4)));
                match output::write_csv(&file, &rows) {
                    Ok(()) => println!("(Table exported to {})\n", file.display()),
                    Err(e) => eprintln!("Write error: {}", e),
                }
                st.selected = Some(molecule);
            }
            Err(e) => eprintln!("Error: {}\n", e),
        }
    }
    st.data = Some(data);
}

fn file_stem(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Handle option [4]: add a molecule to the shortlist.
fn handle_add() {
    let mut st = state();
    let Some(data) = st.data.take() else {
        println!("Error: No data loaded. Please load the files first (option 1).\n");
        return;
    };
    if let Some(molecule) = ask_molecule(&st, &data) {
        if let Some(store) = st.shortlist.as_mut() {
            match store.add(&molecule) {
                Ok(true) => {
                    info!("Added {molecule} to shortlist");
                    println!("Added {} to shortlist.\n", molecule);
                }
                Ok(false) => println!("{} is already on the shortlist.\n", molecule),
                Err(e) => eprintln!("Error: {}\n", e),
            }
        } else {
            println!("Error: Shortlist unavailable.\n");
        }
    }
    st.data = Some(data);
}

/// Handle option [5]: clear the shortlist.
fn handle_clear() {
    let mut st = state();
    match st.shortlist.as_mut() {
        Some(store) => match store.clear() {
            Ok(()) => println!("Shortlist cleared.\n"),
            Err(e) => eprintln!("Error: {}\n", e),
        },
        None => println!("Error: Shortlist unavailable. Load data first (option 1).\n"),
    }
}

/// Handle option [6]: print the shortlist.
fn handle_view() {
    let st = state();
    match &st.shortlist {
        Some(store) if !store.is_empty() => {
            println!("Current Shortlist:");
            for (i, m) in store.ids().iter().enumerate() {
                println!("  {}. {}", i + 1, m);
            }
            println!();
        }
        Some(_) => println!("Shortlist is empty.\n"),
        None => println!("Error: Shortlist unavailable. Load data first (option 1).\n"),
    }
}

const NO_DATA: &str = "No data loaded. Please load the files first (option 1).";
const NO_SHORTLIST: &str = "Shortlist unavailable. Reload data (option 1) to retry.";

/// Dataset and shortlist needed for an export, or why they are missing.
fn export_inputs(st: &AppState) -> Result<(&Dataset, &ShortlistStore<FileStorage>), &'static str> {
    match (&st.data, &st.shortlist) {
        (None, _) => Err(NO_DATA),
        (Some(_), None) => Err(NO_SHORTLIST),
        (Some(data), Some(store)) => Ok((data, store)),
    }
}

/// Handle option [7]: build the portfolio report and write it out.
fn handle_export() {
    let st = state();
    let (data, store) = match export_inputs(&st) {
        Ok(inputs) => inputs,
        Err(msg) => {
            println!("Error: {msg}\n");
            return;
        }
    };
    let cfg = config();
    let portfolio = match reports::build_portfolio_report(data, store.ids()) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {}\n", e);
            return;
        }
    };
    if let Err(e) = output::write_portfolio(&cfg.export, &portfolio, &cfg.currency) {
        eprintln!("Write error: {}", e);
        return;
    }
    let json = cfg.out_dir.join("portfolio.json");
    if let Err(e) = output::write_json(&json, &portfolio) {
        eprintln!("Write error: {}", e);
    }
    println!(
        "Exported {} molecules to {}",
        portfolio.molecules.len(),
        cfg.export.display()
    );
    if !portfolio.skipped.is_empty() {
        println!("Skipped (not in data): {}", portfolio.skipped.join(", "));
    }
    println!();
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    config();

    loop {
        println!("Pharma Analytics:");
        println!("[1] Load data");
        println!("[2] Molecule overview");
        println!("[3] ATC4 competition");
        println!("[4] Add to shortlist");
        println!("[5] Clear shortlist");
        println!("[6] View shortlist");
        println!("[7] Export portfolio report");
        println!("[0] Exit\n");
        match read_choice().as_str() {
            "1" => handle_load(),
            "2" => handle_overview(),
            "3" => handle_competition(),
            "4" => handle_add(),
            "5" => handle_clear(),
            "6" => handle_view(),
            "7" => handle_export(),
            "0" => {
                println!("Exiting the program.");
                break;
            }
            _ => println!("Invalid choice. Please enter 0-7.\n"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_needs_data_then_shortlist() {
        let dir = tempfile::tempdir().unwrap();
        let mut st = AppState { data: None, shortlist: None, selected: None };
        assert_eq!(export_inputs(&st).err(), Some(NO_DATA));

        st.data = Some(Dataset::default());
        assert_eq!(export_inputs(&st).err(), Some(NO_SHORTLIST));

        let store = ShortlistStore::load(FileStorage::new(dir.path().join("shortlist.txt"))).unwrap();
        st.shortlist = Some(store);
        assert!(export_inputs(&st).is_ok());
    }
}
