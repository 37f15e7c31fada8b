use crate::board::Board;
use crate::cli::open_store;
use crate::error::Result;
use crate::fmt::money;
use crate::settings::load_settings;
use crate::store::{Filter, Store};

pub fn run() -> Result<()> {
    let settings = load_settings();
    let db_path = settings.db_path();

    println!("Company:    {}", settings.company_name);
    println!("User:       {}", settings.session().author().unwrap_or("(not set)"));
    println!("Data dir:   {}", settings.data_dir);
    println!("Database:   {}", db_path.display());

    if !db_path.exists() {
        println!();
        println!("Database not found. Run `hydrops init` to set up.");
        return Ok(());
    }

    let store = open_store(&settings)?;
    let board = Board::load(&store)?;
    let jobs = store.select("jobs", &Filter::all(), &[])?.len();
    let imports = store.select("imports", &Filter::all(), &[])?.len();

    println!();
    for (status, column) in board.columns() {
        let value: f64 = column.iter().filter_map(|b| b.estimated_value).sum();
        println!("{:<11} {:>4}   {}", format!("{}:", status.label()), column.len(), money(value));
    }
    println!();
    println!("Jobs:        {jobs}");
    println!("Imports:     {imports}");
    Ok(())
}
