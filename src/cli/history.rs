//! History command implementation

use anyhow::Result;

use crate::store::WarehouseStore;

pub fn run(store: &WarehouseStore, limit: usize) -> Result<()> {
    let loads = store.recent_loads(limit)?;

    if loads.is_empty() {
        println!("No files loaded yet. Run 'playlog load' first.");
        return Ok(());
    }

    println!(
        "{:<20} {:<8} {:<7} {:>6}  {}",
        "Processed", "Kind", "Status", "Rows", "Path"
    );
    println!("{}", "-".repeat(100));

    for load in loads {
        println!(
            "{:<20} {:<8} {:<7} {:>6}  {}",
            load.processed_at, load.kind, load.status, load.rows_loaded, load.path
        );
        if let Some(error) = load.error {
            println!("{:>44}{}", "↳ ", error);
        }
    }

    Ok(())
}
