//! Init command implementation

use anyhow::Result;

use crate::store::WarehouseStore;

pub fn run(store: &WarehouseStore, reset: bool) -> Result<()> {
    if reset {
        store.reset_schema()?;
        println!("Dropped and recreated all tables.");
    } else {
        // Opening the store already created any missing tables
        println!("Schema is up to date.");
    }
    Ok(())
}
