//! Stats command implementation

use anyhow::Result;

use crate::store::WarehouseStore;

pub fn run(store: &WarehouseStore) -> Result<()> {
    let counts = store.table_counts()?;

    println!("{:<12} {:>10}", "Table", "Rows");
    println!("{}", "-".repeat(23));
    println!("{:<12} {:>10}", "songs", counts.songs);
    println!("{:<12} {:>10}", "artists", counts.artists);
    println!("{:<12} {:>10}", "users", counts.users);
    println!("{:<12} {:>10}", "time", counts.time);
    println!("{:<12} {:>10}", "songplays", counts.songplays);

    if counts.songplays > 0 {
        let pct = counts.resolved_songplays as f64 * 100.0 / counts.songplays as f64;
        println!(
            "\n{} of {} songplays matched a catalog song ({:.1}%)",
            counts.resolved_songplays, counts.songplays, pct
        );
    }

    Ok(())
}
