use std::path::Path;

use {clap::Subcommand, tracing::info};

use chatline_store::Store;

#[derive(Subcommand)]
pub enum DbAction {
    /// Run all pending database migrations.
    Migrate,
    /// Delete the database file completely.
    Reset,
}

pub async fn handle_db(action: DbAction, db_path: &str) -> anyhow::Result<()> {
    match action {
        DbAction::Migrate => migrate(db_path).await,
        DbAction::Reset => reset(db_path),
    }
}

async fn migrate(db_path: &str) -> anyhow::Result<()> {
    let store = Store::connect(db_path).await?;
    store.migrate().await?;
    info!(path = db_path, "migrations applied");
    println!("Database ready at {db_path}");
    Ok(())
}

fn reset(db_path: &str) -> anyhow::Result<()> {
    let mut deleted = false;

    // Also delete WAL and SHM files that SQLite may have created.
    for suffix in ["", "-wal", "-shm"] {
        let path = format!("{db_path}{suffix}");
        if Path::new(&path).exists() {
            std::fs::remove_file(&path)?;
            println!("Deleted: {path}");
            deleted = true;
        }
    }

    if deleted {
        println!("Database files deleted. Run `chatline db migrate` to recreate them.");
    } else {
        println!("No database files found.");
    }

    Ok(())
}
