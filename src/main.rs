use anyhow::{Context, Result};
use clap::Parser;
use db_cleaner::config::Args;
use db_cleaner::db::Database;
use db_cleaner::resolution::ConsolePrompt;
use db_cleaner::{run_session, CleanerError, MergeStep};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    db_cleaner::logging::configure_logging();

    let args = Args::parse();
    let database_url = args.connection_url()?;

    let db = Database::new(&database_url)
        .await
        .context("Failed to connect to database")?;
    let mut store = db
        .begin_session()
        .await
        .context("Failed to start transaction")?;

    info!("Starting session with edit distance {}", args.distance);
    let mut prompt = ConsolePrompt::stdio();
    let result = run_session(&mut store, &mut prompt, args.distance).await;
    db.close().await;

    match result {
        Ok(report) => {
            println!("{}", report);
            if args.summary_json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            Ok(())
        }
        Err(err) => {
            if let CleanerError::Database {
                step: MergeStep::DeleteArtist,
                artist,
                survivor_id,
                ..
            } = &err
            {
                eprintln!(
                    "Tracks of \"{}\" had already been moved to id {} when the delete failed.",
                    artist, survivor_id
                );
            }
            if err.requires_rollback() {
                eprintln!("All changes of this session were rolled back.");
            }
            Err(err).context("Cleaning session failed")
        }
    }
}
