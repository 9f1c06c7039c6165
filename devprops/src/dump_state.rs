use std::path::PathBuf;

use anyhow::{Context, Result};
use devprops_database_local::FileDatabase;

use crate::Options;

#[derive(clap::Parser, Debug)]
pub(crate) struct Args {
    /// Property database state file
    #[arg(long, default_value = "devprops-state.json")]
    state_file: PathBuf,
}

/// Replay the event log and print the resolved state document.
pub(crate) fn dump_state(_options: &Options, args: &Args) -> Result<()> {
    let db = FileDatabase::open(&args.state_file, false)
        .with_context(|| "opening the property database")?;
    println!("{}", serde_json::to_string_pretty(db.state())?);
    Ok(())
}
