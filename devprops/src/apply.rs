use std::path::PathBuf;

use anyhow::{Context, Result};
use devprops::driver::PatchDriver;
use devprops_core::config::DeviceProperties;
use devprops_database_local::FileDatabase;

use crate::Options;

#[derive(clap::Parser, Debug)]
pub(crate) struct Args {
    /// Device property configuration file (JSON)
    #[arg(long, default_value = "devprops.json")]
    config: PathBuf,

    /// Property database state file; created on first use
    #[arg(long, default_value = "devprops-state.json")]
    state_file: PathBuf,
}

/// Run the `apply` command.
pub(crate) fn apply(options: &Options, args: &Args) -> Result<()> {
    let file = std::fs::File::open(&args.config)
        .with_context(|| format!("opening configuration file {}", args.config.display()))?;
    let config: DeviceProperties = serde_json::from_reader(std::io::BufReader::new(file))
        .with_context(|| format!("parsing configuration file {}", args.config.display()))?;

    if config.block.is_empty() && config.add.is_empty() {
        eprintln!("Configuration contains no device property entries; nothing to apply.");
        return Ok(());
    }
    if options.verbose {
        eprintln!("The following device entries will be processed:");
        for entry in &config.block {
            eprintln!("  - block {}", entry.device);
        }
        for entry in &config.add {
            eprintln!("  - add {}", entry.device);
        }
    }

    // The database must be reachable before any mutation is attempted; an
    // unopenable state file aborts the whole run here.
    let mut db = FileDatabase::open(&args.state_file, true)
        .with_context(|| "opening the property database")?;

    let summary = PatchDriver::new(&mut db).run(&config);

    eprintln!(
        "Removed {} properties ({} already absent); set {} ({} existing values preserved).",
        summary.removed, summary.already_absent, summary.set, summary.preserved
    );
    if summary.skipped_entries > 0 || summary.skipped_properties > 0 {
        eprintln!(
            "Skipped {} device entries and {} properties with unusable text.",
            summary.skipped_entries, summary.skipped_properties
        );
    }
    if summary.warnings > 0 {
        eprintln!(
            "{} database operations failed; see the log above.",
            summary.warnings
        );
    }
    Ok(())
}
