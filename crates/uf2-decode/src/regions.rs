use std::{
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use log::{LevelFilter, info, warn};
use uf2_decode_core::{
    DecodeOptions, LoadReport, Uf2LoadError, families, load, memory::MemoryMap,
    validate::Validation,
};

use crate::{inspect::open_source, reporter::ProgressBarReporter};

pub fn regions<P: AsRef<Path>>(
    input_path: P,
    options: &DecodeOptions,
    join: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let source = open_source(input_path)?;

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || cancel.store(true, Ordering::SeqCst))?;
    }

    let mut memory = if join {
        MemoryMap::joining_adjacent()
    } else {
        MemoryMap::new()
    };

    let should_print_progress = log::max_level() >= LevelFilter::Info;
    let mut reporter = ProgressBarReporter::new(should_print_progress, cancel);

    // Regions loaded before a conflict are kept, so print the map either way.
    let result = load(&source, options, &mut memory, &mut reporter);

    // New line after progress bar
    println!();

    let report: Option<&LoadReport> = match &result {
        Ok(report) => Some(report),
        Err(Uf2LoadError::MemoryConflict { report, .. }) => Some(&**report),
        Err(_) => None,
    };

    if let Some(report) = report {
        if let Some(family) = family_line(options, &report.validation) {
            info!("{}", family);
        }
        if !report.skipped.is_empty() {
            warn!("Skipped {} blocks", report.skipped.len());
        }
        if report.cancelled {
            warn!("Cancelled, the map below is incomplete");
        }
    }

    for region in memory.regions() {
        println!(
            "{:#010x}..{:#010x} {:>10} bytes",
            region.start(),
            region.end(),
            region.len()
        );
    }
    println!("{} regions, {} bytes", memory.len(), memory.total_bytes());

    result?;
    Ok(())
}

/// The family the printed map belongs to. A `--family` filter wins over the
/// first block's family, which the filter may have dropped.
fn family_line(options: &DecodeOptions, validation: &Validation) -> Option<String> {
    match options.family_id {
        Some(id) => Some(match families::lookup(id) {
            Some(family) => format!("Family {}", family),
            None => format!("Family {:#010x}", id),
        }),
        None => validation.family.map(|family| format!("Family {}", family)),
    }
}
