use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use csv::WriterBuilder;

use loadsweep::wrk::{self, FIELD_NAMES};

pub fn run_parse(file: &Path) -> Result<()> {
    let output = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let metrics = wrk::parse(&output);
    let fields = metrics.fields();

    println!("LOADSWEEP PARSE: {}", file.display());
    println!();
    for (name, value) in FIELD_NAMES.iter().zip(&fields) {
        let value = if value.is_empty() { "(absent)" } else { value };
        println!("  {:<16}{}", name, value);
    }
    println!();

    if metrics.nothing_read() {
        println!("VERDICT:         FATAL (zero bytes read)");
    } else if let Some(field) = metrics.first_missing() {
        println!("VERDICT:         FAILED (missing {})", field);
    } else {
        println!("VERDICT:         OK");
    }
    println!();

    let mut wtr = WriterBuilder::new().has_headers(false).from_writer(io::stdout());
    wtr.write_record(FIELD_NAMES)?;
    wtr.write_record(&fields)?;
    wtr.flush()?;
    Ok(())
}
