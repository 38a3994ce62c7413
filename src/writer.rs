use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
    sync::mpsc::Receiver,
};

use log::{info, warn};
use serde::Serialize;

use crate::errors::DashError;

/// Drains `receiver` into `file`, one JSON object per line, until every sender
/// is dropped. Returns the number of records written.
pub fn write_json_lines<T: Serialize>(
    file: &Path,
    receiver: Receiver<T>,
) -> Result<usize, DashError> {
    let output = File::create(file).map_err(|e| DashError::WriterError { source: e })?;
    let mut output_writer = BufWriter::new(output);
    let mut written = 0;
    for record in &receiver {
        let line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(e) => {
                warn!("Skipping record that cannot be serialized: {}", e);
                continue;
            }
        };
        writeln!(output_writer, "{}", line).map_err(|e| DashError::WriterError { source: e })?;
        written += 1;
    }
    output_writer
        .flush()
        .map_err(|e| DashError::WriterError { source: e })?;
    info!("Wrote {} records to {}", written, file.display());
    Ok(written)
}
