use crate::error::Result;
use std::path::Path;

/// Write a finished report to `outfile`, or print it when no file was given.
pub fn emit(outfile: Option<&Path>, report: &str) -> Result<()> {
    match outfile {
        Some(path) => std::fs::write(path, report)?,
        None => print!("{report}"),
    }
    Ok(())
}
