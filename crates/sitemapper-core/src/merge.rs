//! Incremental sitemap update.
//!
//! Decodes the currently published sitemap, upserts one record by location and
//! re-encodes the result into a fresh temp file. Decoding happens before anything
//! is written, so a corrupt existing file never produces output.

use crate::xml::{read_sitemap, sitemap_temp_file, write_document};
use crate::{Error, Result, UrlRecord};
use std::io::{BufReader, BufWriter, Read};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, instrument};

/// Merge `record` into the sitemap read from `existing`.
///
/// An empty reader counts as an empty sitemap. A record whose location is already
/// present replaces that entry in place; otherwise it is appended.
///
/// The returned temp file is deleted on drop unless the caller persists it.
#[instrument(skip(existing, record), fields(loc = %record.loc))]
pub fn merge<R: Read>(existing: R, record: UrlRecord, temp_dir: Option<&Path>) -> Result<NamedTempFile> {
    let mut document = read_sitemap(BufReader::new(existing))?;

    let replaced = document.upsert(record);
    debug!(replaced, records = document.len(), "Merged record");

    let file = sitemap_temp_file(temp_dir)?;
    let writer = write_document(BufWriter::new(file.as_file()), &document)?;
    writer
        .into_inner()
        .map_err(|e| Error::Io(e.into_error()))?
        .sync_all()?;

    Ok(file)
}
