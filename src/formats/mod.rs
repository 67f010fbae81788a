//! Raw archive readers.
//!
//! Each line-list format implements [`RawFormat`], turning one source file
//! into a [`LineTable`] of raw columns in file order. Companion files
//! (ExoMol `.def`, `.states`, `.pf`, `.broad`) have their own typed readers
//! in [`exomol`].
//!
//! Sources may be plain text, gzip (`.gz`) or bzip2 (`.bz2`); the ExoMol and
//! HITEMP servers publish the large files as `.bz2`.

pub mod exomol;
pub mod hitran;
pub mod kurucz;
pub mod vald;

use std::ffi::OsString;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use bzip2::read::MultiBzDecoder;
use flate2::read::MultiGzDecoder;
use log::{debug, info};

use crate::data::table::LineTable;
use crate::error::{LineDbError, Result};

/// One line-list format adapter.
pub trait RawFormat {
    /// Short identifier stored in caches and error messages.
    fn format_name(&self) -> &'static str;

    /// Parse every record of `reader`. `path` is only used for diagnostics.
    fn parse(&self, reader: &mut dyn BufRead, path: &Path) -> Result<LineTable>;

    /// Open `path` (plain, gzip or bzip2) and parse it.
    fn parse_file(&self, path: &Path) -> Result<LineTable> {
        let mut reader = open_source(path)?;
        let table = self.parse(&mut reader, path)?;
        debug!(
            "parsed {} {} records from {}",
            table.len(),
            self.format_name(),
            path.display()
        );
        Ok(table)
    }
}

// ---------------------------------------------------------------------------
// Opening sources
// ---------------------------------------------------------------------------

/// Compression recognised from a file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Gzip,
    Bzip2,
}

impl Compression {
    /// Lookup order for siblings of an uncompressed path.
    const ALL: [Compression; 2] = [Compression::Gzip, Compression::Bzip2];

    pub fn extension(self) -> &'static str {
        match self {
            Compression::Gzip => "gz",
            Compression::Bzip2 => "bz2",
        }
    }

    pub fn of(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        Self::ALL
            .into_iter()
            .find(|c| ext.eq_ignore_ascii_case(c.extension()))
    }
}

/// Buffered reader over a plain, gzip or bzip2 file. Multi-member streams
/// are read to the end.
pub fn open_source(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path).map_err(|e| LineDbError::io(path, e))?;
    Ok(match Compression::of(path) {
        Some(Compression::Gzip) => Box::new(BufReader::new(MultiGzDecoder::new(file))),
        Some(Compression::Bzip2) => Box::new(BufReader::new(MultiBzDecoder::new(file))),
        None => Box::new(BufReader::new(file)),
    })
}

/// The path with any compression suffix removed.
pub fn logical_path(path: &Path) -> PathBuf {
    match Compression::of(path) {
        Some(_) => path.with_extension(""),
        None => path.to_path_buf(),
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// First existing file among `stem`, `stem.gz` and `stem.bz2`.
pub fn find_source(stem: &Path) -> Option<PathBuf> {
    if stem.is_file() {
        return Some(stem.to_path_buf());
    }
    Compression::ALL
        .into_iter()
        .map(|c| with_suffix(stem, &format!(".{}", c.extension())))
        .find(|p| p.is_file())
}

// ---------------------------------------------------------------------------
// Intermediate decompressed artifacts
// ---------------------------------------------------------------------------

/// A source ready to be read as plain text.
#[derive(Debug, Clone)]
pub struct Materialized {
    pub path: PathBuf,
    /// True when `path` was written by [`materialize`] and may be deleted.
    pub intermediate: bool,
}

/// Decompress a `.gz` or `.bz2` source next to itself. Plain sources, or
/// sources whose decompressed sibling already exists, are returned unchanged.
///
/// The sibling only appears once fully written: output goes to
/// `<sibling>.partial` and is renamed into place after a flush, so an
/// interrupted run never leaves a truncated file under the final name.
pub fn materialize(source: &Path) -> Result<Materialized> {
    if Compression::of(source).is_none() {
        return Ok(Materialized {
            path: source.to_path_buf(),
            intermediate: false,
        });
    }
    let target = logical_path(source);
    if target.is_file() {
        return Ok(Materialized {
            path: target,
            intermediate: false,
        });
    }

    info!("Decompressing {}", source.display());
    let partial = with_suffix(&target, ".partial");
    let mut reader = open_source(source)?;
    let out = File::create(&partial).map_err(|e| LineDbError::io(&partial, e))?;
    let mut writer = BufWriter::new(out);
    let written = std::io::copy(&mut reader, &mut writer)
        .and_then(|_| writer.flush())
        .map_err(|e| LineDbError::io(&partial, e));
    drop(writer);
    if let Err(e) = written {
        let _ = std::fs::remove_file(&partial);
        return Err(e);
    }
    std::fs::rename(&partial, &target).map_err(|e| LineDbError::io(&target, e))?;
    Ok(Materialized {
        path: target,
        intermediate: true,
    })
}

impl Materialized {
    /// Delete the decompressed copy if this call created it.
    pub fn cleanup(&self) -> Result<()> {
        if self.intermediate && self.path.is_file() {
            std::fs::remove_file(&self.path).map_err(|e| LineDbError::io(&self.path, e))?;
            debug!("removed intermediate {}", self.path.display());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Field helpers shared by the parsers
// ---------------------------------------------------------------------------

/// Parse a numeric token, reporting format, file and line on failure.
pub(crate) fn parse_f64(
    token: &str,
    what: &str,
    format: &'static str,
    path: &Path,
    line: usize,
) -> Result<f64> {
    let t = token.trim();
    t.parse::<f64>()
        .or_else(|_| t.replace(['D', 'd'], "E").parse::<f64>())
        .map_err(|_| LineDbError::parse(format, path, line, format!("bad {what} '{t}'")))
}

/// Fixed-width slice `[start, end)`; errors when the record is too short.
pub(crate) fn field<'a>(
    record: &'a str,
    start: usize,
    end: usize,
    format: &'static str,
    path: &Path,
    line: usize,
) -> Result<&'a str> {
    record.get(start..end).ok_or_else(|| {
        LineDbError::parse(
            format,
            path,
            line,
            format!(
                "record has {} characters, expected at least {end}",
                record.len()
            ),
        )
    })
}

/// Refractive index of standard air, VALD / Morton convention.
/// `wl_air_aa` in Angstrom; returns the vacuum wavelength.
pub(crate) fn air_to_vacuum(wl_air_aa: f64) -> f64 {
    let s = 1e4 / wl_air_aa;
    let s2 = s * s;
    let n = 1.0
        + 0.00008336624212083
        + 0.02408926869968 / (130.1065924522 - s2)
        + 0.0001599740894897 / (38.92568793293 - s2);
    wl_air_aa * n
}
