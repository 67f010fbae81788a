//! HITRAN / HITEMP `.par` records (160-character fixed width).
//!
//! ```text
//! cols      field
//! 0..2      molecule id
//! 2..3      local isotopologue id (0 = 10, A = 11, B = 12)
//! 3..15     nu (cm-1)
//! 15..25    S at 296 K (cm/molecule)
//! 25..35    A (s-1)
//! 35..40    gamma_air
//! 40..45    gamma_self
//! 45..55    E'' (cm-1)
//! 55..59    n_air
//! 59..67    delta_air
//! 146..153  g'
//! 153..160  g''
//! ```

use std::io::BufRead;
use std::path::Path;

use super::{field, open_source, parse_f64, RawFormat};
use crate::data::table::{Column, ColumnData, LineTable};
use crate::error::{LineDbError, Result};

const FORMAT: &str = "HITRAN .par";
const RECORD_LEN: usize = 160;

#[derive(Debug, Clone, Copy, Default)]
pub struct HitranPar;

impl RawFormat for HitranPar {
    fn format_name(&self) -> &'static str {
        "hitran"
    }

    fn parse(&self, reader: &mut dyn BufRead, path: &Path) -> Result<LineTable> {
        let mut isoid = Vec::new();
        let mut nu = Vec::new();
        let mut sw = Vec::new();
        let mut a = Vec::new();
        let mut gamma_air = Vec::new();
        let mut gamma_self = Vec::new();
        let mut elower = Vec::new();
        let mut n_air = Vec::new();
        let mut delta_air = Vec::new();
        let mut gupper = Vec::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| LineDbError::io(path, e))?;
            let lineno = idx + 1;
            let record = line.trim_end_matches('\r');
            if record.trim().is_empty() {
                continue;
            }
            if record.len() < RECORD_LEN {
                return Err(LineDbError::parse(
                    FORMAT,
                    path,
                    lineno,
                    format!("record has {} characters, expected {RECORD_LEN}", record.len()),
                ));
            }
            let num = |start, end, what| {
                parse_f64(field(record, start, end, FORMAT, path, lineno)?, what, FORMAT, path, lineno)
            };
            isoid.push(isotope_id(field(record, 2, 3, FORMAT, path, lineno)?).ok_or_else(
                || LineDbError::parse(FORMAT, path, lineno, "bad isotopologue id"),
            )?);
            nu.push(num(3, 15, "nu")?);
            sw.push(num(15, 25, "sw")?);
            a.push(num(25, 35, "A")?);
            gamma_air.push(num(35, 40, "gamma_air")?);
            gamma_self.push(num(40, 45, "gamma_self")?);
            elower.push(num(45, 55, "elower")?);
            n_air.push(num(55, 59, "n_air")?);
            delta_air.push(num(59, 67, "delta_air")?);
            gupper.push(num(146, 153, "g'")?);
        }

        LineTable::from_columns(vec![
            (Column::Isoid, ColumnData::Int(isoid)),
            (Column::NuLines, ColumnData::Float(nu)),
            (Column::Sij0, ColumnData::Float(sw)),
            (Column::A, ColumnData::Float(a)),
            (Column::GammaAir, ColumnData::Float(gamma_air)),
            (Column::GammaSelf, ColumnData::Float(gamma_self)),
            (Column::Elower, ColumnData::Float(elower)),
            (Column::NAir, ColumnData::Float(n_air)),
            (Column::DeltaAir, ColumnData::Float(delta_air)),
            (Column::Gupper, ColumnData::Float(gupper)),
        ])
    }
}

fn isotope_id(token: &str) -> Option<i64> {
    match token {
        "0" => Some(10),
        "A" | "a" => Some(11),
        "B" | "b" => Some(12),
        t => t.trim().parse().ok(),
    }
}

// ---------------------------------------------------------------------------
// Molecule id
// ---------------------------------------------------------------------------

/// Molecule id from a file named `NN_<anything>`, e.g. `05_HITEMP2019.par`.
pub fn molecule_id_from_name(path: &Path) -> Option<u32> {
    let name = path.file_name()?.to_str()?;
    name.split('_').next()?.parse().ok()
}

/// Molecule id of the first record of `path`, if the file has one.
pub fn sniff_molecule_id(path: &Path) -> Result<Option<u32>> {
    let reader = open_source(path)?;
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| LineDbError::io(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        let token = field(&line, 0, 2, FORMAT, path, idx + 1)?;
        return Ok(token.trim().parse().ok());
    }
    Ok(None)
}

/// The molecule id of a `.par` source: from its name, else from its records.
pub fn molecule_id(path: &Path) -> Result<u32> {
    if let Some(id) = molecule_id_from_name(path) {
        return Ok(id);
    }
    sniff_molecule_id(path)?
        .ok_or_else(|| LineDbError::AmbiguousMolecule(path.display().to_string()))
}
