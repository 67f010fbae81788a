//! Kurucz `gfXXXX.all` line lists.
//!
//! Fixed-width records, one line per transition:
//!
//! ```text
//! cols     field
//! 0..11    wavelength (nm; air above 200 nm)
//! 11..18   log gf
//! 18..24   element code, e.g. 26.01 = Fe II
//! 24..36   E first level (cm-1, negative = predicted)
//! 36..41   J first level
//! 42..52   label first level
//! 52..64   E second level
//! 64..69   J second level
//! 70..80   label second level
//! 80..86   log gamma radiative
//! 86..92   log gamma Stark
//! 92..98   log gamma van der Waals
//! ```

use std::io::BufRead;
use std::path::Path;

use log::warn;

use super::vald::{AtomicColumns, AtomicLine};
use super::{air_to_vacuum, field, parse_f64, RawFormat};
use crate::data::table::LineTable;
use crate::error::{LineDbError, Result};
use crate::species::SpeciesKey;

const FORMAT: &str = "Kurucz gfall";
const MIN_RECORD_LEN: usize = 98;
const AIR_LIMIT_NM: f64 = 200.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct KuruczGfall;

impl RawFormat for KuruczGfall {
    fn format_name(&self) -> &'static str {
        "kurucz"
    }

    fn parse(&self, reader: &mut dyn BufRead, path: &Path) -> Result<LineTable> {
        let mut out = AtomicColumns::default();
        let mut skipped = 0usize;
        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| LineDbError::io(path, e))?;
            let lineno = idx + 1;
            if line.trim().is_empty() {
                continue;
            }
            if line.len() < MIN_RECORD_LEN {
                return Err(LineDbError::parse(
                    FORMAT,
                    path,
                    lineno,
                    format!("record has {} characters, expected at least {MIN_RECORD_LEN}", line.len()),
                ));
            }
            let num = |start, end, what| {
                parse_f64(field(&line, start, end, FORMAT, path, lineno)?, what, FORMAT, path, lineno)
            };

            let wl_nm = num(0, 11, "wavelength")?;
            let loggf = num(11, 18, "log gf")?;
            let code = num(18, 24, "element code")?;
            let e1 = num(24, 36, "E1")?.abs();
            let j1 = num(36, 41, "J1")?;
            let e2 = num(52, 64, "E2")?.abs();
            let j2 = num(64, 69, "J2")?;
            let gam_rad = num(80, 86, "gamma rad")?;
            let gam_sta = num(86, 92, "gamma Stark")?;
            let vdw = num(92, 98, "gamma vdW")?;

            let Some(key) = species_from_code(code) else {
                skipped += 1;
                continue;
            };
            let ((elower, jlower), (eupper, jupper)) = if e1 <= e2 {
                ((e1, j1), (e2, j2))
            } else {
                ((e2, j2), (e1, j1))
            };
            let wl_nm = if wl_nm >= AIR_LIMIT_NM {
                air_to_vacuum(wl_nm * 10.0) / 10.0
            } else {
                wl_nm
            };
            out.push(AtomicLine {
                key,
                wavelength: wl_nm * 10.0,
                loggf,
                elower,
                eupper,
                jlower,
                jupper,
                gam_rad,
                gam_sta,
                vdw,
            });
        }
        if skipped > 0 {
            warn!(
                "{}: skipped {skipped} records with element codes outside the periodic table",
                path.display()
            );
        }
        out.into_table()
    }
}

/// `26.01` → Fe II. The fractional part is the ionisation stage minus one.
fn species_from_code(code: f64) -> Option<SpeciesKey> {
    let ielem = code.floor();
    let iion = ((code - ielem) * 100.0).round() + 1.0;
    SpeciesKey::new(ielem as u32, iion as u32)
}
