//! VALD3 "long format" extracts.
//!
//! Each transition is one comma-separated record followed by three quoted
//! continuation lines (term designations and references):
//!
//! ```text
//! Elm Ion       WL_air(A)  log gf* E_low(eV) J lo  E_up(eV) J up  lower  upper   mean   Rad.  Stark  Waals
//! 'Fe 1',       5001.8633,  0.010,  3.8816,  5.0,  6.3597,  4.0, 1.340, 1.260, 1.460, 8.320,-5.440,-7.230,
//! '  LS                                                 3d6.(5D).4s.4p z3F*'
//! '  LS                                                 3d6.(5D).4s.5s e3D'
//! '_          Kurucz Fe I 2007   1 wl:K07   1 gf:K07 ...'
//! ```
//!
//! The header selects air or vacuum wavelengths and eV or cm-1 energies.
//! Output wavelengths are in vacuum, energies in cm-1.

use std::io::BufRead;
use std::path::Path;

use log::warn;

use super::{air_to_vacuum, parse_f64, RawFormat};
use crate::constants::EV_TO_WAVENUMBER;
use crate::data::table::{Column, ColumnData, LineTable};
use crate::error::{LineDbError, Result};
use crate::species::SpeciesKey;

const FORMAT: &str = "VALD3";
const NUMERIC_FIELDS: usize = 12;

/// VALD air wavelengths are only given above this limit (Angstrom).
const AIR_LIMIT_AA: f64 = 2000.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct Vald3Long;

#[derive(Debug, Clone, Copy)]
struct Units {
    air: bool,
    ev: bool,
}

impl Units {
    fn from_header(line: &str) -> Option<Units> {
        let air = line.contains("WL_air");
        if !air && !line.contains("WL_vac") {
            return None;
        }
        Some(Units {
            air,
            ev: line.contains("(eV)"),
        })
    }
}

impl RawFormat for Vald3Long {
    fn format_name(&self) -> &'static str {
        "vald3"
    }

    fn parse(&self, reader: &mut dyn BufRead, path: &Path) -> Result<LineTable> {
        let mut units: Option<Units> = None;
        let mut out = AtomicColumns::default();
        let mut skipped = 0usize;

        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| LineDbError::io(path, e))?;
            let lineno = idx + 1;
            if units.is_none() {
                units = Units::from_header(&line);
                continue;
            }
            let Some((species, rest)) = split_record(&line) else {
                continue;
            };
            let Some(units) = units else {
                continue;
            };

            let key = match SpeciesKey::parse(species) {
                Some(key) => key,
                None => {
                    skipped += 1;
                    continue;
                }
            };
            let values: Vec<&str> = rest.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
            if values.len() < NUMERIC_FIELDS {
                return Err(LineDbError::parse(
                    FORMAT,
                    path,
                    lineno,
                    format!("expected {NUMERIC_FIELDS} numeric fields, found {}", values.len()),
                ));
            }
            let mut num = values
                .iter()
                .take(NUMERIC_FIELDS)
                .map(|v| parse_f64(v, "field", FORMAT, path, lineno));
            let mut next = || num.next().unwrap_or(Ok(f64::NAN));

            let wl = next()?;
            let loggf = next()?;
            let e_low = next()?;
            let j_low = next()?;
            let e_up = next()?;
            let j_up = next()?;
            let (_lande_lo, _lande_up, _lande_mean) = (next()?, next()?, next()?);
            let rad = next()?;
            let stark = next()?;
            let waals = next()?;

            let energy = if units.ev { EV_TO_WAVENUMBER } else { 1.0 };
            let wl_vac = if units.air && wl > AIR_LIMIT_AA {
                air_to_vacuum(wl)
            } else {
                wl
            };
            out.push(AtomicLine {
                key,
                wavelength: wl_vac,
                loggf,
                elower: e_low * energy,
                eupper: e_up * energy,
                jlower: j_low,
                jupper: j_up,
                gam_rad: rad,
                gam_sta: stark,
                vdw: waals,
            });
        }

        if units.is_none() {
            return Err(LineDbError::parse(
                FORMAT,
                path,
                0,
                "no 'WL_air' / 'WL_vac' header line found",
            ));
        }
        if skipped > 0 {
            warn!(
                "{}: skipped {skipped} records of molecular or unknown species",
                path.display()
            );
        }
        out.into_table()
    }
}

/// `'Fe 1',  5001.8633, ...` → (`Fe 1`, `  5001.8633, ...`). Continuation
/// lines (`'  LS ...'`) have nothing after the closing quote and are rejected.
fn split_record(line: &str) -> Option<(&str, &str)> {
    let body = line.trim_start().strip_prefix('\'')?;
    let (species, rest) = body.split_once('\'')?;
    let rest = rest.trim_start().strip_prefix(',')?;
    Some((species.trim(), rest))
}

// ---------------------------------------------------------------------------
// Shared atomic column builder (VALD3 and Kurucz)
// ---------------------------------------------------------------------------

/// One atomic transition, energies in cm-1, vacuum wavelength in Angstrom.
#[derive(Debug, Clone, Copy)]
pub(crate) struct AtomicLine {
    pub key: SpeciesKey,
    pub wavelength: f64,
    pub loggf: f64,
    pub elower: f64,
    pub eupper: f64,
    pub jlower: f64,
    pub jupper: f64,
    pub gam_rad: f64,
    pub gam_sta: f64,
    pub vdw: f64,
}

#[derive(Debug, Default)]
pub(crate) struct AtomicColumns {
    ielem: Vec<i64>,
    iion: Vec<i64>,
    wavelength: Vec<f64>,
    loggf: Vec<f64>,
    elower: Vec<f64>,
    eupper: Vec<f64>,
    gupper: Vec<f64>,
    jlower: Vec<i64>,
    jupper: Vec<i64>,
    gam_rad: Vec<f64>,
    gam_sta: Vec<f64>,
    vdw: Vec<f64>,
}

impl AtomicColumns {
    pub(crate) fn push(&mut self, line: AtomicLine) {
        self.ielem.push(line.key.ielem as i64);
        self.iion.push(line.key.iion as i64);
        self.wavelength.push(line.wavelength);
        self.loggf.push(line.loggf);
        self.elower.push(line.elower);
        self.eupper.push(line.eupper);
        self.gupper.push(2.0 * line.jupper + 1.0);
        self.jlower.push(line.jlower.floor() as i64);
        self.jupper.push(line.jupper.floor() as i64);
        self.gam_rad.push(line.gam_rad);
        self.gam_sta.push(line.gam_sta);
        self.vdw.push(line.vdw);
    }

    pub(crate) fn into_table(self) -> Result<LineTable> {
        LineTable::from_columns(vec![
            (Column::Ielem, ColumnData::Int(self.ielem)),
            (Column::Iion, ColumnData::Int(self.iion)),
            (Column::Wavelength, ColumnData::Float(self.wavelength)),
            (Column::LogGf, ColumnData::Float(self.loggf)),
            (Column::Elower, ColumnData::Float(self.elower)),
            (Column::Eupper, ColumnData::Float(self.eupper)),
            (Column::Gupper, ColumnData::Float(self.gupper)),
            (Column::Jlower, ColumnData::Int(self.jlower)),
            (Column::Jupper, ColumnData::Int(self.jupper)),
            (Column::GamRad, ColumnData::Float(self.gam_rad)),
            (Column::GamSta, ColumnData::Float(self.gam_sta)),
            (Column::VdWdamp, ColumnData::Float(self.vdw)),
        ])
    }
}
