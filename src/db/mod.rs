//! Database facades, one per source family.
//!
//! Each facade turns a path plus [`LoadOptions`](crate::config::LoadOptions)
//! into a fully derived, filtered [`LineTable`]. Construction either succeeds
//! completely or returns an error; there is no partially built instance.

pub mod atomic;
pub mod exomol;
pub mod hitran;
pub mod separated;

use std::collections::BTreeMap;
use std::path::Path;

use log::debug;

use crate::constants::RefConstants;
use crate::data::cache::LineCache;
use crate::data::filter::{combine, Selection};
use crate::data::table::{Column, LineTable};
use crate::derive::typical_strengths;
use crate::error::Result;
use crate::formats::{materialize, RawFormat};

// ---------------------------------------------------------------------------
// DeviceArrays – flat snapshot for downstream numeric code
// ---------------------------------------------------------------------------

/// Plain `f64` arrays handed to the opacity code. Rebuilt after every mask.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceArrays {
    pub nu_lines: Vec<f64>,
    /// `ln Sij0`
    pub logsij0: Vec<f64>,
    pub elower: Vec<f64>,
    pub gupper: Vec<f64>,
    pub a: Vec<f64>,
    /// `A / (4 pi c)` (cm-1)
    pub gamma_natural: Vec<f64>,
    /// Family-specific float columns (broadening, damping, ...).
    pub extra: BTreeMap<Column, Vec<f64>>,
}

impl DeviceArrays {
    pub fn from_table(table: &LineTable, c: &RefConstants, extra: &[Column]) -> Result<Self> {
        let a = table.require_float(Column::A)?.to_vec();
        let gamma_natural = a.iter().map(|&v| c.gamma_natural(v)).collect();
        let mut extras = BTreeMap::new();
        for &column in extra {
            extras.insert(column, table.require_float(column)?.to_vec());
        }
        Ok(Self {
            nu_lines: table.require_float(Column::NuLines)?.to_vec(),
            logsij0: table.require_float(Column::Sij0)?.iter().map(|s| s.ln()).collect(),
            elower: table.require_float(Column::Elower)?.to_vec(),
            gupper: table.require_float(Column::Gupper)?.to_vec(),
            a,
            gamma_natural,
            extra: extras,
        })
    }

    pub fn len(&self) -> usize {
        self.nu_lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nu_lines.is_empty()
    }

    pub fn extra(&self, column: Column) -> Option<&[f64]> {
        self.extra.get(&column).map(Vec::as_slice)
    }
}

// ---------------------------------------------------------------------------
// Shared load path
// ---------------------------------------------------------------------------

/// Load one source: from its cache when present, otherwise parse, derive,
/// write the cache and drop any decompressed intermediate.
///
/// The returned table holds every line of the source, including those with
/// `nu_positive == false`.
pub(crate) fn load_source<F>(
    source: &Path,
    format: &dyn RawFormat,
    remove_intermediate: bool,
    derive: F,
) -> Result<LineTable>
where
    F: FnOnce(&mut LineTable) -> Result<()>,
{
    let cache = LineCache::for_source(source, format.format_name());
    if cache.exists() {
        return cache.load();
    }

    let plain = materialize(source)?;
    let mut table = format.parse_file(&plain.path)?;
    derive(&mut table)?;
    cache.store(&table, source)?;
    if remove_intermediate {
        plain.cleanup()?;
    }
    Ok(table)
}

/// Drop lines with an invalid wavenumber, outside the selection range, or at
/// or below the strength floor at temperature `t`.
pub(crate) fn apply_selection(
    table: &mut LineTable,
    selection: &Selection,
    c: &RefConstants,
    t: f64,
    qr: impl Fn(usize) -> f64,
) -> Result<()> {
    let strengths = typical_strengths(c, table, t, qr)?;
    let nu = table.require_float(Column::NuLines)?;
    let mut keep = selection.mask(nu, &strengths);
    if let Some(positive) = table.bool(Column::NuPositive) {
        keep = combine(&keep, positive);
    }
    let before = table.len();
    table.mask(&keep)?;
    debug!("selection kept {} of {before} lines", table.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::table::ColumnData;

    #[test]
    fn test_device_arrays() {
        let table = LineTable::from_columns(vec![
            (Column::NuLines, ColumnData::Float(vec![100.0])),
            (Column::Sij0, ColumnData::Float(vec![1.0])),
            (Column::Elower, ColumnData::Float(vec![0.0])),
            (Column::Gupper, ColumnData::Float(vec![3.0])),
            (Column::A, ColumnData::Float(vec![1.0])),
            (Column::AlphaRef, ColumnData::Float(vec![0.07])),
        ])
        .unwrap();
        let c = RefConstants::default();
        let dev = DeviceArrays::from_table(&table, &c, &[Column::AlphaRef]).unwrap();
        assert_eq!(dev.logsij0, vec![0.0]);
        assert!((dev.gamma_natural[0] - 2.6544188e-12).abs() < 1e-18);
        assert_eq!(dev.extra(Column::AlphaRef), Some(&[0.07][..]));
        assert!(DeviceArrays::from_table(&table, &c, &[Column::NTexp]).is_err());
    }

    #[test]
    fn test_apply_selection_drops_invalid_nu() {
        let mut table = LineTable::from_columns(vec![
            (Column::NuLines, ColumnData::Float(vec![100.0, 200.0, -5.0])),
            (Column::Sij0, ColumnData::Float(vec![1e-20, 1e-30, 1e-20])),
            (Column::Elower, ColumnData::Float(vec![0.0, 0.0, 0.0])),
            (Column::NuPositive, ColumnData::Bool(vec![true, true, false])),
        ])
        .unwrap();
        let c = RefConstants::default();
        let sel = Selection {
            lo: f64::NEG_INFINITY,
            hi: f64::INFINITY,
            crit: 1e-25,
        };
        apply_selection(&mut table, &sel, &c, c.tref, |_| 1.0).unwrap();
        assert_eq!(table.float(Column::NuLines).unwrap(), &[100.0]);
    }
}
