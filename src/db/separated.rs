//! Atomic lines regrouped per species.
//!
//! Opacity code for atoms loops over species, each with its own partition
//! function and mass. [`SpeciesSeparated`] repacks an [`AtomicDatabase`]
//! into `N_species x L_max` grids, one row per `(ielem, iion)`, padded with
//! NaN past each species' last line.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::debug;

use super::atomic::AtomicDatabase;
use crate::data::table::Column;
use crate::error::{LineDbError, Result};
use crate::partition::SpeciesPartitionTable;
use crate::species::{atomic_mass, solar_abundance, SpeciesKey};

/// Row-major 2-D array.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid2 {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Grid2 {
    fn filled(rows: usize, cols: usize, value: f64) -> Self {
        Self {
            rows,
            cols,
            data: vec![value; rows * cols],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        (row < self.rows && col < self.cols).then(|| self.data[row * self.cols + col])
    }

    pub fn row(&self, row: usize) -> Option<&[f64]> {
        (row < self.rows).then(|| &self.data[row * self.cols..(row + 1) * self.cols])
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }
}

// ---------------------------------------------------------------------------
// SpeciesSeparated
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SpeciesSeparated {
    pub nu_lines: Grid2,
    /// `ln Sij0`
    pub logsij0: Grid2,
    pub elower: Grid2,
    pub eupper: Grid2,
    pub gam_rad: Grid2,
    pub gam_sta: Grid2,
    pub vdw_damp: Grid2,
    /// Partition-table row of each species.
    pub qtmask: Vec<i64>,
    pub ielem: Vec<i64>,
    pub iion: Vec<i64>,
    pub atomic_mass: Vec<f64>,
    /// Ionisation energy (eV) per species; NaN when untabulated.
    pub ion_e: Vec<f64>,
    /// Solar abundance (`log eps`) per species' element.
    pub solar_a: Vec<f64>,
    /// Number of real (non-padding) lines per species.
    pub line_counts: Vec<usize>,
    pub partition_table: Arc<SpeciesPartitionTable>,
    /// Q(Tref) of every partition-table row.
    pub qtref_all: Vec<f64>,
}

impl SpeciesSeparated {
    pub fn from_database(db: &AtomicDatabase) -> Result<Self> {
        let table = db.table();
        let ielem = table.require_int(Column::Ielem)?;
        let iion = table.require_int(Column::Iion)?;
        let qtmask = table.require_int(Column::QtMask)?;

        // Line indices per species, keys sorted.
        let mut groups: BTreeMap<(i64, i64), Vec<usize>> = BTreeMap::new();
        for (i, key) in ielem.iter().copied().zip(iion.iter().copied()).enumerate() {
            groups.entry(key).or_default().push(i);
        }
        let n_species = groups.len();
        let l_max = groups.values().map(Vec::len).max().unwrap_or(0);
        debug!("{n_species} species, at most {l_max} lines each");

        let pack = |column: Column, transform: fn(f64) -> f64| -> Result<Grid2> {
            let values = table.require_float(column)?;
            let mut grid = Grid2::filled(n_species, l_max, f64::NAN);
            for (row, indices) in groups.values().enumerate() {
                for (col, &i) in indices.iter().enumerate() {
                    grid.data[row * l_max + col] = transform(values[i]);
                }
            }
            Ok(grid)
        };
        let same = |v: f64| v;

        let mut species_qtmask = Vec::with_capacity(n_species);
        let mut masses = Vec::with_capacity(n_species);
        let mut ion_e = Vec::with_capacity(n_species);
        let mut solar_a = Vec::with_capacity(n_species);
        for (&(z, ion), indices) in &groups {
            species_qtmask.push(qtmask[indices[0]]);
            masses.push(
                atomic_mass(z as u32)
                    .ok_or_else(|| LineDbError::UnknownSpecies(format!("Z={z}")))?,
            );
            ion_e.push(
                SpeciesKey::from_columns(z, ion)
                    .and_then(|key| key.ionisation_energy())
                    .unwrap_or(f64::NAN),
            );
            solar_a.push(solar_abundance(z as u32).unwrap_or(f64::NAN));
        }

        Ok(Self {
            nu_lines: pack(Column::NuLines, same)?,
            logsij0: pack(Column::Sij0, f64::ln)?,
            elower: pack(Column::Elower, same)?,
            eupper: pack(Column::Eupper, same)?,
            gam_rad: pack(Column::GamRad, same)?,
            gam_sta: pack(Column::GamSta, same)?,
            vdw_damp: pack(Column::VdWdamp, same)?,
            qtmask: species_qtmask,
            ielem: groups.keys().map(|k| k.0).collect(),
            iion: groups.keys().map(|k| k.1).collect(),
            atomic_mass: masses,
            ion_e,
            solar_a,
            line_counts: groups.values().map(Vec::len).collect(),
            partition_table: Arc::clone(db.partition_table()),
            qtref_all: db.qtref_all().to_vec(),
        })
    }

    pub fn n_species(&self) -> usize {
        self.ielem.len()
    }

    /// Longest per-species line count, the grid width.
    pub fn l_max(&self) -> usize {
        self.nu_lines.cols()
    }
}
