use std::path::Path;
use std::sync::Arc;

use log::info;

use super::{apply_selection, load_source, DeviceArrays};
use crate::config::LoadOptions;
use crate::data::cache::LineCache;
use crate::data::filter::Selection;
use crate::data::table::{Column, LineTable};
use crate::derive::{assign_species, derive_atomic};
use crate::error::{LineDbError, Result};
use crate::formats::kurucz::KuruczGfall;
use crate::formats::vald::Vald3Long;
use crate::formats::{find_source, RawFormat};
use crate::partition::SpeciesPartitionTable;
use crate::species::{atomic_mass, solar_abundance, SpeciesKey};

const DEVICE_EXTRA: [Column; 4] = [
    Column::Eupper,
    Column::GamRad,
    Column::GamSta,
    Column::VdWdamp,
];

/// Which text format an atomic source is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtomicFormat {
    Vald3,
    Kurucz,
}

impl AtomicFormat {
    fn parser(self) -> &'static dyn RawFormat {
        match self {
            AtomicFormat::Vald3 => &Vald3Long,
            AtomicFormat::Kurucz => &KuruczGfall,
        }
    }
}

// ---------------------------------------------------------------------------
// AtomicDatabase
// ---------------------------------------------------------------------------

/// Atomic line database from a VALD3 extract or a Kurucz `gfall` file.
///
/// Partition functions come from a multi-species table shared between
/// databases; `QTmask` holds each line's row in it.
#[derive(Debug, Clone)]
pub struct AtomicDatabase {
    format: AtomicFormat,
    options: LoadOptions,
    pf: Arc<SpeciesPartitionTable>,
    qtref_all: Vec<f64>,
    qttyp_all: Vec<f64>,
    table: LineTable,
    device: Option<DeviceArrays>,
}

impl AtomicDatabase {
    pub fn open_vald(path: &Path, pf: Arc<SpeciesPartitionTable>, options: LoadOptions) -> Result<Self> {
        Self::open(path, AtomicFormat::Vald3, pf, options)
    }

    pub fn open_kurucz(path: &Path, pf: Arc<SpeciesPartitionTable>, options: LoadOptions) -> Result<Self> {
        Self::open(path, AtomicFormat::Kurucz, pf, options)
    }

    pub fn open(
        path: &Path,
        format: AtomicFormat,
        pf: Arc<SpeciesPartitionTable>,
        options: LoadOptions,
    ) -> Result<Self> {
        options.validate()?;
        let parser = format.parser();
        let source = match find_source(path) {
            Some(found) => found,
            None if LineCache::for_source(path, parser.format_name()).exists() => path.to_path_buf(),
            None => return Err(LineDbError::MissingFile(path.to_path_buf())),
        };
        info!("Opening {} atomic lines from {}", parser.format_name(), source.display());

        let c = options.constants;
        let qtref_all = pf.interpolate_all(c.tref);
        let qttyp_all = pf.interpolate_all(options.ttyp);

        let mut table = load_source(&source, parser, options.remove_intermediate, |t| {
            derive_atomic(t, &c, &pf, &qtref_all)
        })?;
        // A cache may have been written against another partition table.
        assign_species(&mut table, &c, &pf, &qtref_all)?;

        let selection = Selection::from_options(&options);
        let ratios = species_ratios(&table, &qttyp_all, &qtref_all)?;
        apply_selection(&mut table, &selection, &c, options.ttyp, |i| ratios[i])?;

        let mut db = Self {
            format,
            options,
            pf,
            qtref_all,
            qttyp_all,
            table,
            device: None,
        };
        db.refresh_device()?;
        info!("{} atomic lines kept", db.table.len());
        Ok(db)
    }

    // -----------------------------------------------------------------------
    // Lines
    // -----------------------------------------------------------------------

    pub fn format(&self) -> AtomicFormat {
        self.format
    }

    pub fn table(&self) -> &LineTable {
        &self.table
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn nu_lines(&self) -> &[f64] {
        self.float(Column::NuLines)
    }

    pub fn sij0(&self) -> &[f64] {
        self.float(Column::Sij0)
    }

    pub fn a(&self) -> &[f64] {
        self.float(Column::A)
    }

    pub fn elower(&self) -> &[f64] {
        self.float(Column::Elower)
    }

    pub fn eupper(&self) -> &[f64] {
        self.float(Column::Eupper)
    }

    pub fn gupper(&self) -> &[f64] {
        self.float(Column::Gupper)
    }

    pub fn jlower(&self) -> &[i64] {
        self.int(Column::Jlower)
    }

    pub fn jupper(&self) -> &[i64] {
        self.int(Column::Jupper)
    }

    /// Row of each line's species in the partition table.
    pub fn qtmask(&self) -> &[i64] {
        self.int(Column::QtMask)
    }

    pub fn ielem(&self) -> &[i64] {
        self.int(Column::Ielem)
    }

    /// Ionisation stage, 1 = neutral.
    pub fn iion(&self) -> &[i64] {
        self.int(Column::Iion)
    }

    /// log10 of the radiative damping constant.
    pub fn gam_rad(&self) -> &[f64] {
        self.float(Column::GamRad)
    }

    pub fn gam_sta(&self) -> &[f64] {
        self.float(Column::GamSta)
    }

    pub fn vdw_damp(&self) -> &[f64] {
        self.float(Column::VdWdamp)
    }

    /// Mass (Da) of each line's element; NaN for an unknown element.
    pub fn atomic_mass(&self) -> Vec<f64> {
        self.ielem()
            .iter()
            .map(|&z| atomic_mass(z as u32).unwrap_or(f64::NAN))
            .collect()
    }

    /// Ionisation energy (eV) of each line's species; NaN when untabulated.
    pub fn ion_e(&self) -> Vec<f64> {
        self.ielem()
            .iter()
            .zip(self.iion())
            .map(|(&z, &ion)| {
                SpeciesKey::from_columns(z, ion)
                    .and_then(|key| key.ionisation_energy())
                    .unwrap_or(f64::NAN)
            })
            .collect()
    }

    /// Solar abundance (`log eps`, H = 12) of each line's element.
    pub fn solar_a(&self) -> Vec<f64> {
        self.ielem()
            .iter()
            .map(|&z| solar_abundance(z as u32).unwrap_or(f64::NAN))
            .collect()
    }

    fn float(&self, column: Column) -> &[f64] {
        self.table.float(column).unwrap_or_default()
    }

    fn int(&self, column: Column) -> &[i64] {
        self.table.int(column).unwrap_or_default()
    }

    pub fn device(&self) -> Option<&DeviceArrays> {
        self.device.as_ref()
    }

    pub fn mask(&mut self, keep: &[bool]) -> Result<()> {
        self.table.mask(keep)?;
        self.refresh_device()
    }

    fn refresh_device(&mut self) -> Result<()> {
        self.device = if self.options.device_arrays {
            Some(DeviceArrays::from_table(
                &self.table,
                &self.options.constants,
                &DEVICE_EXTRA,
            )?)
        } else {
            None
        };
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Partition functions
    // -----------------------------------------------------------------------

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    pub fn partition_table(&self) -> &Arc<SpeciesPartitionTable> {
        &self.pf
    }

    /// Q(Tref) of every partition-table row.
    pub fn qtref_all(&self) -> &[f64] {
        &self.qtref_all
    }

    /// Q(Ttyp) of every partition-table row.
    pub fn qttyp_all(&self) -> &[f64] {
        &self.qttyp_all
    }

    pub fn qt_interp(&self, species: SpeciesKey, temperature: f64) -> Result<f64> {
        let row = self.pf.species_index(species)?;
        Ok(self.pf.interpolate_species(row, temperature))
    }

    /// Q(T) / Q(Tref) of one species.
    pub fn qr_interp(&self, species: SpeciesKey, temperature: f64) -> Result<f64> {
        let row = self.pf.species_index(species)?;
        Ok(self.pf.interpolate_species(row, temperature) / self.qtref_all[row])
    }

    /// Q(T) of every partition-table row.
    pub fn qt_interp_all(&self, temperature: f64) -> Vec<f64> {
        self.pf.interpolate_all(temperature)
    }
}

/// Per-line `Q(Ttyp)/Q(Tref)` through `QTmask`.
fn species_ratios(table: &LineTable, qttyp_all: &[f64], qtref_all: &[f64]) -> Result<Vec<f64>> {
    table
        .require_int(Column::QtMask)?
        .iter()
        .map(|&row| {
            let idx = usize::try_from(row).ok().filter(|&i| i < qtref_all.len());
            idx.map(|i| qttyp_all[i] / qtref_all[i]).ok_or_else(|| {
                LineDbError::SchemaMismatch(format!(
                    "QTmask row {row} outside a partition table of {} species",
                    qtref_all.len()
                ))
            })
        })
        .collect()
}
