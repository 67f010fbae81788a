use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{info, warn};

use super::{apply_selection, load_source, DeviceArrays};
use crate::config::LoadOptions;
use crate::data::cache::LineCache;
use crate::data::filter::Selection;
use crate::data::table::{Column, ColumnData, LineTable};
use crate::error::{LineDbError, Result};
use crate::formats::exomol::ExomolNames;
use crate::formats::hitran::{molecule_id, molecule_id_from_name, HitranPar};
use crate::formats::{find_source, RawFormat};
use crate::merge::{PartitionFile, PartitionLayout, PartitionedSourceMerger};
use crate::partition::PartitionGrid;
use crate::provision::{ensure_local, FileProvider, Offline, RemoteLayout};

const DEVICE_EXTRA: [Column; 4] = [
    Column::GammaAir,
    Column::GammaSelf,
    Column::NAir,
    Column::DeltaAir,
];

// ---------------------------------------------------------------------------
// IsotopePartitions – strict per-isotopologue partition functions
// ---------------------------------------------------------------------------

/// One partition-function grid per local isotopologue id. Temperatures
/// outside a grid are refused rather than extrapolated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IsotopePartitions {
    grids: BTreeMap<i64, PartitionGrid>,
}

impl IsotopePartitions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, isotope: i64, grid: PartitionGrid) -> Self {
        self.grids.insert(isotope, grid);
        self
    }

    pub fn insert(&mut self, isotope: i64, grid: PartitionGrid) {
        self.grids.insert(isotope, grid);
    }

    /// Two-column `T Q` files, one per isotopologue.
    pub fn from_files(files: &[(i64, PathBuf)]) -> Result<Self> {
        let mut out = Self::new();
        for (isotope, path) in files {
            out.insert(*isotope, PartitionGrid::from_file(path)?);
        }
        Ok(out)
    }

    /// Use the `.pf` file of an ExoMol dataset directory for `isotope`.
    pub fn with_exomol(mut self, isotope: i64, dataset_dir: &Path) -> Result<Self> {
        let names = ExomolNames::from_dir(dataset_dir)?;
        self.insert(isotope, PartitionGrid::from_file(&names.pf_file())?);
        Ok(self)
    }

    pub fn isotopes(&self) -> impl Iterator<Item = i64> + '_ {
        self.grids.keys().copied()
    }

    pub fn grid(&self, isotope: i64) -> Result<&PartitionGrid> {
        self.grids
            .get(&isotope)
            .ok_or_else(|| LineDbError::UnknownSpecies(format!("isotopologue {isotope}")))
    }

    fn strict(&self, isotope: i64, temperature: f64) -> Result<f64> {
        self.grid(isotope)?
            .interpolate_strict(temperature, &format!("isotopologue {isotope}"))
    }
}

// ---------------------------------------------------------------------------
// HitranSource
// ---------------------------------------------------------------------------

/// A single `.par` file, or the sub-archives of a partitioned HITEMP2010
/// list laid out as `NN_HITEMP2010/<tag>/NN_<tag>_HITEMP2010.par`.
#[derive(Debug, Clone, PartialEq)]
pub enum HitranSource {
    Single(PathBuf),
    Partitioned {
        dir: PathBuf,
        molecule_id: u32,
        layout: PartitionLayout,
    },
}

impl HitranSource {
    /// A `NN_HITEMP2010` directory is partitioned; its layout comes from the
    /// `lllll-hhhhh` sub-directories present. Anything else is one file.
    pub fn detect(path: &Path) -> Result<Self> {
        let is_hitemp2010 = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with("_HITEMP2010"));
        if !(is_hitemp2010 && path.is_dir()) {
            return Ok(HitranSource::Single(path.to_path_buf()));
        }
        let molecule_id = molecule_id_from_name(path)
            .ok_or_else(|| LineDbError::AmbiguousMolecule(path.display().to_string()))?;
        let mut tags = Vec::new();
        for entry in std::fs::read_dir(path).map_err(|e| LineDbError::io(path, e))? {
            let entry = entry.map_err(|e| LineDbError::io(path, e))?;
            if entry.path().is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    tags.push(name.to_string());
                }
            }
        }
        Ok(HitranSource::Partitioned {
            dir: path.to_path_buf(),
            molecule_id,
            layout: PartitionLayout::from_tags(&tags)?,
        })
    }

    /// Partitioned source with a known layout; missing sub-archives are
    /// fetched on demand.
    pub fn partitioned(dir: &Path, layout: PartitionLayout) -> Result<Self> {
        let molecule_id = molecule_id_from_name(dir)
            .ok_or_else(|| LineDbError::AmbiguousMolecule(dir.display().to_string()))?;
        Ok(HitranSource::Partitioned {
            dir: dir.to_path_buf(),
            molecule_id,
            layout,
        })
    }
}

/// `NN_HITEMP2010/<tag>/NN_<tag>_HITEMP2010.par`
pub fn hitemp2010_partition_path(dir: &Path, molecule_id: u32, tag: &str) -> PathBuf {
    dir.join(tag)
        .join(format!("{molecule_id:02}_{tag}_HITEMP2010.par"))
}

// ---------------------------------------------------------------------------
// HitranDatabase
// ---------------------------------------------------------------------------

/// Molecular line database from HITRAN / HITEMP `.par` records.
#[derive(Debug, Clone)]
pub struct HitranDatabase {
    source: HitranSource,
    molecule_id: u32,
    options: LoadOptions,
    partitions: IsotopePartitions,
    table: LineTable,
    unique_isotopes: Vec<i64>,
    device: Option<DeviceArrays>,
}

impl HitranDatabase {
    pub fn open(path: &Path, options: LoadOptions, partitions: IsotopePartitions) -> Result<Self> {
        Self::open_source(
            HitranSource::detect(path)?,
            options,
            partitions,
            &Offline,
            &RemoteLayout::default(),
        )
    }

    pub fn open_source(
        source: HitranSource,
        options: LoadOptions,
        partitions: IsotopePartitions,
        provider: &dyn FileProvider,
        remote: &RemoteLayout,
    ) -> Result<Self> {
        options.validate()?;
        let c = options.constants;
        let selection = Selection::from_options(&options);

        // Q(Ttyp)/Q(Tref) per isotope; every grid must cover both.
        let mut qr_typ: BTreeMap<i64, f64> = BTreeMap::new();
        for iso in partitions.isotopes() {
            let qref = partitions.strict(iso, c.tref)?;
            qr_typ.insert(iso, partitions.strict(iso, options.ttyp)? / qref);
        }

        let load = |path: &Path| -> Result<LineTable> {
            let mut table = load_source(path, &HitranPar, options.remove_intermediate, |t| {
                let positive = t
                    .require_float(Column::NuLines)?
                    .iter()
                    .map(|&v| v.is_finite() && v > 0.0)
                    .collect();
                t.insert(Column::NuPositive, ColumnData::Bool(positive))
            })?;
            let ratios = line_ratios(&table, &qr_typ)?;
            apply_selection(&mut table, &selection, &c, options.ttyp, |i| ratios[i])?;
            Ok(table)
        };

        let (molecule_id, mut table) = match &source {
            HitranSource::Single(path) => {
                let located = match find_source(path) {
                    Some(found) => found,
                    None if LineCache::for_source(path, HitranPar.format_name()).exists() => path.clone(),
                    None => {
                        ensure_local(provider, &remote.hitran_par(path));
                        find_source(path).ok_or_else(|| LineDbError::MissingFile(path.clone()))?
                    }
                };
                let id = match molecule_id_from_name(&located) {
                    Some(id) => id,
                    None => molecule_id(&located)?,
                };
                info!("Opening HITRAN molecule {id:02} from {}", located.display());
                (id, load(&located)?)
            }
            HitranSource::Partitioned {
                dir,
                molecule_id,
                layout,
            } => {
                let (lo, hi) = options.bounds();
                let files: Vec<PartitionFile> = layout.tags()[layout.select(lo, hi)]
                    .iter()
                    .map(|tag| {
                        let path = hitemp2010_partition_path(dir, *molecule_id, tag);
                        PartitionFile {
                            tag: tag.clone(),
                            cache: LineCache::for_source(&path, HitranPar.format_name()),
                            remote: Some(remote.hitemp2010_partition(*molecule_id, tag, &path)),
                            source: path,
                        }
                    })
                    .collect();
                info!(
                    "Opening HITEMP2010 molecule {molecule_id:02}: {} of {} partitions",
                    files.len(),
                    layout.len()
                );
                let merged = PartitionedSourceMerger::new(provider).merge(&files, |_, p| load(p))?;
                (*molecule_id, merged)
            }
        };

        let ratios = line_ratios(&table, &qr_typ)?;
        apply_selection(&mut table, &selection, &c, options.ttyp, |i| ratios[i])?;

        let mut db = Self {
            source,
            molecule_id,
            options,
            partitions,
            table,
            unique_isotopes: Vec::new(),
            device: None,
        };
        db.refresh()?;
        info!("HITRAN molecule {:02}: {} lines", db.molecule_id, db.table.len());
        Ok(db)
    }

    // -----------------------------------------------------------------------
    // Lines
    // -----------------------------------------------------------------------

    pub fn table(&self) -> &LineTable {
        &self.table
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn source(&self) -> &HitranSource {
        &self.source
    }

    pub fn molecule_id(&self) -> u32 {
        self.molecule_id
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

    /// Upper-state statistical weight g'.
    pub fn gupper(&self) -> &[f64] {
        self.float(Column::Gupper)
    }

    pub fn gamma_air(&self) -> &[f64] {
        self.float(Column::GammaAir)
    }

    pub fn gamma_self(&self) -> &[f64] {
        self.float(Column::GammaSelf)
    }

    pub fn n_air(&self) -> &[f64] {
        self.float(Column::NAir)
    }

    pub fn delta_air(&self) -> &[f64] {
        self.float(Column::DeltaAir)
    }

    pub fn isoid(&self) -> &[i64] {
        self.table.int(Column::Isoid).unwrap_or_default()
    }

    /// Sorted isotopologue ids present among the lines.
    pub fn unique_isotopes(&self) -> &[i64] {
        &self.unique_isotopes
    }

    fn float(&self, column: Column) -> &[f64] {
        self.table.float(column).unwrap_or_default()
    }

    pub fn device(&self) -> Option<&DeviceArrays> {
        self.device.as_ref()
    }

    pub fn mask(&mut self, keep: &[bool]) -> Result<()> {
        self.table.mask(keep)?;
        self.refresh()
    }

    fn refresh(&mut self) -> Result<()> {
        let mut isotopes = self.isoid().to_vec();
        isotopes.sort_unstable();
        isotopes.dedup();
        self.unique_isotopes = isotopes;
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

    pub fn partitions(&self) -> &IsotopePartitions {
        &self.partitions
    }

    /// Q(T) of one isotopologue (linear, extrapolating).
    pub fn qt_iso_interp(&self, isotope: i64, temperature: f64) -> Result<f64> {
        Ok(self.partitions.grid(isotope)?.interpolate(temperature))
    }

    /// Q(T) / Q(Tref) of one isotopologue.
    pub fn qr_iso_interp(&self, isotope: i64, temperature: f64) -> Result<f64> {
        Ok(self
            .partitions
            .grid(isotope)?
            .ratio(temperature, self.options.constants.tref))
    }

    /// `Q(T)/Q(Tref)` for every temperature (rows) and every isotopologue in
    /// [`unique_isotopes`](Self::unique_isotopes) (columns). Fails if any
    /// temperature, `Tref` included, is outside a grid.
    pub fn qr_isotopes(&self, temperatures: &[f64]) -> Result<Vec<Vec<f64>>> {
        let tref = self.options.constants.tref;
        let mut per_iso = Vec::with_capacity(self.unique_isotopes.len());
        for &iso in &self.unique_isotopes {
            let qref = self.partitions.strict(iso, tref)?;
            let column = temperatures
                .iter()
                .map(|&t| Ok(self.partitions.strict(iso, t)? / qref))
                .collect::<Result<Vec<f64>>>()?;
            per_iso.push(column);
        }
        Ok((0..temperatures.len())
            .map(|row| per_iso.iter().map(|col| col[row]).collect())
            .collect())
    }

    /// `Q(T)/Q(Tref)` of every line's isotopologue.
    pub fn qr_line(&self, temperature: f64) -> Result<Vec<f64>> {
        Ok(self
            .qr_layer(&[temperature])?
            .into_iter()
            .next()
            .unwrap_or_default())
    }

    /// [`qr_line`](Self::qr_line) for several temperatures (layers × lines).
    pub fn qr_layer(&self, temperatures: &[f64]) -> Result<Vec<Vec<f64>>> {
        let qr = self.qr_isotopes(temperatures)?;
        let column: BTreeMap<i64, usize> = self
            .unique_isotopes
            .iter()
            .enumerate()
            .map(|(i, &iso)| (iso, i))
            .collect();
        let isoid = self.isoid();
        Ok(qr
            .iter()
            .map(|row| {
                isoid
                    .iter()
                    .map(|iso| column.get(iso).map_or(1.0, |&i| row[i]))
                    .collect()
            })
            .collect())
    }
}

/// Per-line `Q(Ttyp)/Q(Tref)` from the per-isotope ratios.
fn line_ratios(table: &LineTable, qr_typ: &BTreeMap<i64, f64>) -> Result<Vec<f64>> {
    table
        .require_int(Column::Isoid)?
        .iter()
        .map(|iso| {
            qr_typ.get(iso).copied().ok_or_else(|| {
                warn!("no partition function for isotopologue {iso}");
                LineDbError::UnknownSpecies(format!("isotopologue {iso}"))
            })
        })
        .collect()
}
