use std::path::{Path, PathBuf};

use log::info;

use super::{apply_selection, load_source, DeviceArrays};
use crate::broadening::{resolve_broadening, BroadeningPair, BroadeningQuality, BroadeningResolution};
use crate::config::LoadOptions;
use crate::data::cache::LineCache;
use crate::data::filter::Selection;
use crate::data::table::{Column, ColumnData, LineTable};
use crate::derive::{add_molecular_strength, join_states, typical_strengths};
use crate::error::{LineDbError, Result};
use crate::formats::exomol::{ExomolDef, ExomolNames, ExomolTrans, StatesTable};
use crate::formats::{find_source, open_source, RawFormat};
use crate::merge::{PartitionFile, PartitionedSourceMerger};
use crate::partition::PartitionGrid;
use crate::provision::{ensure_local, FileProvider, Offline, RemoteFile, RemoteLayout};

const DEVICE_EXTRA: [Column; 2] = [Column::AlphaRef, Column::NTexp];

// ---------------------------------------------------------------------------
// ExomolDatabase
// ---------------------------------------------------------------------------

/// Molecular line database built from one ExoMol dataset directory, e.g.
/// `.../CO/12C-16O/Li2015`.
#[derive(Debug, Clone)]
pub struct ExomolDatabase {
    names: ExomolNames,
    options: LoadOptions,
    def: ExomolDef,
    pf: PartitionGrid,
    qtref: f64,
    qttyp: f64,
    default_broadening: BroadeningPair,
    broadening: BroadeningResolution,
    table: LineTable,
    device: Option<DeviceArrays>,
}

impl ExomolDatabase {
    /// Open a dataset whose files are all present locally.
    pub fn open(path: &Path, options: LoadOptions) -> Result<Self> {
        Self::open_with_provider(path, options, &Offline, &RemoteLayout::default())
    }

    /// Open a dataset, asking `provider` for any file that is missing.
    pub fn open_with_provider(
        path: &Path,
        options: LoadOptions,
        provider: &dyn FileProvider,
        remote: &RemoteLayout,
    ) -> Result<Self> {
        options.validate()?;
        let names = ExomolNames::from_dir(path)?;
        info!("Opening ExoMol dataset {}", names.molec());

        let def_file = require(provider, &remote.exomol_plain(&names, ".def"))?;
        let def = ExomolDef::parse(&mut open_source(&def_file)?, &def_file)?;
        let pf_file = require(provider, &remote.exomol_plain(&names, ".pf"))?;
        let pf = PartitionGrid::from_file(&pf_file)?;

        let c = options.constants;
        let qtref = pf.interpolate(c.tref);
        let qttyp = pf.interpolate(options.ttyp);
        let qr_typ = qttyp / qtref;
        let selection = Selection::from_options(&options);

        let mut states: Option<StatesTable> = None;
        let mut load = |source: &Path| -> Result<LineTable> {
            let mut table = load_source(source, &ExomolTrans, options.remove_intermediate, |t| {
                if states.is_none() {
                    let file = require(provider, &remote.exomol_states(&names))?;
                    info!("Reading states {}", file.display());
                    states = Some(StatesTable::parse(&mut open_source(&file)?, &file)?);
                }
                if let Some(states) = &states {
                    join_states(t, states)?;
                }
                add_molecular_strength(t, &c, qtref)
            })?;
            apply_selection(&mut table, &selection, &c, options.ttyp, |_| qr_typ)?;
            Ok(table)
        };

        let mut table = match def.partitions(&def_file)? {
            None => {
                let stem = names.trans_file(None);
                let source = if LineCache::for_source(&stem, ExomolTrans.format_name()).exists() {
                    stem
                } else {
                    require(provider, &remote.exomol_trans(&names, None))?
                };
                load(&source)?
            }
            Some(layout) => {
                let (lo, hi) = options.bounds();
                let range = layout.select(lo, hi);
                info!(
                    "Loading {} of {} transition partitions",
                    range.clone().count(),
                    layout.len()
                );
                let files: Vec<PartitionFile> = layout.tags()[range]
                    .iter()
                    .map(|tag| {
                        let source = names.trans_file(Some(tag));
                        PartitionFile {
                            tag: tag.clone(),
                            cache: LineCache::for_source(&source, ExomolTrans.format_name()),
                            remote: Some(remote.exomol_trans(&names, Some(tag))),
                            source,
                        }
                    })
                    .collect();
                PartitionedSourceMerger::new(provider).merge(&files, |_, source| load(source))?
            }
        };

        // Final pass over the merged set.
        apply_selection(&mut table, &selection, &c, options.ttyp, |_| qr_typ)?;

        let fallback = BroadeningPair::default();
        let default_broadening = BroadeningPair::new(
            def.alpha_ref.unwrap_or(fallback.alpha_ref),
            def.n_texp.unwrap_or(fallback.n_texp),
        );
        if options.broadf {
            ensure_local(provider, &remote.exomol_broad(&names, &options.bkgdatm));
        }
        let broadening = resolve_broadening(
            &names.broad_file(&options.bkgdatm),
            options.broadf,
            default_broadening,
        );

        let mut db = Self {
            names,
            options,
            def,
            pf,
            qtref,
            qttyp,
            default_broadening,
            broadening,
            table,
            device: None,
        };
        db.apply_broadening()?;
        db.refresh_device()?;
        info!("{}: {} lines", db.names.molec(), db.table.len());
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

    /// Upper-state statistical weight.
    pub fn gpp(&self) -> &[f64] {
        self.float(Column::Gupper)
    }

    pub fn jlower(&self) -> &[i64] {
        self.table.int(Column::Jlower).unwrap_or_default()
    }

    pub fn jupper(&self) -> &[i64] {
        self.table.int(Column::Jupper).unwrap_or_default()
    }

    pub fn alpha_ref(&self) -> &[f64] {
        self.float(Column::AlphaRef)
    }

    pub fn n_texp(&self) -> &[f64] {
        self.float(Column::NTexp)
    }

    /// Line strengths at the typical temperature, the quantity compared with
    /// `crit`.
    pub fn sij_typ(&self) -> Result<Vec<f64>> {
        let qr = self.qttyp / self.qtref;
        typical_strengths(&self.options.constants, &self.table, self.options.ttyp, |_| qr)
    }

    fn float(&self, column: Column) -> &[f64] {
        self.table.float(column).unwrap_or_default()
    }

    pub fn device(&self) -> Option<&DeviceArrays> {
        self.device.as_ref()
    }

    /// Keep only the lines where `keep` is true.
    pub fn mask(&mut self, keep: &[bool]) -> Result<()> {
        self.table.mask(keep)?;
        self.refresh_device()
    }

    // -----------------------------------------------------------------------
    // Metadata
    // -----------------------------------------------------------------------

    pub fn names(&self) -> &ExomolNames {
        &self.names
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    /// Isotopologue mass (Da), from the `.def` file.
    pub fn molmass(&self) -> Option<f64> {
        self.def.molmass
    }

    pub fn qtref(&self) -> f64 {
        self.qtref
    }

    pub fn qttyp(&self) -> f64 {
        self.qttyp
    }

    pub fn partition_function(&self) -> &PartitionGrid {
        &self.pf
    }

    /// Q(T).
    pub fn qt_interp(&self, temperature: f64) -> f64 {
        self.pf.interpolate(temperature)
    }

    /// Q(T) / Q(Tref).
    pub fn qr_interp(&self, temperature: f64) -> f64 {
        self.pf.ratio(temperature, self.options.constants.tref)
    }

    // -----------------------------------------------------------------------
    // Broadening
    // -----------------------------------------------------------------------

    pub fn broadening_quality(&self) -> BroadeningQuality {
        self.broadening.model.quality()
    }

    /// Why the broadening table was not used, if it was requested but
    /// could not be.
    pub fn broadening_warning(&self) -> Option<&str> {
        self.broadening.warning.as_deref()
    }

    pub fn default_broadening(&self) -> BroadeningPair {
        self.default_broadening
    }

    /// Re-resolve the broadening columns with new defaults. `None` keeps
    /// the current value.
    pub fn set_broadening(&mut self, alpha_ref_def: Option<f64>, n_texp_def: Option<f64>) -> Result<()> {
        if let Some(alpha_ref) = alpha_ref_def {
            self.default_broadening.alpha_ref = alpha_ref;
        }
        if let Some(n_texp) = n_texp_def {
            self.default_broadening.n_texp = n_texp;
        }
        self.broadening = resolve_broadening(
            &self.names.broad_file(&self.options.bkgdatm),
            self.options.broadf,
            self.default_broadening,
        );
        self.apply_broadening()?;
        self.refresh_device()
    }

    fn apply_broadening(&mut self) -> Result<()> {
        let (alpha, n) = self.broadening.model.resolve_all(
            self.table.require_int(Column::Jlower)?,
            self.table.require_int(Column::Jupper)?,
        );
        self.table.insert(Column::AlphaRef, ColumnData::Float(alpha))?;
        self.table.insert(Column::NTexp, ColumnData::Float(n))
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
}

/// Local path of a required file, fetching it once if absent.
fn require(provider: &dyn FileProvider, remote: &RemoteFile) -> Result<PathBuf> {
    ensure_local(provider, remote)
        .path()
        .map(Path::to_path_buf)
        .or_else(|| find_source(&remote.target))
        .ok_or_else(|| LineDbError::MissingFile(remote.target.clone()))
}
