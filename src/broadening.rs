//! Pressure-broadening parameters `(alpha_ref, n_Texp)` per line.
//!
//! ExoMol `.broad` files come in quality levels:
//!
//! * `a0` rows: `jlower → (alpha_ref, n_Texp)`
//! * `a1` rows: `(jlower, jupper) → (alpha_ref, n_Texp)`
//!
//! The richest level present in the file drives resolution; anything the
//! table does not list falls back one level (a1 → a0 → defaults).

use std::collections::HashMap;
use std::path::Path;

use log::{info, warn};

use crate::constants::{ALPHA_REF_DEFAULT, N_TEXP_DEFAULT};
use crate::error::{LineDbError, Result};
use crate::formats::exomol::BroadTable;
use crate::formats::{find_source, open_source};

/// Lorentzian half-width at the reference temperature (cm-1/bar) and its
/// temperature exponent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BroadeningPair {
    pub alpha_ref: f64,
    pub n_texp: f64,
}

impl Default for BroadeningPair {
    fn default() -> Self {
        Self {
            alpha_ref: ALPHA_REF_DEFAULT,
            n_texp: N_TEXP_DEFAULT,
        }
    }
}

impl BroadeningPair {
    pub fn new(alpha_ref: f64, n_texp: f64) -> Self {
        Self { alpha_ref, n_texp }
    }

    fn is_valid(&self) -> bool {
        self.alpha_ref.is_finite() && self.alpha_ref >= 0.0 && self.n_texp.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadeningQuality {
    Constant,
    A0,
    A1,
}

// ---------------------------------------------------------------------------
// BroadeningModel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum BroadeningModel {
    /// Every line gets the same pair.
    Constant(BroadeningPair),
    /// a0: looked up by lower J, unlisted J get `default`.
    ByJlower {
        default: BroadeningPair,
        by_jlower: HashMap<i64, BroadeningPair>,
    },
    /// a1: looked up by (lower J, upper J), unlisted pairs resolve as a0.
    ByJPair {
        default: BroadeningPair,
        by_jlower: HashMap<i64, BroadeningPair>,
        by_pair: HashMap<(i64, i64), BroadeningPair>,
    },
}

impl BroadeningModel {
    /// Build the richest model the table supports.
    ///
    /// Fails when a row carries invalid numbers or the table has neither
    /// `a0` nor `a1` rows.
    pub fn from_table(table: &BroadTable, default: BroadeningPair) -> Result<Self> {
        let mut by_jlower = HashMap::new();
        for row in table.rows_with_code("a0") {
            let pair = checked_pair(row.alpha_ref, row.n_texp, &row.code, row.jlower)?;
            by_jlower.insert(row.jlower, pair);
        }
        let mut by_pair = HashMap::new();
        for row in table.rows_with_code("a1") {
            let pair = checked_pair(row.alpha_ref, row.n_texp, &row.code, row.jlower)?;
            let jupper = row.jupper.ok_or_else(|| {
                LineDbError::InvalidConfig(format!("a1 row for J''={} has no J'", row.jlower))
            })?;
            by_pair.insert((row.jlower, jupper), pair);
        }

        if !by_pair.is_empty() {
            Ok(BroadeningModel::ByJPair {
                default,
                by_jlower,
                by_pair,
            })
        } else if !by_jlower.is_empty() {
            Ok(BroadeningModel::ByJlower { default, by_jlower })
        } else {
            Err(LineDbError::InvalidConfig(
                "broadening table has no a0 or a1 rows".to_string(),
            ))
        }
    }

    pub fn quality(&self) -> BroadeningQuality {
        match self {
            BroadeningModel::Constant(_) => BroadeningQuality::Constant,
            BroadeningModel::ByJlower { .. } => BroadeningQuality::A0,
            BroadeningModel::ByJPair { .. } => BroadeningQuality::A1,
        }
    }

    pub fn resolve(&self, jlower: i64, jupper: i64) -> BroadeningPair {
        match self {
            BroadeningModel::Constant(pair) => *pair,
            BroadeningModel::ByJlower { default, by_jlower } => {
                by_jlower.get(&jlower).copied().unwrap_or(*default)
            }
            BroadeningModel::ByJPair {
                default,
                by_jlower,
                by_pair,
            } => by_pair
                .get(&(jlower, jupper))
                .or_else(|| by_jlower.get(&jlower))
                .copied()
                .unwrap_or(*default),
        }
    }

    /// Resolve every line; returns `(alpha_ref, n_Texp)` columns.
    pub fn resolve_all(&self, jlower: &[i64], jupper: &[i64]) -> (Vec<f64>, Vec<f64>) {
        jlower
            .iter()
            .zip(jupper)
            .map(|(&jl, &ju)| {
                let pair = self.resolve(jl, ju);
                (pair.alpha_ref, pair.n_texp)
            })
            .unzip()
    }
}

fn checked_pair(alpha_ref: f64, n_texp: f64, code: &str, jlower: i64) -> Result<BroadeningPair> {
    let pair = BroadeningPair::new(alpha_ref, n_texp);
    if !pair.is_valid() {
        return Err(LineDbError::InvalidConfig(format!(
            "{code} row for J''={jlower} has alpha_ref={alpha_ref}, n_Texp={n_texp}"
        )));
    }
    Ok(pair)
}

// ---------------------------------------------------------------------------
// Resolution with graceful degradation
// ---------------------------------------------------------------------------

/// The model a database uses, plus the reason it fell back to constant
/// defaults, if it did.
#[derive(Debug, Clone, PartialEq)]
pub struct BroadeningResolution {
    pub model: BroadeningModel,
    pub warning: Option<String>,
}

/// Pick a broadening model for `broad_file`.
///
/// Never fails: a missing, unreadable or invalid file yields
/// [`BroadeningModel::Constant`] and a warning (also logged).
pub fn resolve_broadening(
    broad_file: &Path,
    use_table: bool,
    default: BroadeningPair,
) -> BroadeningResolution {
    if !use_table {
        info!(
            "Using default broadening alpha_ref={}, n_Texp={}",
            default.alpha_ref, default.n_texp
        );
        return BroadeningResolution {
            model: BroadeningModel::Constant(default),
            warning: None,
        };
    }

    let found = find_source(broad_file);
    let loaded = match &found {
        Some(path) => load_model(path, default),
        None => Err(LineDbError::MissingFile(broad_file.to_path_buf())),
    };
    match loaded {
        Ok(model) => {
            let path = found.as_deref().unwrap_or(broad_file);
            info!("Broadening quality {:?} from {}", model.quality(), path.display());
            BroadeningResolution {
                model,
                warning: None,
            }
        }
        Err(e) => {
            let warning = format!(
                "cannot use broadening file {} ({e}); default alpha_ref={}, n_Texp={} applied to every line",
                broad_file.display(),
                default.alpha_ref,
                default.n_texp
            );
            warn!("{warning}");
            BroadeningResolution {
                model: BroadeningModel::Constant(default),
                warning: Some(warning),
            }
        }
    }
}

fn load_model(path: &Path, default: BroadeningPair) -> Result<BroadeningModel> {
    let mut reader = open_source(path)?;
    let table = BroadTable::parse(&mut reader, path)?;
    BroadeningModel::from_table(&table, default)
}
