use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::RefConstants;
use crate::error::{LineDbError, Result};

/// Construction parameters shared by every database facade.
///
/// Every field has a default, so a JSON file only needs to list what it
/// overrides:
///
/// ```json
/// { "nurange": [4000.0, 4100.0], "crit": 1e-30, "ttyp": 1500.0 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Wavenumber bounds `[min, max]` (cm-1). `None` keeps every line.
    pub nurange: Option<[f64; 2]>,
    /// Padding applied symmetrically to `nurange` (cm-1).
    pub margin: f64,
    /// Lower bound on the typical-temperature line strength.
    pub crit: f64,
    /// Temperature used for the strength filter (K).
    pub ttyp: f64,
    /// Background broadening partner for ExoMol `.broad` files.
    pub bkgdatm: String,
    /// Consult per-line broadening tables instead of constant defaults.
    pub broadf: bool,
    /// Delete decompressed intermediates once the cache is written.
    pub remove_intermediate: bool,
    /// Materialize the [`crate::db::DeviceArrays`] snapshot.
    pub device_arrays: bool,
    pub constants: RefConstants,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            nurange: None,
            margin: 0.0,
            crit: 0.0,
            ttyp: 1000.0,
            bkgdatm: "H2".to_string(),
            broadf: true,
            remove_intermediate: true,
            device_arrays: true,
            constants: RefConstants::default(),
        }
    }
}

impl LoadOptions {
    /// Read options from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| LineDbError::io(path, e))?;
        let options: LoadOptions =
            serde_json::from_str(&text).map_err(|source| LineDbError::Config {
                path: path.to_path_buf(),
                source,
            })?;
        options.validate()?;
        Ok(options)
    }

    pub fn with_nurange(mut self, lo: f64, hi: f64) -> Self {
        self.nurange = Some([lo.min(hi), lo.max(hi)]);
        self
    }

    /// Use the extent of a wavenumber grid as `nurange`.
    pub fn with_grid(mut self, grid: &[f64]) -> Self {
        let lo = grid.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = grid.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        self.nurange = if lo <= hi { Some([lo, hi]) } else { None };
        self
    }

    pub fn with_margin(mut self, margin: f64) -> Self {
        self.margin = margin;
        self
    }

    pub fn with_crit(mut self, crit: f64) -> Self {
        self.crit = crit;
        self
    }

    pub fn with_ttyp(mut self, ttyp: f64) -> Self {
        self.ttyp = ttyp;
        self
    }

    /// The requested range widened by `margin`.
    pub fn bounds(&self) -> (f64, f64) {
        match self.nurange {
            Some([lo, hi]) => (lo - self.margin, hi + self.margin),
            None => (f64::NEG_INFINITY, f64::INFINITY),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.ttyp > 0.0) {
            return Err(LineDbError::InvalidConfig(format!(
                "ttyp must be positive, got {}",
                self.ttyp
            )));
        }
        if !(self.constants.tref > 0.0) {
            return Err(LineDbError::InvalidConfig(format!(
                "tref must be positive, got {}",
                self.constants.tref
            )));
        }
        if self.margin < 0.0 || self.margin.is_nan() {
            return Err(LineDbError::InvalidConfig(format!(
                "margin must be non-negative, got {}",
                self.margin
            )));
        }
        if let Some([lo, hi]) = self.nurange {
            if lo.is_nan() || hi.is_nan() || lo > hi {
                return Err(LineDbError::InvalidConfig(format!(
                    "nurange must be [min, max], got [{lo}, {hi}]"
                )));
            }
        }
        Ok(())
    }
}
