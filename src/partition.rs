//! Temperature → partition function lookups.

use std::io::BufRead;
use std::path::Path;

use log::debug;

use crate::error::{LineDbError, Result};
use crate::formats::{open_source, parse_f64};
use crate::species::SpeciesKey;

// ---------------------------------------------------------------------------
// PartitionGrid – one species
// ---------------------------------------------------------------------------

/// Ascending `(T, Q)` grid of one species or isotopologue.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionGrid {
    t: Vec<f64>,
    q: Vec<f64>,
}

impl PartitionGrid {
    pub fn new(t: Vec<f64>, q: Vec<f64>) -> Result<Self> {
        if t.len() != q.len() || t.len() < 2 {
            return Err(LineDbError::InvalidConfig(format!(
                "partition grid needs at least two (T, Q) pairs, got {} temperatures and {} values",
                t.len(),
                q.len()
            )));
        }
        if t.windows(2).any(|w| !(w[0] < w[1])) {
            return Err(LineDbError::InvalidConfig(
                "partition grid temperatures must be strictly ascending".to_string(),
            ));
        }
        Ok(Self { t, q })
    }

    /// Two whitespace-separated columns `T Q`; `#` starts a comment line.
    pub fn parse(reader: &mut dyn BufRead, path: &Path) -> Result<Self> {
        const FORMAT: &str = "partition function";
        let mut t = Vec::new();
        let mut q = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| LineDbError::io(path, e))?;
            let lineno = idx + 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut tokens = line.split_whitespace();
            let (Some(tt), Some(qq)) = (tokens.next(), tokens.next()) else {
                return Err(LineDbError::parse(FORMAT, path, lineno, "expected 'T Q'"));
            };
            t.push(parse_f64(tt, "T", FORMAT, path, lineno)?);
            q.push(parse_f64(qq, "Q", FORMAT, path, lineno)?);
        }
        Self::new(t, q).map_err(|e| LineDbError::parse(FORMAT, path, 0, e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let mut reader = open_source(path)?;
        Self::parse(&mut reader, path)
    }

    pub fn temperatures(&self) -> &[f64] {
        &self.t
    }

    pub fn values(&self) -> &[f64] {
        &self.q
    }

    pub fn bounds(&self) -> (f64, f64) {
        (self.t[0], self.t[self.t.len() - 1])
    }

    /// Linear interpolation; the end segments are extended outside the grid.
    pub fn interpolate(&self, temperature: f64) -> f64 {
        interpolate_linear(&self.t, &self.q, temperature)
    }

    /// `Q(T) / Q(Tref)`.
    pub fn ratio(&self, temperature: f64, tref: f64) -> f64 {
        self.interpolate(temperature) / self.interpolate(tref)
    }

    /// Like [`interpolate`](Self::interpolate) but refuses temperatures
    /// outside the tabulated range.
    pub fn interpolate_strict(&self, temperature: f64, label: &str) -> Result<f64> {
        let (min, max) = self.bounds();
        if !(temperature >= min && temperature <= max) {
            return Err(LineDbError::TemperatureOutOfRange {
                label: label.to_string(),
                temperature,
                min,
                max,
            });
        }
        Ok(self.interpolate(temperature))
    }
}

/// Piecewise-linear interpolation on an ascending grid of at least two
/// points, extrapolating with the first / last segment.
pub(crate) fn interpolate_linear(x: &[f64], y: &[f64], at: f64) -> f64 {
    let n = x.len();
    let upper = x.partition_point(|&v| v <= at).clamp(1, n - 1);
    let (x0, x1) = (x[upper - 1], x[upper]);
    let (y0, y1) = (y[upper - 1], y[upper]);
    y0 + (y1 - y0) * (at - x0) / (x1 - x0)
}

// ---------------------------------------------------------------------------
// SpeciesPartitionTable – many atomic species on one temperature grid
// ---------------------------------------------------------------------------

/// Multi-species table in the Barklem & Collet (2016) layout:
///
/// ```text
/// T[K]     1.00000e-05 1.00000e-04 ...  1.00000e+04
/// H_I      2.00000e+00 2.00000e+00 ...  2.00000e+00
/// Fe_I     9.00000e+00 9.00000e+00 ...  3.34000e+01
/// ```
///
/// Lines starting with `#` are comments. Rows whose label is not an
/// element/ionisation pair (e.g. molecules) are kept but cannot be looked
/// up by [`SpeciesKey`].
#[derive(Debug, Clone, PartialEq)]
pub struct SpeciesPartitionTable {
    temperatures: Vec<f64>,
    labels: Vec<String>,
    keys: Vec<Option<SpeciesKey>>,
    rows: Vec<Vec<f64>>,
}

impl SpeciesPartitionTable {
    pub fn parse(reader: &mut dyn BufRead, path: &Path) -> Result<Self> {
        const FORMAT: &str = "species partition table";
        let mut temperatures: Option<Vec<f64>> = None;
        let mut labels = Vec::new();
        let mut keys = Vec::new();
        let mut rows = Vec::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| LineDbError::io(path, e))?;
            let lineno = idx + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let mut tokens = trimmed.split_whitespace();
            let label = tokens.next().unwrap_or_default();
            let values = tokens
                .map(|t| parse_f64(t, "value", FORMAT, path, lineno))
                .collect::<Result<Vec<f64>>>()?;

            let Some(grid) = &temperatures else {
                if values.len() < 2 {
                    return Err(LineDbError::parse(
                        FORMAT,
                        path,
                        lineno,
                        "header must list at least two temperatures",
                    ));
                }
                temperatures = Some(values);
                continue;
            };
            if values.len() != grid.len() {
                return Err(LineDbError::parse(
                    FORMAT,
                    path,
                    lineno,
                    format!("{label}: {} values for {} temperatures", values.len(), grid.len()),
                ));
            }
            let key = SpeciesKey::parse(label);
            if key.is_none() {
                debug!("{}: row '{label}' is not an atomic species", path.display());
            }
            labels.push(label.to_string());
            keys.push(key);
            rows.push(values);
        }

        let temperatures = temperatures
            .ok_or_else(|| LineDbError::parse(FORMAT, path, 0, "missing temperature header"))?;
        if temperatures.windows(2).any(|w| !(w[0] < w[1])) {
            return Err(LineDbError::parse(
                FORMAT,
                path,
                0,
                "temperatures must be strictly ascending",
            ));
        }
        Ok(Self {
            temperatures,
            labels,
            keys,
            rows,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let mut reader = open_source(path)?;
        Self::parse(&mut reader, path)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn temperatures(&self) -> &[f64] {
        &self.temperatures
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Row of `key`; an unlisted species is a configuration error.
    pub fn species_index(&self, key: SpeciesKey) -> Result<usize> {
        self.keys
            .iter()
            .position(|k| *k == Some(key))
            .ok_or_else(|| LineDbError::UnknownSpecies(key.to_string()))
    }

    /// Q of the species in row `index`.
    pub fn interpolate_species(&self, index: usize, temperature: f64) -> f64 {
        interpolate_linear(&self.temperatures, &self.rows[index], temperature)
    }

    /// Q of every row at one temperature.
    pub fn interpolate_all(&self, temperature: f64) -> Vec<f64> {
        self.rows
            .iter()
            .map(|row| interpolate_linear(&self.temperatures, row, temperature))
            .collect()
    }
}
