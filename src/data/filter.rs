use crate::config::LoadOptions;

// ---------------------------------------------------------------------------
// Selection predicate: wavenumber window + strength floor
// ---------------------------------------------------------------------------

/// The line selection shared by the pre-cache and post-merge filters.
///
/// A line passes when:
/// * its wavenumber lies strictly inside `(lo, hi)` (margin already applied)
/// * its typical-temperature strength is strictly greater than `crit`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Selection {
    pub lo: f64,
    pub hi: f64,
    pub crit: f64,
}

impl Selection {
    pub fn from_options(options: &LoadOptions) -> Self {
        let (lo, hi) = options.bounds();
        Self {
            lo,
            hi,
            crit: options.crit,
        }
    }

    /// Keep everything with a positive strength.
    pub fn unbounded() -> Self {
        Self {
            lo: f64::NEG_INFINITY,
            hi: f64::INFINITY,
            crit: 0.0,
        }
    }

    pub fn accepts(&self, nu: f64, strength_typ: f64) -> bool {
        nu > self.lo && nu < self.hi && strength_typ > self.crit
    }

    /// Mask over parallel `nu` / `strength_typ` slices.
    pub fn mask(&self, nu: &[f64], strength_typ: &[f64]) -> Vec<bool> {
        nu.iter()
            .zip(strength_typ)
            .map(|(&n, &s)| self.accepts(n, s))
            .collect()
    }

    pub fn range_mask(&self, nu: &[f64]) -> Vec<bool> {
        nu.iter().map(|&n| n > self.lo && n < self.hi).collect()
    }
}

/// Element-wise AND of two masks of equal length.
pub fn combine(a: &[bool], b: &[bool]) -> Vec<bool> {
    a.iter().zip(b).map(|(&x, &y)| x && y).collect()
}

/// Indices of the rows a mask keeps.
pub fn mask_indices(mask: &[bool]) -> Vec<usize> {
    mask.iter()
        .enumerate()
        .filter(|(_, &keep)| keep)
        .map(|(i, _)| i)
        .collect()
}
