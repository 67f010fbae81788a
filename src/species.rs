//! Element symbols, masses and atomic species keys.

use std::fmt;

/// Symbol and standard atomic mass (u) of Z = 1..=92.
pub const ELEMENTS: [(&str, f64); 92] = [
    ("H", 1.008),
    ("He", 4.0026),
    ("Li", 6.94),
    ("Be", 9.0122),
    ("B", 10.81),
    ("C", 12.011),
    ("N", 14.007),
    ("O", 15.999),
    ("F", 18.998),
    ("Ne", 20.180),
    ("Na", 22.990),
    ("Mg", 24.305),
    ("Al", 26.982),
    ("Si", 28.085),
    ("P", 30.974),
    ("S", 32.06),
    ("Cl", 35.45),
    ("Ar", 39.948),
    ("K", 39.098),
    ("Ca", 40.078),
    ("Sc", 44.956),
    ("Ti", 47.867),
    ("V", 50.942),
    ("Cr", 51.996),
    ("Mn", 54.938),
    ("Fe", 55.845),
    ("Co", 58.933),
    ("Ni", 58.693),
    ("Cu", 63.546),
    ("Zn", 65.38),
    ("Ga", 69.723),
    ("Ge", 72.630),
    ("As", 74.922),
    ("Se", 78.971),
    ("Br", 79.904),
    ("Kr", 83.798),
    ("Rb", 85.468),
    ("Sr", 87.62),
    ("Y", 88.906),
    ("Zr", 91.224),
    ("Nb", 92.906),
    ("Mo", 95.95),
    ("Tc", 98.0),
    ("Ru", 101.07),
    ("Rh", 102.91),
    ("Pd", 106.42),
    ("Ag", 107.87),
    ("Cd", 112.41),
    ("In", 114.82),
    ("Sn", 118.71),
    ("Sb", 121.76),
    ("Te", 127.60),
    ("I", 126.90),
    ("Xe", 131.29),
    ("Cs", 132.91),
    ("Ba", 137.33),
    ("La", 138.91),
    ("Ce", 140.12),
    ("Pr", 140.91),
    ("Nd", 144.24),
    ("Pm", 145.0),
    ("Sm", 150.36),
    ("Eu", 151.96),
    ("Gd", 157.25),
    ("Tb", 158.93),
    ("Dy", 162.50),
    ("Ho", 164.93),
    ("Er", 167.26),
    ("Tm", 168.93),
    ("Yb", 173.05),
    ("Lu", 174.97),
    ("Hf", 178.49),
    ("Ta", 180.95),
    ("W", 183.84),
    ("Re", 186.21),
    ("Os", 190.23),
    ("Ir", 192.22),
    ("Pt", 195.08),
    ("Au", 196.97),
    ("Hg", 200.59),
    ("Tl", 204.38),
    ("Pb", 207.2),
    ("Bi", 208.98),
    ("Po", 209.0),
    ("At", 210.0),
    ("Rn", 222.0),
    ("Fr", 223.0),
    ("Ra", 226.0),
    ("Ac", 227.0),
    ("Th", 232.04),
    ("Pa", 231.04),
    ("U", 238.03),
];

/// First ionisation energy (eV) of Z = 1..=92, NIST ASD.
const FIRST_IONISATION_EV: [f64; 92] = [
    13.598, 24.587, 5.392, 9.323, 8.298, 11.260, 14.534, 13.618, 17.423, 21.565,
    5.139, 7.646, 5.986, 8.152, 10.487, 10.360, 12.968, 15.760, 4.341, 6.113,
    6.561, 6.828, 6.746, 6.767, 7.434, 7.902, 7.881, 7.640, 7.726, 9.394,
    5.999, 7.899, 9.789, 9.752, 11.814, 14.000, 4.177, 5.695, 6.217, 6.634,
    6.759, 7.092, 7.119, 7.361, 7.459, 8.337, 7.576, 8.994, 5.786, 7.344,
    8.608, 9.010, 10.451, 12.130, 3.894, 5.212, 5.577, 5.539, 5.473, 5.525,
    5.582, 5.644, 5.670, 6.150, 5.864, 5.939, 6.022, 6.108, 6.184, 6.254,
    5.426, 6.825, 7.550, 7.864, 7.834, 8.438, 8.967, 8.959, 9.226, 10.438,
    6.108, 7.417, 7.286, 8.414, 9.318, 10.749, 4.073, 5.278, 5.380, 6.307,
    5.890, 6.194,
];

/// Second ionisation energy (eV) of Z = 1..=30, NIST ASD. NaN for hydrogen.
const SECOND_IONISATION_EV: [f64; 30] = [
    f64::NAN, 54.418, 75.640, 18.211, 25.155, 24.383, 29.601, 35.121, 34.971, 40.963,
    47.286, 15.035, 18.829, 16.346, 19.770, 23.338, 23.814, 27.630, 31.625, 11.872,
    12.800, 13.576, 14.618, 16.486, 15.640, 16.199, 17.084, 18.169, 20.292, 17.964,
];

/// Solar abundance `log10(N_X / N_H) + 12` of Z = 1..=92 (Asplund et al.
/// 2009: photospheric, meteoritic where no photospheric value exists).
/// NaN for elements without a measurement.
const SOLAR_ABUNDANCE: [f64; 92] = [
    12.00, 10.93, 1.05, 1.38, 2.70, 8.43, 7.83, 8.69, 4.56, 7.93,
    6.24, 7.60, 6.45, 7.51, 5.41, 7.12, 5.50, 6.40, 5.03, 6.34,
    3.15, 4.95, 3.93, 5.64, 5.43, 7.50, 4.99, 6.22, 4.19, 4.56,
    3.04, 3.65, 2.30, 3.34, 2.54, 3.25, 2.52, 2.87, 2.21, 2.58,
    1.46, 1.88, f64::NAN, 1.75, 0.91, 1.57, 0.94, 1.71, 0.80, 2.04,
    1.01, 2.18, 1.55, 2.24, 1.08, 2.18, 1.10, 1.58, 0.72, 1.42,
    f64::NAN, 0.96, 0.52, 1.07, 0.30, 1.10, 0.48, 0.92, 0.10, 0.84,
    0.10, 0.85, -0.12, 0.85, 0.26, 1.40, 1.38, 1.62, 0.92, 1.17,
    0.90, 1.75, 0.65, f64::NAN, f64::NAN, f64::NAN, f64::NAN, f64::NAN, f64::NAN, 0.02,
    f64::NAN, -0.54,
];

/// Atomic number of an element symbol (case-sensitive).
pub fn atomic_number(symbol: &str) -> Option<u32> {
    ELEMENTS
        .iter()
        .position(|(s, _)| *s == symbol)
        .map(|i| i as u32 + 1)
}

pub fn atomic_mass(ielem: u32) -> Option<f64> {
    let idx = (ielem as usize).checked_sub(1)?;
    ELEMENTS.get(idx).map(|(_, m)| *m)
}

/// Solar abundance on the `log eps` scale (H = 12).
pub fn solar_abundance(ielem: u32) -> Option<f64> {
    let idx = (ielem as usize).checked_sub(1)?;
    SOLAR_ABUNDANCE.get(idx).copied().filter(|v| v.is_finite())
}

// ---------------------------------------------------------------------------
// SpeciesKey
// ---------------------------------------------------------------------------

/// Element and ionisation stage (1 = neutral, 2 = singly ionised, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpeciesKey {
    pub ielem: u32,
    pub iion: u32,
}

impl SpeciesKey {
    pub fn new(ielem: u32, iion: u32) -> Option<Self> {
        let valid = (1..=ELEMENTS.len() as u32).contains(&ielem) && iion >= 1;
        valid.then_some(Self { ielem, iion })
    }

    /// From the integer `ielem` / `iion` line columns.
    pub fn from_columns(ielem: i64, iion: i64) -> Option<Self> {
        Self::new(u32::try_from(ielem).ok()?, u32::try_from(iion).ok()?)
    }

    /// `"Fe 1"` (VALD style) or `"Fe_I"` (partition table style).
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if let Some((symbol, ion)) = text.split_once(' ') {
            return Self::new(atomic_number(symbol)?, ion.trim().parse().ok()?);
        }
        let (symbol, roman) = text.split_once('_')?;
        if roman.is_empty() || !roman.chars().all(|c| c == 'I') {
            return None;
        }
        Self::new(atomic_number(symbol)?, roman.len() as u32)
    }

    pub fn symbol(&self) -> &'static str {
        ELEMENTS[self.ielem as usize - 1].0
    }

    pub fn mass(&self) -> f64 {
        ELEMENTS[self.ielem as usize - 1].1
    }

    /// Energy (eV) to remove one more electron from this species: the first
    /// ionisation energy for a neutral atom, the second for a singly
    /// ionised one. `None` beyond the tabulated stages.
    pub fn ionisation_energy(&self) -> Option<f64> {
        let idx = self.ielem as usize - 1;
        let table: &[f64] = match self.iion {
            1 => &FIRST_IONISATION_EV,
            2 => &SECOND_IONISATION_EV,
            _ => return None,
        };
        table.get(idx).copied().filter(|v| v.is_finite())
    }

    /// Row label of the partition table: `Fe_I`, `Fe_II`.
    pub fn table_label(&self) -> String {
        format!("{}_{}", self.symbol(), "I".repeat(self.iion as usize))
    }
}

impl fmt::Display for SpeciesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.symbol(), self.iion)
    }
}
