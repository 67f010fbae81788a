use serde::{Deserialize, Serialize};

/// Reference temperature of the HITRAN/ExoMol line-strength convention (K).
pub const TREF: f64 = 296.0;

/// Second radiation constant c2 = hc/k (cm K).
pub const HCPERK: f64 = 1.4387773538277202;

/// Speed of light (cm/s).
pub const CCGS: f64 = 29979245800.0;

/// Elementary charge (esu).
pub const ECGS: f64 = 4.803204712570263e-10;

/// Electron mass (g).
pub const MECGS: f64 = 9.1093837015e-28;

/// 1 eV expressed in cm-1.
pub const EV_TO_WAVENUMBER: f64 = 8065.543937;

/// Fallback Lorentzian half-width when the `.def` file carries none (cm-1/bar).
pub const ALPHA_REF_DEFAULT: f64 = 0.07;

/// Fallback temperature exponent when the `.def` file carries none.
pub const N_TEXP_DEFAULT: f64 = 0.5;

// ---------------------------------------------------------------------------
// RefConstants – physical context threaded through the derivations
// ---------------------------------------------------------------------------

/// Reference temperature and physical constants used by every strength
/// derivation. Carried explicitly by [`crate::config::LoadOptions`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefConstants {
    /// Reference temperature of `Sij0` (K).
    pub tref: f64,
    /// hc/k (cm K).
    pub hcperk: f64,
    /// Speed of light (cm/s).
    pub ccgs: f64,
}

impl Default for RefConstants {
    fn default() -> Self {
        Self {
            tref: TREF,
            hcperk: HCPERK,
            ccgs: CCGS,
        }
    }
}

impl RefConstants {
    /// Natural broadening half-width (cm-1) from an Einstein A coefficient.
    pub fn gamma_natural(&self, a: f64) -> f64 {
        a / (4.0 * std::f64::consts::PI * self.ccgs)
    }

    /// 8 pi^2 e^2 / (m_e c): converts `gf * nu^2 / g_upper` into A (s-1).
    pub fn gf_to_a_factor(&self) -> f64 {
        8.0 * std::f64::consts::PI.powi(2) * ECGS.powi(2) / (MECGS * self.ccgs)
    }
}
