#![allow(dead_code)]

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use linedb::constants::RefConstants;
use linedb::derive::reference_strength;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Replace `path` by `path.bz2`, the way ExoMol and HITEMP publish files.
pub fn bzip2_in_place(path: &Path) -> PathBuf {
    use std::io::Write;

    let text = std::fs::read(path).unwrap();
    let packed = PathBuf::from(format!("{}.bz2", path.display()));
    let mut encoder = bzip2::write::BzEncoder::new(
        std::fs::File::create(&packed).unwrap(),
        bzip2::Compression::default(),
    );
    encoder.write_all(&text).unwrap();
    encoder.finish().unwrap();
    std::fs::remove_file(path).unwrap();
    packed
}

// ---------------------------------------------------------------------------
// ExoMol fixtures
// ---------------------------------------------------------------------------

/// One synthetic transition: wavenumber, lower-state energy and the
/// reference strength the Einstein A is tuned to produce (Q = 1).
#[derive(Debug, Clone, Copy)]
pub struct SynthLine {
    pub nu: f64,
    pub elower: f64,
    pub sij0: f64,
}

impl SynthLine {
    pub fn ground(nu: f64, sij0: f64) -> Self {
        Self { nu, elower: 0.0, sij0 }
    }
}

pub const ISOTOPOLOGUE: &str = "12C-16O";
pub const DATASET: &str = "Synth";
const G_UPPER: f64 = 3.0;

pub fn dataset_dir(root: &Path) -> PathBuf {
    root.join("CO").join(ISOTOPOLOGUE).join(DATASET)
}

fn stem(dir: &Path) -> String {
    dir.join(format!("{ISOTOPOLOGUE}__{DATASET}"))
        .to_string_lossy()
        .into_owned()
}

/// Write `.def`, `.pf`, `.states` and either one `.trans` file or
/// `n` partition files of `[0, max_nu]`. Returns the dataset directory.
///
/// Each line gets its own lower and upper state so wavenumbers come out
/// exactly as requested. Q(T) = 1 at every temperature.
pub fn write_exomol(root: &Path, lines: &[SynthLine], partitions: Option<(f64, usize)>) -> PathBuf {
    let dir = dataset_dir(root);
    std::fs::create_dir_all(&dir).unwrap();
    let stem = stem(&dir);

    let (max_nu, n_files) = partitions.unwrap_or((0.0, 1));
    std::fs::write(
        format!("{stem}.def"),
        format!(
            "EXOMOL.def   # ID\n\
             27.994915    # Isotopologue mass (Da) and (kg)\n\
             {max_nu:.1}  # Maximum wavenumber (in cm-1)\n\
             {n_files}    # No. of transition files\n\
             0.0700       # Default value of Lorentzian half-width for all lines (in cm-1/bar)\n\
             0.500        # Default value of temperature exponent for all lines\n"
        ),
    )
    .unwrap();
    std::fs::write(format!("{stem}.pf"), "   50.0  1.0\n  296.0  1.0\n 5000.0  1.0\n").unwrap();

    let c = RefConstants::default();
    let mut states = String::new();
    let mut trans: Vec<(f64, String)> = Vec::new();
    for (k, line) in lines.iter().enumerate() {
        let lower = 2 * k + 1;
        let upper = 2 * k + 2;
        writeln!(states, "{lower:8} {:20.12} {:4} {:4}", line.elower, 1, 0).unwrap();
        writeln!(states, "{upper:8} {:20.12} {:4} {:4}", line.elower + line.nu, G_UPPER, 1).unwrap();
        let unit = reference_strength(&c, 1.0, G_UPPER, line.nu, line.elower, 1.0);
        // Non-positive wavenumbers have no defined strength; any A will do.
        let a = if unit.is_finite() { line.sij0 / unit } else { 1.0 };
        trans.push((line.nu, format!("{upper:8} {lower:8} {a:.17e}\n")));
    }
    std::fs::write(format!("{stem}.states"), states).unwrap();

    match partitions {
        None => {
            let body: String = trans.iter().map(|t| t.1.as_str()).collect();
            std::fs::write(format!("{stem}.trans"), body).unwrap();
        }
        Some((max_nu, n)) => {
            let width = max_nu / n as f64;
            for p in 0..n {
                let lo = width * p as f64;
                let hi = width * (p + 1) as f64;
                let body: String = trans
                    .iter()
                    .filter(|(nu, _)| *nu >= lo && (*nu < hi || p == n - 1))
                    .map(|t| t.1.as_str())
                    .collect();
                std::fs::write(
                    format!("{stem}__{:05}-{:05}.trans", lo as i64, hi as i64),
                    body,
                )
                .unwrap();
            }
        }
    }
    dir
}

pub fn trans_path(dir: &Path, tag: Option<&str>) -> PathBuf {
    match tag {
        Some(tag) => PathBuf::from(format!("{}__{tag}.trans", stem(dir))),
        None => PathBuf::from(format!("{}.trans", stem(dir))),
    }
}

pub fn states_path(dir: &Path) -> PathBuf {
    PathBuf::from(format!("{}.states", stem(dir)))
}

pub fn broad_path(dir: &Path, bkgdatm: &str) -> PathBuf {
    dir.join(format!("{ISOTOPOLOGUE}__{bkgdatm}.broad"))
}

// ---------------------------------------------------------------------------
// Seeded synthetic line lists
// ---------------------------------------------------------------------------

/// xoshiro256**
pub struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    pub fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    pub fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }
}

/// `n` lines in `(0, max_nu)`, strengths spread over 1e-32 .. 1e-20 and
/// lower energies up to 3000 cm-1.
pub fn random_lines(seed: u64, n: usize, max_nu: f64) -> Vec<SynthLine> {
    let mut rng = SimpleRng::new(seed);
    (0..n)
        .map(|_| SynthLine {
            nu: 1.0 + (max_nu - 2.0) * rng.next_f64(),
            elower: 3000.0 * rng.next_f64(),
            sij0: 10f64.powf(-32.0 + 12.0 * rng.next_f64()),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// HITRAN fixtures
// ---------------------------------------------------------------------------

/// One 160-character `.par` record.
pub fn par_record(mol: u32, iso: char, nu: f64, sw: f64, elower: f64) -> String {
    let head = format!("{mol:2}{iso}{nu:12.6}{sw:10.3e}{:10.3e}{:>5}{:5.3}", 1.0e-1, ".0705", 0.08);
    let head = format!("{head}{elower:10.4}{:4.2}{:8.5}", 0.75, -0.003);
    assert_eq!(head.len(), 67);
    let record = format!("{head}{:>60}{:<19}{:7.1}{:7.1}", "", "", 3.0, 1.0);
    assert_eq!(record.len(), 160);
    record
}

pub fn write_isotope_pf(path: &Path, points: &[(f64, f64)]) {
    let body: String = points.iter().map(|(t, q)| format!("{t:10.1} {q:14.6}\n")).collect();
    std::fs::write(path, body).unwrap();
}

// ---------------------------------------------------------------------------
// Atomic fixtures
// ---------------------------------------------------------------------------

/// Barklem-style table with Fe 1, Fe 2 and Ca 1 rows.
pub fn write_species_pf(path: &Path) {
    std::fs::write(
        path,
        "# partition functions\n\
         T[K]    1000.0  3000.0  5000.0  8000.0\n\
         Fe_I      25.0    28.0    33.0    45.0\n\
         Fe_II     40.0    44.0    50.0    60.0\n\
         Ca_I       1.0     1.1     1.5     3.0\n\
         CO         1.0     2.0     3.0     4.0\n",
    )
    .unwrap();
}

/// One VALD3 long-format record (4 lines).
pub fn vald_record(species: &str, wl_air: f64, loggf: f64, elow_ev: f64, jlo: f64, eup_ev: f64, jup: f64) -> String {
    format!(
        "'{species}',{wl_air:16.4},{loggf:8.3},{elow_ev:8.4},{jlo:5.1},{eup_ev:8.4},{jup:5.1},\
         1.340,1.260,1.460, 8.320,-5.440,-7.230,\n\
         '  LS                                                 3d6.(5D).4s.4p z3F*'\n\
         '  LS                                                 3d6.(5D).4s.5s e3D'\n\
         '_          Kurucz Fe I 2007   1 wl:K07   1 gf:K07   1 K07   1 K07   1 K07'\n"
    )
}

pub fn write_vald(path: &Path, records: &[String]) {
    let mut body = String::from(
        "                                                                   Lande factors      Damping parameters\n\
         Elm Ion       WL_air(A)  log gf* E_low(eV) J lo  E_up(eV) J up  lower  upper   mean   Rad.  Stark  Waals\n",
    );
    for r in records {
        body.push_str(r);
    }
    body.push_str("* oscillator strengths were scaled by the solar isotopic ratios.\n");
    std::fs::write(path, body).unwrap();
}
