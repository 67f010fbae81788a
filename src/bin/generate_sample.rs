use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use arrow::util::pretty::pretty_format_batches;
use flate2::write::GzEncoder;
use flate2::Compression;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use linedb::{ExomolDatabase, LoadOptions};

const N_STATES: usize = 400;
const N_TRANS: usize = 5000;
const MAX_NU: f64 = 4000.0;
const N_PARTITIONS: usize = 4;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
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

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn below(&mut self, n: usize) -> usize {
        (self.next_u64() % n as u64) as usize
    }
}

/// Write a small rigid-rotor-like ExoMol dataset, transitions split into
/// `N_PARTITIONS` gzip files.
fn write_archive(dir: &Path, rng: &mut SimpleRng) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let stem = dir.join("12C-16O__Sample");

    std::fs::write(
        stem.with_extension("def"),
        format!(
            "EXOMOL.def       # ID\n\
             27.994915        # Isotopologue mass (Da) and (kg)\n\
             {MAX_NU:.1}           # Maximum wavenumber (in cm-1)\n\
             {N_PARTITIONS}                # No. of transition files\n\
             0.0700           # Default value of Lorentzian half-width for all lines (in cm-1/bar)\n\
             0.500            # Default value of temperature exponent for all lines\n"
        ),
    )?;

    let mut pf = String::new();
    for t in (100..=5000).step_by(100) {
        let q = 0.3627 * t as f64 + 0.33;
        pf.push_str(&format!("{t:8.1} {q:12.4}\n"));
    }
    std::fs::write(stem.with_extension("pf"), pf)?;

    // Energies grow quadratically with J, with some jitter.
    let mut states = String::new();
    let mut energy = Vec::with_capacity(N_STATES);
    for id in 1..=N_STATES {
        let j = (id - 1) / 4;
        let e = 1.9225 * (j * (j + 1)) as f64 + 2143.0 * ((id - 1) % 4) as f64 + rng.next_f64();
        energy.push(e);
        states.push_str(&format!("{id:6} {e:12.6} {:6} {j:7}\n", 2 * j + 1));
    }
    std::fs::write(stem.with_extension("states"), states)?;

    let width = MAX_NU / N_PARTITIONS as f64;
    let mut files: Vec<GzEncoder<File>> = (0..N_PARTITIONS)
        .map(|k| {
            let lo = (width * k as f64) as i64;
            let hi = (width * (k + 1) as f64) as i64;
            let path = dir.join(format!("12C-16O__Sample__{lo:05}-{hi:05}.trans.gz"));
            File::create(&path)
                .map(|f| GzEncoder::new(f, Compression::default()))
                .with_context(|| format!("creating {}", path.display()))
        })
        .collect::<Result<_>>()?;

    let mut written = 0;
    while written < N_TRANS {
        let (u, l) = (rng.below(N_STATES), rng.below(N_STATES));
        let nu = energy[u] - energy[l];
        if nu <= 0.0 || nu >= MAX_NU {
            continue;
        }
        let a = 10f64.powf(-3.0 + 4.0 * rng.next_f64());
        let k = ((nu / width) as usize).min(N_PARTITIONS - 1);
        writeln!(files[k], "{:12} {:12} {a:10.4e}", u + 1, l + 1)?;
        written += 1;
    }
    for f in files {
        f.finish()?;
    }
    Ok(())
}

fn preview(cache: &Path) -> Result<String> {
    let file = File::open(cache).with_context(|| format!("opening {}", cache.display()))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?
        .with_batch_size(8)
        .build()?;
    let first = reader.take(1).collect::<Result<Vec<_>, _>>()?;
    Ok(pretty_format_batches(&first)?.to_string())
}

fn main() -> Result<()> {
    env_logger::init();

    let dir: PathBuf = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("sample_db/CO/12C-16O/Sample"));

    let mut rng = SimpleRng::new(42);
    write_archive(&dir, &mut rng)?;
    println!("Wrote synthetic ExoMol dataset to {}", dir.display());

    let options = LoadOptions::default()
        .with_nurange(1500.0, 2500.0)
        .with_margin(10.0)
        .with_crit(1e-30);

    let start = Instant::now();
    let db = ExomolDatabase::open(&dir, options.clone())?;
    println!("Cold load: {} lines in {:?}", db.len(), start.elapsed());

    let start = Instant::now();
    let cached = ExomolDatabase::open(&dir, options)?;
    println!("Cached load: {} lines in {:?}", cached.len(), start.elapsed());
    anyhow::ensure!(db.nu_lines() == cached.nu_lines(), "cached load differs from cold load");

    let cache = dir.join("12C-16O__Sample__01000-02000.trans.parquet");
    println!("{}", preview(&cache)?);

    let csv = dir.join("selected_lines.csv");
    db.table().write_csv(&csv)?;
    println!("Wrote {} selected lines to {}", db.len(), csv.display());
    Ok(())
}
