mod common;

use std::cell::Cell;
use std::io::Write;
use std::path::{Path, PathBuf};

use common::*;
use flate2::write::GzEncoder;
use flate2::Compression;
use linedb::broadening::BroadeningQuality;
use linedb::data::cache::LineCache;
use linedb::data::table::ColumnData;
use linedb::provision::{FetchOutcome, FileProvider, Offline, RemoteLayout};
use linedb::{Column, ExomolDatabase, LineDbError, LineTable, LoadOptions};

fn at_tref() -> LoadOptions {
    LoadOptions::default().with_ttyp(296.0)
}

fn five_lines() -> Vec<SynthLine> {
    vec![
        SynthLine::ground(100.0, 1e-30),
        SynthLine::ground(200.0, 1e-25),
        SynthLine::ground(300.0, 1e-20),
        SynthLine::ground(400.0, 1e-25),
        SynthLine::ground(500.0, 1e-30),
    ]
}

fn rel(a: f64, b: f64) -> f64 {
    ((a - b) / b).abs()
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

#[test]
fn test_end_to_end_five_lines() {
    init_logger();
    let root = tempfile::tempdir().unwrap();
    let dir = write_exomol(root.path(), &five_lines(), None);

    let options = at_tref().with_nurange(150.0, 450.0).with_crit(1e-26);
    let db = ExomolDatabase::open(&dir, options).unwrap();

    assert_eq!(db.nu_lines(), &[200.0, 300.0, 400.0]);
    assert_eq!(db.len(), 3);
    for (s, expected) in db.sij0().iter().zip([1e-25, 1e-20, 1e-25]) {
        assert!(rel(*s, expected) < 1e-9, "{s} vs {expected}");
    }
    assert_eq!(db.gpp(), &[3.0, 3.0, 3.0]);
    assert_eq!(db.jlower(), &[0, 0, 0]);
    assert_eq!(db.jupper(), &[1, 1, 1]);
}

#[test]
fn test_range_is_strict_and_margin_widens_it() {
    let root = tempfile::tempdir().unwrap();
    let dir = write_exomol(root.path(), &five_lines(), None);

    let db = ExomolDatabase::open(&dir, at_tref().with_nurange(200.0, 400.0)).unwrap();
    assert_eq!(db.nu_lines(), &[300.0]);

    let db = ExomolDatabase::open(&dir, at_tref().with_nurange(200.0, 400.0).with_margin(1.0)).unwrap();
    assert_eq!(db.nu_lines(), &[200.0, 300.0, 400.0]);
}

#[test]
fn test_crit_is_monotone() {
    let root = tempfile::tempdir().unwrap();
    let dir = write_exomol(root.path(), &random_lines(7, 300, 3000.0), None);

    let loose = ExomolDatabase::open(&dir, LoadOptions::default().with_crit(1e-28)).unwrap();
    let strict = ExomolDatabase::open(&dir, LoadOptions::default().with_crit(1e-25)).unwrap();
    assert!(strict.len() < loose.len());
    assert!(!strict.is_empty());
    for nu in strict.nu_lines() {
        assert!(loose.nu_lines().contains(nu), "{nu} missing from the looser selection");
    }
    for s in strict.sij_typ().unwrap() {
        assert!(s > 1e-25);
    }
}

#[test]
fn test_non_positive_wavenumber_is_dropped() {
    let root = tempfile::tempdir().unwrap();
    let lines = vec![
        SynthLine::ground(100.0, 1e-20),
        SynthLine {
            nu: -50.0,
            elower: 500.0,
            sij0: 1e-20,
        },
        SynthLine::ground(300.0, 1e-20),
    ];
    let dir = write_exomol(root.path(), &lines, None);
    let db = ExomolDatabase::open(&dir, LoadOptions::default()).unwrap();
    assert_eq!(db.nu_lines(), &[100.0, 300.0]);
}

// ---------------------------------------------------------------------------
// Arrays and masks
// ---------------------------------------------------------------------------

fn assert_synchronized(db: &ExomolDatabase) {
    let n = db.len();
    assert_eq!(db.nu_lines().len(), n);
    assert_eq!(db.sij0().len(), n);
    assert_eq!(db.a().len(), n);
    assert_eq!(db.elower().len(), n);
    assert_eq!(db.gpp().len(), n);
    assert_eq!(db.jlower().len(), n);
    assert_eq!(db.jupper().len(), n);
    assert_eq!(db.alpha_ref().len(), n);
    assert_eq!(db.n_texp().len(), n);
    let device = db.device().unwrap();
    assert_eq!(device.len(), n);
    assert_eq!(device.logsij0.len(), n);
    assert_eq!(device.gamma_natural.len(), n);
    assert_eq!(device.extra(Column::AlphaRef).map(<[f64]>::len), Some(n));
}

#[test]
fn test_arrays_stay_synchronized() {
    for seed in 1..=4 {
        let root = tempfile::tempdir().unwrap();
        let dir = write_exomol(root.path(), &random_lines(seed, 200, 2000.0), Some((2000.0, 4)));
        let mut db = ExomolDatabase::open(&dir, LoadOptions::default().with_nurange(300.0, 1700.0)).unwrap();
        assert_synchronized(&db);

        let keep: Vec<bool> = db.nu_lines().iter().map(|&nu| nu > 1000.0).collect();
        db.mask(&keep).unwrap();
        assert_synchronized(&db);
        assert!(db.nu_lines().iter().all(|&nu| nu > 1000.0 && nu < 1700.0));
    }
}

#[test]
fn test_mask_composition() {
    let root = tempfile::tempdir().unwrap();
    let dir = write_exomol(root.path(), &random_lines(11, 150, 2000.0), None);
    let mut stepwise = ExomolDatabase::open(&dir, LoadOptions::default()).unwrap();
    let mut combined = stepwise.clone();

    let first = |nu: f64| nu > 500.0;
    let second = |s: f64| s > 1e-26;

    let m1: Vec<bool> = stepwise.nu_lines().iter().map(|&nu| first(nu)).collect();
    stepwise.mask(&m1).unwrap();
    let m2: Vec<bool> = stepwise.sij0().iter().map(|&s| second(s)).collect();
    stepwise.mask(&m2).unwrap();

    let both: Vec<bool> = combined
        .nu_lines()
        .iter()
        .zip(combined.sij0())
        .map(|(&nu, &s)| first(nu) && second(s))
        .collect();
    combined.mask(&both).unwrap();
    assert_eq!(stepwise.nu_lines(), combined.nu_lines());
    assert_eq!(stepwise.sij0(), combined.sij0());

    // Masking with all-true is a no-op.
    let before = combined.nu_lines().to_vec();
    combined.mask(&vec![true; combined.len()]).unwrap();
    assert_eq!(combined.nu_lines(), before.as_slice());
}

#[test]
fn test_mask_length_mismatch() {
    let root = tempfile::tempdir().unwrap();
    let dir = write_exomol(root.path(), &five_lines(), None);
    let mut db = ExomolDatabase::open(&dir, at_tref()).unwrap();
    let err = db.mask(&[true]).unwrap_err();
    assert!(matches!(err, LineDbError::MaskLength { .. }));
    assert_eq!(db.len(), 5);
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

#[test]
fn test_cache_round_trip_without_raw_files() {
    let root = tempfile::tempdir().unwrap();
    let dir = write_exomol(root.path(), &random_lines(3, 100, 2000.0), None);
    let options = LoadOptions::default().with_nurange(100.0, 1900.0);

    let cold = ExomolDatabase::open(&dir, options.clone()).unwrap();
    let cache = LineCache::for_source(&trans_path(&dir, None), "exomol-trans");
    assert!(cache.exists());

    std::fs::remove_file(trans_path(&dir, None)).unwrap();
    std::fs::remove_file(states_path(&dir)).unwrap();
    let warm = ExomolDatabase::open(&dir, options).unwrap();

    assert_eq!(cold.len(), warm.len());
    assert_eq!(cold.nu_lines(), warm.nu_lines());
    for (a, b) in cold.sij0().iter().zip(warm.sij0()) {
        assert!(rel(*a, *b) < 1e-12);
    }
    assert_eq!(cold.elower(), warm.elower());
    assert_eq!(cold.jlower(), warm.jlower());
}

#[test]
fn test_gzip_source_leaves_no_intermediate() {
    let root = tempfile::tempdir().unwrap();
    let dir = write_exomol(root.path(), &five_lines(), None);
    let plain = trans_path(&dir, None);
    let text = std::fs::read(&plain).unwrap();
    let gz = PathBuf::from(format!("{}.gz", plain.display()));
    let mut encoder = GzEncoder::new(std::fs::File::create(&gz).unwrap(), Compression::default());
    encoder.write_all(&text).unwrap();
    encoder.finish().unwrap();
    std::fs::remove_file(&plain).unwrap();

    let db = ExomolDatabase::open(&dir, at_tref()).unwrap();
    assert_eq!(db.len(), 5);
    assert!(!plain.exists());
    assert!(LineCache::for_source(&gz, "exomol-trans").exists());
}

#[test]
fn test_bzip2_dataset_as_published() {
    let root = tempfile::tempdir().unwrap();
    let dir = write_exomol(root.path(), &five_lines(), None);
    let plain = trans_path(&dir, None);
    let packed = bzip2_in_place(&plain);
    bzip2_in_place(&states_path(&dir));

    let db = ExomolDatabase::open(&dir, at_tref()).unwrap();
    assert_eq!(db.nu_lines(), &[100.0, 200.0, 300.0, 400.0, 500.0]);
    assert!(!plain.exists());
    assert!(packed.exists());
    assert!(LineCache::for_source(&packed, "exomol-trans").exists());
}

#[test]
fn test_stale_cache_is_reported() {
    let root = tempfile::tempdir().unwrap();
    let dir = write_exomol(root.path(), &five_lines(), None);
    let trans = trans_path(&dir, None);

    let partial = LineTable::from_columns(vec![(
        Column::NuLines,
        ColumnData::Float(vec![1.0, 2.0]),
    )])
    .unwrap();
    LineCache::for_source(&trans, "exomol-trans")
        .store(&partial, &trans)
        .unwrap();

    let err = ExomolDatabase::open(&dir, at_tref()).unwrap_err();
    assert!(matches!(err, LineDbError::StaleCache { .. }), "{err}");
}

// ---------------------------------------------------------------------------
// Partitioned datasets
// ---------------------------------------------------------------------------

fn sorted_lines() -> Vec<SynthLine> {
    [50.0, 150.0, 199.5, 200.0, 250.0, 350.0, 399.0, 400.0, 450.0, 550.0]
        .into_iter()
        .map(|nu| SynthLine::ground(nu, 1e-20))
        .collect()
}

#[test]
fn test_partition_merge_matches_single_file() {
    let split_root = tempfile::tempdir().unwrap();
    let single_root = tempfile::tempdir().unwrap();
    let split = write_exomol(split_root.path(), &sorted_lines(), Some((600.0, 3)));
    let single = write_exomol(single_root.path(), &sorted_lines(), None);

    let options = at_tref().with_nurange(150.0, 460.0);
    let merged = ExomolDatabase::open(&split, options.clone()).unwrap();
    let whole = ExomolDatabase::open(&single, options).unwrap();

    assert_eq!(merged.nu_lines(), whole.nu_lines());
    assert_eq!(merged.nu_lines(), &[199.5, 200.0, 250.0, 350.0, 399.0, 400.0, 450.0]);
}

#[test]
fn test_only_intersecting_partitions_are_loaded() {
    let root = tempfile::tempdir().unwrap();
    let dir = write_exomol(root.path(), &sorted_lines(), Some((600.0, 3)));

    let db = ExomolDatabase::open(&dir, at_tref().with_nurange(250.0, 380.0)).unwrap();
    assert_eq!(db.nu_lines(), &[350.0]);

    let cache = |tag: &str| LineCache::for_source(&trans_path(&dir, Some(tag)), "exomol-trans");
    assert!(!cache("00000-00200").exists());
    assert!(cache("00200-00400").exists());
    assert!(!cache("00400-00600").exists());
}

/// Copies files from a stash directory, counting calls.
struct Stash {
    dir: PathBuf,
    calls: Cell<usize>,
}

impl FileProvider for Stash {
    fn fetch(&self, url: &str, target: &Path) -> FetchOutcome {
        self.calls.set(self.calls.get() + 1);
        let name = target.file_name().unwrap();
        match std::fs::copy(self.dir.join(name), target) {
            Ok(_) => FetchOutcome::Fetched(target.to_path_buf()),
            Err(e) => FetchOutcome::Failed {
                url: url.to_string(),
                reason: e.to_string(),
            },
        }
    }
}

#[test]
fn test_missing_partition_is_provisioned() {
    let root = tempfile::tempdir().unwrap();
    let stash = tempfile::tempdir().unwrap();
    let dir = write_exomol(root.path(), &sorted_lines(), Some((600.0, 3)));
    let missing = trans_path(&dir, Some("00200-00400"));
    std::fs::rename(&missing, stash.path().join(missing.file_name().unwrap())).unwrap();

    let provider = Stash {
        dir: stash.path().to_path_buf(),
        calls: Cell::new(0),
    };
    let db = ExomolDatabase::open_with_provider(
        &dir,
        at_tref().with_nurange(150.0, 460.0),
        &provider,
        &RemoteLayout::default(),
    )
    .unwrap();
    assert_eq!(db.nu_lines(), &[199.5, 200.0, 250.0, 350.0, 399.0, 400.0, 450.0]);
    assert!(missing.exists());
    // The partition plus the absent .broad file.
    assert_eq!(provider.calls.get(), 2);
}

#[test]
fn test_missing_partition_offline_fails() {
    let root = tempfile::tempdir().unwrap();
    let dir = write_exomol(root.path(), &sorted_lines(), Some((600.0, 3)));
    let missing = trans_path(&dir, Some("00400-00600"));
    std::fs::remove_file(&missing).unwrap();

    let err = ExomolDatabase::open_with_provider(
        &dir,
        at_tref().with_nurange(150.0, 460.0),
        &Offline,
        &RemoteLayout::default(),
    )
    .unwrap_err();
    assert!(matches!(err, LineDbError::MissingFile(p) if p == missing));
}

// ---------------------------------------------------------------------------
// Broadening
// ---------------------------------------------------------------------------

#[test]
fn test_missing_broad_file_uses_defaults() {
    let root = tempfile::tempdir().unwrap();
    let dir = write_exomol(root.path(), &five_lines(), None);
    let mut db = ExomolDatabase::open(&dir, at_tref()).unwrap();

    assert_eq!(db.broadening_quality(), BroadeningQuality::Constant);
    assert!(db.broadening_warning().is_some());
    assert!(db.alpha_ref().iter().all(|&a| a == 0.07));
    assert!(db.n_texp().iter().all(|&n| n == 0.5));

    db.set_broadening(Some(0.1), None).unwrap();
    assert!(db.alpha_ref().iter().all(|&a| a == 0.1));
    assert!(db.n_texp().iter().all(|&n| n == 0.5));
    assert_eq!(db.device().unwrap().extra(Column::AlphaRef).unwrap()[0], 0.1);
}

#[test]
fn test_broadf_disabled_has_no_warning() {
    let root = tempfile::tempdir().unwrap();
    let dir = write_exomol(root.path(), &five_lines(), None);
    let mut options = at_tref();
    options.broadf = false;
    let db = ExomolDatabase::open(&dir, options).unwrap();
    assert_eq!(db.broadening_quality(), BroadeningQuality::Constant);
    assert!(db.broadening_warning().is_none());
}

#[test]
fn test_broad_table_a0_and_a1() {
    let root = tempfile::tempdir().unwrap();
    let dir = write_exomol(root.path(), &five_lines(), None);

    std::fs::write(broad_path(&dir, "H2"), "a0 0.0500 0.600 0\n").unwrap();
    let db = ExomolDatabase::open(&dir, at_tref()).unwrap();
    assert_eq!(db.broadening_quality(), BroadeningQuality::A0);
    assert!(db.broadening_warning().is_none());
    assert!(db.alpha_ref().iter().all(|&a| a == 0.05));

    // J'' = 0, J' = 1 is not listed as an a1 pair: falls back to its a0 row.
    std::fs::write(
        broad_path(&dir, "H2"),
        "a0 0.0500 0.600 0\na1 0.0300 0.400 0 2\n",
    )
    .unwrap();
    let db = ExomolDatabase::open(&dir, at_tref()).unwrap();
    assert_eq!(db.broadening_quality(), BroadeningQuality::A1);
    assert!(db.alpha_ref().iter().all(|&a| a == 0.05));
    assert!(db.n_texp().iter().all(|&n| n == 0.6));

    std::fs::write(broad_path(&dir, "H2"), "a1 0.0300 0.400 0 1\n").unwrap();
    let db = ExomolDatabase::open(&dir, at_tref()).unwrap();
    assert!(db.alpha_ref().iter().all(|&a| a == 0.03));
}

#[test]
fn test_malformed_broad_file_degrades() {
    let root = tempfile::tempdir().unwrap();
    let dir = write_exomol(root.path(), &five_lines(), None);
    std::fs::write(broad_path(&dir, "H2"), "a0 0.05\n").unwrap();

    let db = ExomolDatabase::open(&dir, at_tref()).unwrap();
    assert_eq!(db.broadening_quality(), BroadeningQuality::Constant);
    assert!(db.broadening_warning().is_some());
    assert!(db.alpha_ref().iter().all(|&a| a == 0.07));
}

#[test]
fn test_partition_function_accessors() {
    let root = tempfile::tempdir().unwrap();
    let dir = write_exomol(root.path(), &five_lines(), None);
    let db = ExomolDatabase::open(&dir, at_tref()).unwrap();
    assert_eq!(db.qt_interp(1000.0), 1.0);
    assert_eq!(db.qr_interp(1000.0), 1.0);
    assert_eq!(db.molmass(), Some(27.994915));
    assert_eq!(db.names().molec(), "12C-16O__Synth");
}
