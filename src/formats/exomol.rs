//! ExoMol archive files.
//!
//! A dataset directory such as `.../CO/12C-16O/Li2015` holds
//!
//! ```text
//! 12C-16O__Li2015.def        dataset definition (defaults, partitioning)
//! 12C-16O__Li2015.pf         partition function  T  Q
//! 12C-16O__Li2015.states     i  E  g_tot  J  ...
//! 12C-16O__Li2015.trans      i_upper  i_lower  A  [nu]
//! 12C-16O__Li2015__00000-00100.trans   (partitioned datasets)
//! 12C-16O__H2.broad          code  alpha_ref  n_Texp  J''  [J']
//! ```

use std::collections::HashMap;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use super::{parse_f64, RawFormat};
use crate::data::table::{Column, ColumnData, LineTable};
use crate::error::{LineDbError, Result};
use crate::merge::PartitionLayout;

// ---------------------------------------------------------------------------
// File naming
// ---------------------------------------------------------------------------

/// Names of the files making up one ExoMol dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct ExomolNames {
    pub dir: PathBuf,
    /// Isotopologue, e.g. `12C-16O`.
    pub isotopologue: String,
    /// Dataset, e.g. `Li2015`.
    pub dataset: String,
}

impl ExomolNames {
    /// Derive names from a dataset directory `.../<isotopologue>/<dataset>`.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let dataset = dir
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty());
        let isotopologue = dir
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty());
        match (isotopologue, dataset) {
            (Some(iso), Some(ds)) => Ok(Self {
                dir: dir.to_path_buf(),
                isotopologue: iso.to_string(),
                dataset: ds.to_string(),
            }),
            _ => Err(LineDbError::InvalidConfig(format!(
                "ExoMol path must look like <molecule>/<isotopologue>/<dataset>, got {}",
                dir.display()
            ))),
        }
    }

    /// `12C-16O__Li2015`
    pub fn molec(&self) -> String {
        format!("{}__{}", self.isotopologue, self.dataset)
    }

    pub fn file(&self, ext: &str) -> PathBuf {
        self.dir.join(format!("{}{}", self.molec(), ext))
    }

    pub fn def_file(&self) -> PathBuf {
        self.file(".def")
    }

    pub fn pf_file(&self) -> PathBuf {
        self.file(".pf")
    }

    pub fn states_file(&self) -> PathBuf {
        self.file(".states")
    }

    /// Single transition file, or the file of partition `tag`.
    pub fn trans_file(&self, tag: Option<&str>) -> PathBuf {
        match tag {
            Some(tag) => self.file(&format!("__{tag}.trans")),
            None => self.file(".trans"),
        }
    }

    pub fn broad_file(&self, bkgdatm: &str) -> PathBuf {
        self.dir
            .join(format!("{}__{}.broad", self.isotopologue, bkgdatm))
    }
}

// ---------------------------------------------------------------------------
// .def
// ---------------------------------------------------------------------------

/// The parts of a `.def` file the engine uses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExomolDef {
    pub alpha_ref: Option<f64>,
    pub n_texp: Option<f64>,
    /// Isotopologue mass (Da).
    pub molmass: Option<f64>,
    pub n_trans_files: usize,
    pub max_wavenumber: Option<f64>,
}

impl ExomolDef {
    /// Lines are `value   # description`; the description selects the key.
    pub fn parse(reader: &mut dyn BufRead, path: &Path) -> Result<Self> {
        const FORMAT: &str = "ExoMol .def";
        let mut def = ExomolDef {
            n_trans_files: 1,
            ..Default::default()
        };
        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| LineDbError::io(path, e))?;
            let lineno = idx + 1;
            let Some((value, comment)) = line.split_once('#') else {
                continue;
            };
            let value = value.trim();
            if comment.contains("Default value of Lorentzian half-width") {
                def.alpha_ref = Some(parse_f64(value, "alpha_ref", FORMAT, path, lineno)?);
            } else if comment.contains("Default value of temperature exponent") {
                def.n_texp = Some(parse_f64(value, "n_Texp", FORMAT, path, lineno)?);
            } else if comment.contains("No. of transition files") {
                def.n_trans_files = value.parse::<usize>().map_err(|_| {
                    LineDbError::parse(FORMAT, path, lineno, format!("bad file count '{value}'"))
                })?;
            } else if comment.contains("Maximum wavenumber") {
                def.max_wavenumber = Some(parse_f64(value, "max wavenumber", FORMAT, path, lineno)?);
            } else if comment.contains("Isotopologue mass") {
                let first = value.split_whitespace().next().unwrap_or("");
                def.molmass = Some(parse_f64(first, "mass", FORMAT, path, lineno)?);
            }
        }
        Ok(def)
    }

    /// Partition layout of the transition files, if the dataset is split.
    pub fn partitions(&self, path: &Path) -> Result<Option<PartitionLayout>> {
        if self.n_trans_files <= 1 {
            return Ok(None);
        }
        let max_nu = self.max_wavenumber.ok_or_else(|| {
            LineDbError::parse(
                "ExoMol .def",
                path,
                0,
                format!(
                    "{} transition files declared but no maximum wavenumber",
                    self.n_trans_files
                ),
            )
        })?;
        Ok(Some(PartitionLayout::uniform(max_nu, self.n_trans_files)))
    }
}

// ---------------------------------------------------------------------------
// .states
// ---------------------------------------------------------------------------

/// Energy, total degeneracy and J of every state, looked up by state id.
#[derive(Debug, Clone, Default)]
pub struct StatesTable {
    pub energy: Vec<f64>,
    pub gtot: Vec<f64>,
    pub j: Vec<f64>,
    index: HashMap<i64, usize>,
}

impl StatesTable {
    pub fn parse(reader: &mut dyn BufRead, path: &Path) -> Result<Self> {
        const FORMAT: &str = "ExoMol .states";
        let mut table = StatesTable::default();
        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| LineDbError::io(path, e))?;
            let lineno = idx + 1;
            let mut tokens = line.split_whitespace();
            let Some(id) = tokens.next() else {
                continue;
            };
            let id: i64 = id.parse().map_err(|_| {
                LineDbError::parse(FORMAT, path, lineno, format!("bad state id '{id}'"))
            })?;
            let mut next = |what: &str| {
                let token = tokens.next().ok_or_else(|| {
                    LineDbError::parse(FORMAT, path, lineno, format!("missing {what}"))
                })?;
                parse_f64(token, what, FORMAT, path, lineno)
            };
            let energy = next("energy")?;
            let gtot = next("g_tot")?;
            let j = next("J")?;
            table.index.insert(id, table.energy.len());
            table.energy.push(energy);
            table.gtot.push(gtot);
            table.j.push(j);
        }
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.energy.len()
    }

    pub fn is_empty(&self) -> bool {
        self.energy.is_empty()
    }

    /// Row of state `id`, if listed.
    pub fn lookup(&self, id: i64) -> Option<usize> {
        self.index.get(&id).copied()
    }
}

// ---------------------------------------------------------------------------
// .trans
// ---------------------------------------------------------------------------

/// Transition file reader: `i_upper i_lower A [nu]`.
///
/// The catalog wavenumber column is not kept; the engine recomputes it from
/// the state energies.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExomolTrans;

impl RawFormat for ExomolTrans {
    fn format_name(&self) -> &'static str {
        "exomol-trans"
    }

    fn parse(&self, reader: &mut dyn BufRead, path: &Path) -> Result<LineTable> {
        const FORMAT: &str = "ExoMol .trans";
        let mut i_upper = Vec::new();
        let mut i_lower = Vec::new();
        let mut a = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| LineDbError::io(path, e))?;
            let lineno = idx + 1;
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.is_empty() {
                continue;
            }
            if tokens.len() < 3 {
                return Err(LineDbError::parse(
                    FORMAT,
                    path,
                    lineno,
                    format!("expected at least 3 columns, found {}", tokens.len()),
                ));
            }
            let id = |t: &str| {
                t.parse::<i64>().map_err(|_| {
                    LineDbError::parse(FORMAT, path, lineno, format!("bad state id '{t}'"))
                })
            };
            i_upper.push(id(tokens[0])?);
            i_lower.push(id(tokens[1])?);
            a.push(parse_f64(tokens[2], "A", FORMAT, path, lineno)?);
        }
        LineTable::from_columns(vec![
            (Column::IUpper, ColumnData::Int(i_upper)),
            (Column::ILower, ColumnData::Int(i_lower)),
            (Column::A, ColumnData::Float(a)),
        ])
    }
}

// ---------------------------------------------------------------------------
// .broad
// ---------------------------------------------------------------------------

/// One row of a `.broad` file.
#[derive(Debug, Clone, PartialEq)]
pub struct BroadRow {
    pub code: String,
    pub alpha_ref: f64,
    pub n_texp: f64,
    pub jlower: i64,
    pub jupper: Option<i64>,
}

/// Rows of a `.broad` file in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BroadTable {
    pub rows: Vec<BroadRow>,
}

impl BroadTable {
    pub fn parse(reader: &mut dyn BufRead, path: &Path) -> Result<Self> {
        const FORMAT: &str = "ExoMol .broad";
        let mut rows = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| LineDbError::io(path, e))?;
            let lineno = idx + 1;
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.is_empty() {
                continue;
            }
            if tokens.len() < 4 {
                return Err(LineDbError::parse(
                    FORMAT,
                    path,
                    lineno,
                    format!("expected code, alpha_ref, n_Texp, J'', found {}", line.trim()),
                ));
            }
            let quantum = |t: &str| -> Result<i64> {
                let j = parse_f64(t, "J", FORMAT, path, lineno)?;
                Ok(j.floor() as i64)
            };
            rows.push(BroadRow {
                code: tokens[0].to_string(),
                alpha_ref: parse_f64(tokens[1], "alpha_ref", FORMAT, path, lineno)?,
                n_texp: parse_f64(tokens[2], "n_Texp", FORMAT, path, lineno)?,
                jlower: quantum(tokens[3])?,
                jupper: match tokens.get(4) {
                    Some(t) if tokens[0] == "a1" => Some(quantum(t)?),
                    _ => None,
                },
            });
        }
        Ok(Self { rows })
    }

    pub fn rows_with_code<'a>(&'a self, code: &'a str) -> impl Iterator<Item = &'a BroadRow> + 'a {
        self.rows.iter().filter(move |r| r.code == code)
    }
}

/// `12C-16O` → `CO`, `1H2-16O` → `H2O`: the molecule directory name used by
/// the ExoMol web layout.
pub fn molecule_simple_name(isotopologue: &str) -> String {
    isotopologue
        .split('-')
        .map(|atom| atom.trim_start_matches(|c: char| c.is_ascii_digit()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn p() -> &'static Path {
        Path::new("test")
    }

    #[test]
    fn test_names_from_dir() {
        let names = ExomolNames::from_dir(Path::new("/db/CO/12C-16O/Li2015")).unwrap();
        assert_eq!(names.molec(), "12C-16O__Li2015");
        assert_eq!(
            names.trans_file(Some("00000-00100")),
            PathBuf::from("/db/CO/12C-16O/Li2015/12C-16O__Li2015__00000-00100.trans")
        );
        assert_eq!(
            names.broad_file("H2"),
            PathBuf::from("/db/CO/12C-16O/Li2015/12C-16O__H2.broad")
        );
        assert!(ExomolNames::from_dir(Path::new("Li2015")).is_err());
    }

    #[test]
    fn test_parse_def() {
        let text = "\
EXOMOL.def                                                                      # ID
12C-16O                                                                         # IsoFormula
27.994915 4.6486212E-26                                                         # Isotopologue mass (Da) and (kg)
2                                                                               # No. of transition files
22000.0                                                                         # Maximum wavenumber (in cm-1)
0.0700                                                                          # Default value of Lorentzian half-width for all lines (in cm-1/bar)
0.500                                                                           # Default value of temperature exponent for all lines
";
        let def = ExomolDef::parse(&mut Cursor::new(text), p()).unwrap();
        assert_eq!(def.alpha_ref, Some(0.07));
        assert_eq!(def.n_texp, Some(0.5));
        assert_eq!(def.molmass, Some(27.994915));
        assert_eq!(def.n_trans_files, 2);
        let layout = def.partitions(p()).unwrap().unwrap();
        assert_eq!(layout.tags(), &["00000-11000", "11000-22000"]);
    }

    #[test]
    fn test_def_without_defaults() {
        let def = ExomolDef::parse(&mut Cursor::new("1  # No. of transition files\n"), p()).unwrap();
        assert_eq!(def.alpha_ref, None);
        assert!(def.partitions(p()).unwrap().is_none());
    }

    #[test]
    fn test_parse_states_and_lookup() {
        let text = "       1     0.000000      1       0\n       2  3858.0   3 1 extra cols\n\n";
        let states = StatesTable::parse(&mut Cursor::new(text), p()).unwrap();
        assert_eq!(states.len(), 2);
        assert_eq!(states.lookup(2), Some(1));
        assert_eq!(states.energy[1], 3858.0);
        assert_eq!(states.gtot[1], 3.0);
        assert_eq!(states.lookup(7), None);
    }

    #[test]
    fn test_parse_states_rejects_short_row() {
        let err = StatesTable::parse(&mut Cursor::new("1 0.0 1\n"), p()).unwrap_err();
        assert!(matches!(err, LineDbError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_parse_trans() {
        let text = "  2  1  7.0E-06   2143.27\n 3 1 1.5e-5\n";
        let t = ExomolTrans.parse(&mut Cursor::new(text), p()).unwrap();
        assert_eq!(t.len(), 2);
        assert_eq!(t.int(Column::IUpper).unwrap(), &[2, 3]);
        assert_eq!(t.float(Column::A).unwrap(), &[7.0e-6, 1.5e-5]);
        assert!(!t.has(Column::NuLines));
    }

    #[test]
    fn test_parse_trans_malformed() {
        let err = ExomolTrans
            .parse(&mut Cursor::new("2 1 7e-6\n2 x 1e-6\n"), p())
            .unwrap_err();
        assert!(matches!(err, LineDbError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_parse_broad() {
        let text = "a0 0.0700 0.500 0\na1 0.0650 0.450 1 2\nm0 0.1 0.2 3\n";
        let b = BroadTable::parse(&mut Cursor::new(text), p()).unwrap();
        assert_eq!(b.rows.len(), 3);
        assert_eq!(b.rows[1].jupper, Some(2));
        assert_eq!(b.rows[2].jupper, None);
        assert_eq!(b.rows_with_code("a0").count(), 1);
    }

    #[test]
    fn test_molecule_simple_name() {
        assert_eq!(molecule_simple_name("12C-16O"), "CO");
        assert_eq!(molecule_simple_name("1H2-16O"), "H2O");
        assert_eq!(molecule_simple_name("12C-1H4"), "CH4");
    }
}
