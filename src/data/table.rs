use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::error::{LineDbError, Result};

// ---------------------------------------------------------------------------
// Column – the closed set of per-line quantities
// ---------------------------------------------------------------------------

/// Storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Float,
    Int,
    Bool,
}

/// Every per-line quantity any source family can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Column {
    NuLines,
    Sij0,
    Elower,
    Eupper,
    A,
    Gupper,
    Jlower,
    Jupper,
    AlphaRef,
    NTexp,
    IUpper,
    ILower,
    NuPositive,
    Isoid,
    GammaAir,
    GammaSelf,
    NAir,
    DeltaAir,
    Ielem,
    Iion,
    QtMask,
    Wavelength,
    LogGf,
    GamRad,
    GamSta,
    VdWdamp,
}

impl Column {
    pub const ALL: [Column; 26] = [
        Column::NuLines,
        Column::Sij0,
        Column::Elower,
        Column::Eupper,
        Column::A,
        Column::Gupper,
        Column::Jlower,
        Column::Jupper,
        Column::AlphaRef,
        Column::NTexp,
        Column::IUpper,
        Column::ILower,
        Column::NuPositive,
        Column::Isoid,
        Column::GammaAir,
        Column::GammaSelf,
        Column::NAir,
        Column::DeltaAir,
        Column::Ielem,
        Column::Iion,
        Column::QtMask,
        Column::Wavelength,
        Column::LogGf,
        Column::GamRad,
        Column::GamSta,
        Column::VdWdamp,
    ];

    /// Name used in cache files and CSV exports.
    pub fn name(self) -> &'static str {
        match self {
            Column::NuLines => "nu_lines",
            Column::Sij0 => "Sij0",
            Column::Elower => "elower",
            Column::Eupper => "eupper",
            Column::A => "A",
            Column::Gupper => "gupper",
            Column::Jlower => "jlower",
            Column::Jupper => "jupper",
            Column::AlphaRef => "alpha_ref",
            Column::NTexp => "n_Texp",
            Column::IUpper => "i_upper",
            Column::ILower => "i_lower",
            Column::NuPositive => "nu_positive",
            Column::Isoid => "isoid",
            Column::GammaAir => "gamma_air",
            Column::GammaSelf => "gamma_self",
            Column::NAir => "n_air",
            Column::DeltaAir => "delta_air",
            Column::Ielem => "ielem",
            Column::Iion => "iion",
            Column::QtMask => "QTmask",
            Column::Wavelength => "wavelength",
            Column::LogGf => "loggf",
            Column::GamRad => "gamRad",
            Column::GamSta => "gamSta",
            Column::VdWdamp => "vdWdamp",
        }
    }

    pub fn from_name(name: &str) -> Option<Column> {
        Column::ALL.into_iter().find(|c| c.name() == name)
    }

    pub fn kind(self) -> ColumnKind {
        match self {
            Column::Jlower
            | Column::Jupper
            | Column::IUpper
            | Column::ILower
            | Column::Isoid
            | Column::Ielem
            | Column::Iion
            | Column::QtMask => ColumnKind::Int,
            Column::NuPositive => ColumnKind::Bool,
            _ => ColumnKind::Float,
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// ColumnData – one typed column
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Float(Vec<f64>),
    Int(Vec<i64>),
    Bool(Vec<bool>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Float(v) => v.len(),
            ColumnData::Int(v) => v.len(),
            ColumnData::Bool(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> ColumnKind {
        match self {
            ColumnData::Float(_) => ColumnKind::Float,
            ColumnData::Int(_) => ColumnKind::Int,
            ColumnData::Bool(_) => ColumnKind::Bool,
        }
    }

    fn retain_mask(&mut self, keep: &[bool]) {
        fn retain<T>(v: &mut Vec<T>, keep: &[bool]) {
            let mut it = keep.iter();
            v.retain(|_| *it.next().unwrap_or(&false));
        }
        match self {
            ColumnData::Float(v) => retain(v, keep),
            ColumnData::Int(v) => retain(v, keep),
            ColumnData::Bool(v) => retain(v, keep),
        }
    }

    fn gather(&self, indices: &[usize]) -> ColumnData {
        match self {
            ColumnData::Float(v) => ColumnData::Float(indices.iter().map(|&i| v[i]).collect()),
            ColumnData::Int(v) => ColumnData::Int(indices.iter().map(|&i| v[i]).collect()),
            ColumnData::Bool(v) => ColumnData::Bool(indices.iter().map(|&i| v[i]).collect()),
        }
    }

    fn append(&mut self, other: ColumnData) {
        match (self, other) {
            (ColumnData::Float(a), ColumnData::Float(b)) => a.extend(b),
            (ColumnData::Int(a), ColumnData::Int(b)) => a.extend(b),
            (ColumnData::Bool(a), ColumnData::Bool(b)) => a.extend(b),
            // Kinds are checked by `LineTable::concat` before appending.
            _ => unreachable!("column kinds checked before append"),
        }
    }

    /// Value at `row` rendered as text, for exports.
    fn cell(&self, row: usize) -> String {
        match self {
            ColumnData::Float(v) => format!("{:e}", v[row]),
            ColumnData::Int(v) => v[row].to_string(),
            ColumnData::Bool(v) => v[row].to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// LineTable – the synchronized column store
// ---------------------------------------------------------------------------

/// Structure-of-arrays line set. Every column has the same length and row
/// `i` of every column describes the same transition. Columns are only
/// readable from outside the crate; rows change only through [`mask`],
/// [`select`] and [`concat`], which act on all columns at once.
///
/// [`mask`]: LineTable::mask
/// [`select`]: LineTable::select
/// [`concat`]: LineTable::concat
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineTable {
    columns: BTreeMap<Column, ColumnData>,
    len: usize,
}

impl LineTable {
    /// Build a table from columns of equal length and matching kinds.
    pub fn from_columns(columns: Vec<(Column, ColumnData)>) -> Result<Self> {
        let mut table = LineTable::default();
        for (column, data) in columns {
            table.insert(column, data)?;
        }
        Ok(table)
    }

    /// Number of lines.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Columns present, in canonical order.
    pub fn columns(&self) -> impl Iterator<Item = Column> + '_ {
        self.columns.keys().copied()
    }

    pub fn has(&self, column: Column) -> bool {
        self.columns.contains_key(&column)
    }

    pub fn data(&self, column: Column) -> Option<&ColumnData> {
        self.columns.get(&column)
    }

    pub fn float(&self, column: Column) -> Option<&[f64]> {
        match self.columns.get(&column) {
            Some(ColumnData::Float(v)) => Some(v),
            _ => None,
        }
    }

    pub fn int(&self, column: Column) -> Option<&[i64]> {
        match self.columns.get(&column) {
            Some(ColumnData::Int(v)) => Some(v),
            _ => None,
        }
    }

    pub fn bool(&self, column: Column) -> Option<&[bool]> {
        match self.columns.get(&column) {
            Some(ColumnData::Bool(v)) => Some(v),
            _ => None,
        }
    }

    pub fn require_float(&self, column: Column) -> Result<&[f64]> {
        self.float(column).ok_or_else(|| missing(column))
    }

    pub fn require_int(&self, column: Column) -> Result<&[i64]> {
        self.int(column).ok_or_else(|| missing(column))
    }

    pub fn require_bool(&self, column: Column) -> Result<&[bool]> {
        self.bool(column).ok_or_else(|| missing(column))
    }

    /// Keep the rows where `keep` is true, in every column, preserving
    /// relative order.
    pub fn mask(&mut self, keep: &[bool]) -> Result<()> {
        if keep.len() != self.len {
            return Err(LineDbError::MaskLength {
                expected: self.len,
                got: keep.len(),
            });
        }
        for data in self.columns.values_mut() {
            data.retain_mask(keep);
        }
        self.len = keep.iter().filter(|&&k| k).count();
        Ok(())
    }

    /// New table holding the given rows (in the given order) of every column.
    pub fn select(&self, indices: &[usize]) -> Result<LineTable> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.len) {
            return Err(LineDbError::SchemaMismatch(format!(
                "row {bad} out of range for {} lines",
                self.len
            )));
        }
        Ok(LineTable {
            columns: self
                .columns
                .iter()
                .map(|(c, d)| (*c, d.gather(indices)))
                .collect(),
            len: indices.len(),
        })
    }

    /// Append the rows of `other`. Both tables must carry the same columns,
    /// unless `self` has no columns yet.
    pub fn concat(&mut self, other: LineTable) -> Result<()> {
        if self.columns.is_empty() {
            *self = other;
            return Ok(());
        }
        let ours: Vec<Column> = self.columns().collect();
        let theirs: Vec<Column> = other.columns().collect();
        if ours != theirs {
            return Err(LineDbError::SchemaMismatch(format!(
                "cannot concatenate [{}] with [{}]",
                join_names(&ours),
                join_names(&theirs)
            )));
        }
        self.len += other.len;
        for (column, data) in other.columns {
            if let Some(target) = self.columns.get_mut(&column) {
                target.append(data);
            }
        }
        Ok(())
    }

    /// Write every column as CSV, header = column names.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(self.columns.keys().map(|c| c.name()))?;
        for row in 0..self.len {
            writer.write_record(self.columns.values().map(|d| d.cell(row)))?;
        }
        writer.flush().map_err(|e| LineDbError::io(path, e))?;
        Ok(())
    }

    /// Add a column, or replace one that already exists.
    pub(crate) fn insert(&mut self, column: Column, data: ColumnData) -> Result<()> {
        if data.kind() != column.kind() {
            return Err(LineDbError::SchemaMismatch(format!(
                "column {column} expects {:?} values, got {:?}",
                column.kind(),
                data.kind()
            )));
        }
        let replacing_only = self.columns.len() == 1 && self.columns.contains_key(&column);
        if !self.columns.is_empty() && !replacing_only && data.len() != self.len {
            return Err(LineDbError::SchemaMismatch(format!(
                "column {column} has {} rows, table has {}",
                data.len(),
                self.len
            )));
        }
        self.len = data.len();
        self.columns.insert(column, data);
        Ok(())
    }

    pub(crate) fn remove(&mut self, column: Column) -> Option<ColumnData> {
        let removed = self.columns.remove(&column);
        if self.columns.is_empty() {
            self.len = 0;
        }
        removed
    }
}

fn missing(column: Column) -> LineDbError {
    LineDbError::SchemaMismatch(format!("line table has no '{column}' column"))
}

fn join_names(columns: &[Column]) -> String {
    columns
        .iter()
        .map(|c| c.name())
        .collect::<Vec<_>>()
        .join(", ")
}
