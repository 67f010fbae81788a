use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, BooleanArray, Float64Array, Int64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use log::{debug, info};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;

use super::table::{Column, ColumnData, ColumnKind, LineTable};
use crate::error::{LineDbError, Result};
use crate::formats::logical_path;

/// Columns every cache must carry. A cache written before one of these was
/// introduced is stale.
pub const REQUIRED_COLUMNS: [Column; 4] = [
    Column::NuLines,
    Column::Sij0,
    Column::Elower,
    Column::NuPositive,
];

const FORMAT_KEY: &str = "linedb.format";
const SOURCE_KEY: &str = "linedb.source";

// ---------------------------------------------------------------------------
// LineCache – write-once Parquet snapshot of a parsed + derived source
// ---------------------------------------------------------------------------

/// Columnar cache living next to its source file.
///
/// `12C-16O__Li2015.trans.gz` caches to `12C-16O__Li2015.trans.parquet`.
#[derive(Debug, Clone)]
pub struct LineCache {
    path: PathBuf,
    format: &'static str,
}

impl LineCache {
    pub fn for_source(source: &Path, format: &'static str) -> Self {
        let logical = logical_path(source);
        let mut name = logical
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".parquet");
        Self {
            path: logical.with_file_name(name),
            format,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read the cache back into a line table.
    ///
    /// Fails with [`LineDbError::StaleCache`] when a required column is
    /// absent or the cache was written for another format.
    pub fn load(&self) -> Result<LineTable> {
        let file = File::open(&self.path).map_err(|e| LineDbError::io(&self.path, e))?;
        let builder =
            ParquetRecordBatchReaderBuilder::try_new(file).map_err(|e| self.parquet_error(e))?;

        let schema = builder.schema().clone();
        if let Some(format) = schema.metadata().get(FORMAT_KEY) {
            if format != self.format {
                return Err(self.stale(format!(
                    "written for {format}, expected {}",
                    self.format
                )));
            }
        }
        for required in REQUIRED_COLUMNS {
            if schema.index_of(required.name()).is_err() {
                return Err(self.stale(format!("missing column '{required}'")));
            }
        }

        let reader = builder.build().map_err(|e| self.parquet_error(e))?;
        let mut columns: BTreeMap<Column, ColumnData> = BTreeMap::new();
        for batch in reader {
            let batch = batch?;
            for (idx, field) in batch.schema().fields().iter().enumerate() {
                let Some(column) = Column::from_name(field.name()) else {
                    debug!("{}: ignoring unknown column '{}'", self.path.display(), field.name());
                    continue;
                };
                let chunk = self.extract(column, batch.column(idx))?;
                match columns.get_mut(&column) {
                    Some(existing) => append(existing, chunk),
                    None => {
                        columns.insert(column, chunk);
                    }
                }
            }
        }

        let table = LineTable::from_columns(columns.into_iter().collect())?;
        info!("Loaded {} lines from cache {}", table.len(), self.path.display());
        Ok(table)
    }

    /// Write the table once. Returns `false` without touching the disk when
    /// a cache already exists.
    pub fn store(&self, table: &LineTable, source: &Path) -> Result<bool> {
        if self.exists() {
            debug!("cache {} already present, not rewriting", self.path.display());
            return Ok(false);
        }

        let mut metadata = HashMap::new();
        metadata.insert(FORMAT_KEY.to_string(), self.format.to_string());
        metadata.insert(
            SOURCE_KEY.to_string(),
            source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        );

        let mut fields = Vec::new();
        let mut arrays: Vec<ArrayRef> = Vec::new();
        for column in table.columns() {
            let Some(data) = table.data(column) else {
                continue;
            };
            let (data_type, array): (DataType, ArrayRef) = match data {
                ColumnData::Float(v) => (DataType::Float64, Arc::new(Float64Array::from(v.clone()))),
                ColumnData::Int(v) => (DataType::Int64, Arc::new(Int64Array::from(v.clone()))),
                ColumnData::Bool(v) => (DataType::Boolean, Arc::new(BooleanArray::from(v.clone()))),
            };
            fields.push(Field::new(column.name(), data_type, false));
            arrays.push(array);
        }
        let schema = Arc::new(Schema::new(fields).with_metadata(metadata));
        let batch = RecordBatch::try_new(schema.clone(), arrays)?;

        let partial = self.path.with_extension("parquet.partial");
        let file = File::create(&partial).map_err(|e| LineDbError::io(&partial, e))?;
        let mut writer = ArrowWriter::try_new(file, schema, None).map_err(|e| self.parquet_error(e))?;
        writer.write(&batch).map_err(|e| self.parquet_error(e))?;
        writer.close().map_err(|e| self.parquet_error(e))?;
        std::fs::rename(&partial, &self.path).map_err(|e| LineDbError::io(&self.path, e))?;

        info!("Wrote {} lines to cache {}", table.len(), self.path.display());
        Ok(true)
    }

    fn extract(&self, column: Column, array: &ArrayRef) -> Result<ColumnData> {
        let mismatch = || {
            self.stale(format!(
                "column '{column}' has type {:?}, expected {:?}",
                array.data_type(),
                column.kind()
            ))
        };
        let data = match column.kind() {
            ColumnKind::Float => {
                let arr = array
                    .as_any()
                    .downcast_ref::<Float64Array>()
                    .ok_or_else(mismatch)?;
                ColumnData::Float(arr.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
            }
            ColumnKind::Int => {
                let arr = array
                    .as_any()
                    .downcast_ref::<Int64Array>()
                    .ok_or_else(mismatch)?;
                ColumnData::Int(arr.iter().map(|v| v.unwrap_or(-1)).collect())
            }
            ColumnKind::Bool => {
                let arr = array
                    .as_any()
                    .downcast_ref::<BooleanArray>()
                    .ok_or_else(mismatch)?;
                ColumnData::Bool(arr.iter().map(|v| v.unwrap_or(false)).collect())
            }
        };
        Ok(data)
    }

    fn stale(&self, reason: String) -> LineDbError {
        LineDbError::StaleCache {
            path: self.path.clone(),
            reason,
        }
    }

    fn parquet_error(&self, source: parquet::errors::ParquetError) -> LineDbError {
        LineDbError::Parquet {
            path: self.path.clone(),
            source,
        }
    }
}

fn append(existing: &mut ColumnData, chunk: ColumnData) {
    match (existing, chunk) {
        (ColumnData::Float(a), ColumnData::Float(b)) => a.extend(b),
        (ColumnData::Int(a), ColumnData::Int(b)) => a.extend(b),
        (ColumnData::Bool(a), ColumnData::Bool(b)) => a.extend(b),
        // `extract` always yields the kind the column declares.
        _ => unreachable!("cache column kinds are fixed per column"),
    }
}
