//! Range-partitioned archives.
//!
//! Large line lists are split into files covering contiguous, non-overlapping
//! wavenumber ranges (`00000-00100`, `00100-00200`, ...). Only the files
//! intersecting the requested range are loaded, each one parsed, derived and
//! pre-filtered on its own, then concatenated in partition order.

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::data::cache::LineCache;
use crate::data::table::LineTable;
use crate::error::{LineDbError, Result};
use crate::formats::find_source;
use crate::provision::{ensure_local, FileProvider, RemoteFile};

// ---------------------------------------------------------------------------
// PartitionLayout
// ---------------------------------------------------------------------------

/// Partition edges and the tag naming each partition file.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionLayout {
    /// `n + 1` ascending edges; partition `i` covers `[edges[i], edges[i+1])`.
    edges: Vec<f64>,
    tags: Vec<String>,
}

impl PartitionLayout {
    /// `n` equal partitions of `[0, max_nu]`, tagged `%05d-%05d` (ExoMol).
    pub fn uniform(max_nu: f64, n: usize) -> Self {
        let n = n.max(1);
        let edges: Vec<f64> = (0..=n).map(|k| max_nu * k as f64 / n as f64).collect();
        let tags = edges
            .windows(2)
            .map(|w| format!("{:05}-{:05}", w[0] as i64, w[1] as i64))
            .collect();
        Self { edges, tags }
    }

    /// Layout from `lllll-hhhhh` tags, e.g. HITEMP2010 sub-archive names.
    /// Tags are sorted by lower edge; they must not overlap.
    pub fn from_tags<S: AsRef<str>>(tags: &[S]) -> Result<Self> {
        let mut parsed = tags
            .iter()
            .map(|t| {
                let t = t.as_ref();
                parse_tag(t)
                    .map(|(lo, hi)| (lo, hi, t.to_string()))
                    .ok_or_else(|| LineDbError::InvalidConfig(format!("bad partition tag '{t}'")))
            })
            .collect::<Result<Vec<_>>>()?;
        if parsed.is_empty() {
            return Err(LineDbError::InvalidConfig("no partition tags".to_string()));
        }
        parsed.sort_by(|a, b| a.0.total_cmp(&b.0));
        for w in parsed.windows(2) {
            if w[1].0 < w[0].1 {
                return Err(LineDbError::InvalidConfig(format!(
                    "partitions {} and {} overlap",
                    w[0].2, w[1].2
                )));
            }
        }
        let mut edges: Vec<f64> = parsed.iter().map(|p| p.0).collect();
        edges.push(parsed[parsed.len() - 1].1);
        Ok(Self {
            edges,
            tags: parsed.into_iter().map(|p| p.2).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Partitions intersecting `[lo, hi]`: from the partition holding `lo`
    /// to the one holding `hi`, clamped to the valid range. Callers pass
    /// bounds already widened by the margin.
    pub fn select(&self, lo: f64, hi: f64) -> RangeInclusive<usize> {
        let last = self.len().saturating_sub(1);
        let locate = |x: f64| {
            // Rightmost edge <= x.
            self.edges
                .partition_point(|&e| e <= x)
                .saturating_sub(1)
                .min(last)
        };
        locate(lo)..=locate(hi)
    }
}

fn parse_tag(tag: &str) -> Option<(f64, f64)> {
    let (lo, hi) = tag.split_once('-')?;
    let lo: f64 = lo.parse().ok()?;
    let hi: f64 = hi.parse().ok()?;
    (lo < hi).then_some((lo, hi))
}

// ---------------------------------------------------------------------------
// PartitionedSourceMerger
// ---------------------------------------------------------------------------

/// One partition file of a layout.
#[derive(Debug, Clone)]
pub struct PartitionFile {
    pub tag: String,
    /// Uncompressed source path; a `.gz` or `.bz2` sibling is accepted too.
    pub source: PathBuf,
    pub cache: LineCache,
    pub remote: Option<RemoteFile>,
}

impl PartitionFile {
    /// Path to hand to the loader. A cached partition needs no raw source;
    /// otherwise the raw file is fetched when absent.
    fn locate(&self, provider: &dyn FileProvider) -> Result<PathBuf> {
        if self.cache.exists() {
            return Ok(self.source.clone());
        }
        if let Some(found) = find_source(&self.source) {
            return Ok(found);
        }
        if let Some(remote) = &self.remote {
            ensure_local(provider, remote);
        }
        find_source(&self.source).ok_or_else(|| LineDbError::MissingFile(self.source.clone()))
    }
}

/// Loads the partitions of a layout that intersect a range and concatenates
/// them.
pub struct PartitionedSourceMerger<'a> {
    provider: &'a dyn FileProvider,
}

impl<'a> PartitionedSourceMerger<'a> {
    pub fn new(provider: &'a dyn FileProvider) -> Self {
        Self { provider }
    }

    /// Run `load` on each file, in order, and concatenate the results.
    ///
    /// `load` gets the located source and must return the partition already
    /// derived and pre-filtered. Every partition must yield the same columns.
    pub fn merge<F>(&self, files: &[PartitionFile], mut load: F) -> Result<LineTable>
    where
        F: FnMut(&PartitionFile, &Path) -> Result<LineTable>,
    {
        let mut merged = LineTable::default();
        for file in files {
            let source = file.locate(self.provider)?;
            let part = load(file, &source)?;
            debug!("partition {}: {} lines kept", file.tag, part.len());
            merged.concat(part)?;
        }
        info!("Merged {} partitions, {} lines", files.len(), merged.len());
        Ok(merged)
    }
}
