/// Data layer: the column store, its Parquet cache, and line selection.
///
/// Architecture:
/// ```text
///   parsed + derived columns
///        │
///        ▼
///   ┌───────────┐
///   │   table    │  LineTable: named columns of equal length
///   └───────────┘
///        │   ▲
///        ▼   │
///   ┌───────────┐
///   │   cache    │  <source>.parquet, written once per source
///   └───────────┘
///        │
///        ▼
///   ┌───────────┐
///   │  filter    │  range / strength predicates → boolean mask
///   └───────────┘
/// ```

pub mod cache;
pub mod filter;
pub mod table;
