//! Spectral line database loader.
//!
//! Reads molecular (ExoMol, HITRAN / HITEMP) and atomic (VALD3, Kurucz)
//! line lists, derives reference line strengths, caches every parsed source
//! as Parquet, and hands back a filtered column store.
//!
//! ```text
//!  .def/.pf/.states/.trans   .par        VALD3 / gfall
//!            │                 │               │
//!            ▼                 ▼               ▼
//!      ┌──────────────────────────────────────────┐
//!      │ formats   RawFormat → LineTable (raw)    │
//!      └──────────────────────────────────────────┘
//!            │                                ▲
//!            ▼                                │ cache hit
//!      ┌─────────────┐   ┌───────────────┐    │
//!      │   derive     │──▶│ data::cache    │───┘
//!      └─────────────┘   └───────────────┘
//!            │
//!            ▼
//!      ┌─────────────┐   per partition, then once more after the merge
//!      │ data::filter │
//!      └─────────────┘
//!            │
//!            ▼
//!      ┌─────────────────────────────────────────┐
//!      │ db::{exomol, hitran, atomic}  facades   │──▶ db::separated
//!      └─────────────────────────────────────────┘
//! ```

pub mod broadening;
pub mod config;
pub mod constants;
pub mod data;
pub mod db;
pub mod derive;
pub mod error;
pub mod formats;
pub mod merge;
pub mod partition;
pub mod provision;
pub mod species;

pub use config::LoadOptions;
pub use data::table::{Column, LineTable};
pub use db::atomic::AtomicDatabase;
pub use db::exomol::ExomolDatabase;
pub use db::hitran::{HitranDatabase, IsotopePartitions};
pub use error::{LineDbError, Result};
