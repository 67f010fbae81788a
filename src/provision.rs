//! Seam for fetching archive files that are missing locally.
//!
//! The engine never talks to the network itself. A [`FileProvider`] is asked
//! once per missing file and reports what happened as a [`FetchOutcome`];
//! a failed fetch is logged and only becomes an error later, if the file
//! turns out to be required.

use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::formats::exomol::{molecule_simple_name, ExomolNames};
use crate::formats::find_source;

/// Result of one provisioning attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// The provider wrote the file.
    Fetched(PathBuf),
    /// The file (plain or compressed) was already on disk; nothing was fetched.
    AlreadyPresent(PathBuf),
    /// The fetch did not succeed. Parsing fails later if the file is needed.
    Failed { url: String, reason: String },
}

impl FetchOutcome {
    /// Local path, when the file is available.
    pub fn path(&self) -> Option<&Path> {
        match self {
            FetchOutcome::Fetched(p) | FetchOutcome::AlreadyPresent(p) => Some(p),
            FetchOutcome::Failed { .. } => None,
        }
    }
}

/// Fetches `url` into `target`.
///
/// Implementations leave the file at `target`, or store the archive as
/// served next to it (`target` plus `.bz2` or `.gz`); both are read.
pub trait FileProvider {
    fn fetch(&self, url: &str, target: &Path) -> FetchOutcome;
}

/// Provider that never fetches anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct Offline;

impl FileProvider for Offline {
    fn fetch(&self, url: &str, _target: &Path) -> FetchOutcome {
        FetchOutcome::Failed {
            url: url.to_string(),
            reason: "offline: no file provider configured".to_string(),
        }
    }
}

/// Where a missing file comes from and where it should land.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteFile {
    pub url: String,
    pub target: PathBuf,
}

/// Make sure `remote.target` exists locally, asking `provider` at most once.
pub fn ensure_local(provider: &dyn FileProvider, remote: &RemoteFile) -> FetchOutcome {
    if let Some(existing) = find_source(&remote.target) {
        return FetchOutcome::AlreadyPresent(existing);
    }
    if let Some(parent) = remote.target.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            let outcome = FetchOutcome::Failed {
                url: remote.url.clone(),
                reason: format!("cannot create {}: {e}", parent.display()),
            };
            warn!("{outcome:?}");
            return outcome;
        }
    }
    info!("Fetching {}", remote.url);
    let outcome = provider.fetch(&remote.url, &remote.target);
    match &outcome {
        FetchOutcome::Failed { url, reason } => warn!("Could not fetch {url}: {reason}"),
        FetchOutcome::Fetched(p) => info!("Fetched {}", p.display()),
        FetchOutcome::AlreadyPresent(_) => {}
    }
    outcome
}

// ---------------------------------------------------------------------------
// RemoteLayout – archive URLs
// ---------------------------------------------------------------------------

/// Base URLs of the public archives.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteLayout {
    pub exomol: String,
    pub hitran: String,
    pub hitemp: String,
    pub hitemp2010: String,
}

impl Default for RemoteLayout {
    fn default() -> Self {
        Self {
            exomol: "http://www.exomol.com/db/".to_string(),
            hitran: "https://hitran.org/hitran/data/".to_string(),
            hitemp: "https://hitran.org/hitemp/data/bzip2format/".to_string(),
            hitemp2010: "https://hitran.org/hitemp/data/HITEMP-2010/".to_string(),
        }
    }
}

impl RemoteLayout {
    fn exomol_dataset_url(&self, names: &ExomolNames) -> String {
        format!(
            "{}{}/{}/{}/",
            self.exomol,
            molecule_simple_name(&names.isotopologue),
            names.isotopologue,
            names.dataset
        )
    }

    /// `.def`, `.pf`: served as is.
    pub fn exomol_plain(&self, names: &ExomolNames, ext: &str) -> RemoteFile {
        RemoteFile {
            url: format!("{}{}{ext}", self.exomol_dataset_url(names), names.molec()),
            target: names.file(ext),
        }
    }

    /// `.states` and `.trans` files, served bzip2-compressed.
    pub fn exomol_states(&self, names: &ExomolNames) -> RemoteFile {
        RemoteFile {
            url: format!("{}{}.states.bz2", self.exomol_dataset_url(names), names.molec()),
            target: names.states_file(),
        }
    }

    pub fn exomol_trans(&self, names: &ExomolNames, tag: Option<&str>) -> RemoteFile {
        let target = names.trans_file(tag);
        let name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        RemoteFile {
            url: format!("{}{name}.bz2", self.exomol_dataset_url(names)),
            target,
        }
    }

    /// Broadening files live one level up, shared by all datasets of the
    /// isotopologue.
    pub fn exomol_broad(&self, names: &ExomolNames, bkgdatm: &str) -> RemoteFile {
        RemoteFile {
            url: format!(
                "{}{}/{}/{}__{bkgdatm}.broad",
                self.exomol,
                molecule_simple_name(&names.isotopologue),
                names.isotopologue,
                names.isotopologue
            ),
            target: names.broad_file(bkgdatm),
        }
    }

    /// HITRAN / HITEMP `.par` file; HITEMP names carry the `HITEMP` tag.
    pub fn hitran_par(&self, target: &Path) -> RemoteFile {
        let name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let url = if name.contains("HITEMP") {
            format!("{}{name}.bz2", self.hitemp)
        } else {
            format!("{}{name}", self.hitran)
        };
        RemoteFile {
            url,
            target: target.to_path_buf(),
        }
    }

    /// One sub-archive of the partitioned HITEMP2010 H2O / CO2 lists.
    pub fn hitemp2010_partition(&self, molecule_id: u32, tag: &str, target: &Path) -> RemoteFile {
        let dir = match molecule_id {
            1 => "H2O_line_list/",
            2 => "CO2_line_list/",
            _ => "",
        };
        RemoteFile {
            url: format!("{}{dir}{molecule_id:02}_{tag}_HITEMP2010.zip", self.hitemp2010),
            target: target.to_path_buf(),
        }
    }
}
