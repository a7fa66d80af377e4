use std::collections::BTreeSet;
use std::path::Path;

use attest_model::{AttestationId, AttestationRecord, DashboardFilter};
use attest_storage::AttestStore;
use serde::Serialize;

use crate::export::{self, ExportFormat};
use crate::Result;

/// Distinct values offered by the dashboard's filter pickers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FilterOptions {
    pub sites: BTreeSet<String>,
    pub names: BTreeSet<String>,
}

pub fn filter_options(records: &[AttestationRecord]) -> FilterOptions {
    FilterOptions {
        sites: records.iter().map(|r| r.site.clone()).collect(),
        names: records.iter().map(|r| r.name.clone()).collect(),
    }
}

pub struct Dashboard<'a> {
    store: &'a dyn AttestStore,
}

impl<'a> Dashboard<'a> {
    pub fn new(store: &'a dyn AttestStore) -> Self {
        Self { store }
    }

    /// The whole log, newest first.
    pub fn load(&self) -> Result<Vec<AttestationRecord>> {
        Ok(self.store.attestations()?)
    }

    pub fn filtered(&self, filter: &DashboardFilter) -> Result<Vec<AttestationRecord>> {
        Ok(filter.apply(&self.load()?))
    }

    pub fn export(&self, records: &[AttestationRecord], format: ExportFormat) -> Result<Vec<u8>> {
        Ok(export::export(records, format)?)
    }

    /// Export to `path`, choosing the format from its extension.
    pub fn export_to_path(&self, records: &[AttestationRecord], path: &Path) -> Result<ExportFormat> {
        let format = ExportFormat::from_path(path);
        let bytes = export::export(records, format)?;
        export::write_atomic(path, &bytes).map_err(export::ExportError::from)?;
        log::info!("exported {} attestation(s) to {}", records.len(), path.display());
        Ok(format)
    }

    /// Delete exactly the given records. Unknown ids are ignored.
    pub fn delete(&self, ids: &[AttestationId]) -> Result<usize> {
        let removed = self.store.delete_attestations(ids)?;
        log::info!("deleted {removed} attestation(s)");
        Ok(removed)
    }
}
