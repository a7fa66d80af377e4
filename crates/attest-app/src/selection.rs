use std::collections::BTreeSet;

use attest_storage::AttestStore;
use attest_workbook::{WorkbookError, WorkbookSource};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::Serialize;

use crate::{LockGate, Result};

/// A direct link to the review page of one active protocol.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProtocolLink {
    pub protocol: String,
    pub url: String,
}

/// Chooses which workbook sheets are under review.
pub struct ProtocolSelection<'a> {
    workbook: &'a dyn WorkbookSource,
    store: &'a dyn AttestStore,
}

impl<'a> ProtocolSelection<'a> {
    pub fn new(workbook: &'a dyn WorkbookSource, store: &'a dyn AttestStore) -> Self {
        Self { workbook, store }
    }

    /// Sheet names in workbook order.
    pub fn list_available_protocols(&self) -> Result<Vec<String>> {
        Ok(self.workbook.sheet_names()?)
    }

    pub fn selection(&self) -> Result<BTreeSet<String>> {
        Ok(self.store.active_protocols()?.into_iter().collect())
    }

    /// Replace the active set. Every name must be a sheet in the workbook; on failure nothing is
    /// written.
    pub fn set_selection<I, S>(&self, names: I) -> Result<BTreeSet<String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let available = self.workbook.sheet_names()?;
        let mut chosen = BTreeSet::new();
        for name in names {
            let name = name.as_ref();
            if !available.iter().any(|sheet| sheet == name) {
                return Err(WorkbookError::SheetNotFound(name.to_string()).into());
            }
            chosen.insert(name.to_string());
        }

        let protocols: Vec<String> = chosen.iter().cloned().collect();
        self.store.replace_active_protocols(&protocols)?;
        log::info!("active protocol selection set to {} protocol(s)", protocols.len());
        Ok(chosen)
    }

    /// Delete mappings of protocols that are no longer selected. Refused while mappings are
    /// locked.
    pub fn clear_orphaned_mappings(&self) -> Result<usize> {
        LockGate::new(self.store, None).ensure_unlocked()?;
        let active = self.selection()?;
        let orphaned: BTreeSet<String> = self
            .store
            .mappings()?
            .into_iter()
            .map(|record| record.protocol)
            .filter(|protocol| !active.contains(protocol))
            .collect();
        if orphaned.is_empty() {
            return Ok(0);
        }

        let orphaned: Vec<String> = orphaned.into_iter().collect();
        let removed = self.store.clear_mappings_for(&orphaned)?;
        log::info!(
            "removed {removed} mapping record(s) for unselected protocols: {}",
            orphaned.join(", ")
        );
        Ok(removed)
    }

    pub fn clear_mappings(&self, protocols: &[String]) -> Result<usize> {
        LockGate::new(self.store, None).ensure_unlocked()?;
        Ok(self.store.clear_mappings_for(protocols)?)
    }

    /// One review link per active protocol, name percent-encoded onto `base_url`.
    pub fn protocol_links(&self, base_url: &str) -> Result<Vec<ProtocolLink>> {
        Ok(self
            .store
            .active_protocols()?
            .into_iter()
            .map(|protocol| {
                let url = format!(
                    "{base_url}{}",
                    utf8_percent_encode(&protocol, NON_ALPHANUMERIC)
                );
                ProtocolLink { protocol, url }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use attest_model::{MappingRecord, RawTable};
    use attest_storage::Storage;
    use attest_model::LockState;
    use attest_workbook::MemoryWorkbook;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn workbook() -> MemoryWorkbook {
        let sheet = RawTable::from_text_rows(vec![vec!["Name"], vec!["Routine"]]);
        MemoryWorkbook::new()
            .with_sheet("CT Head", sheet.clone())
            .with_sheet("CT Chest", sheet.clone())
            .with_sheet("MR Brain", sheet)
    }

    fn record(protocol: &str) -> MappingRecord {
        MappingRecord {
            protocol: protocol.to_string(),
            row_index: 0,
            original_column: "Name".to_string(),
            renamed_column: None,
            header_row: 0,
            description: None,
        }
    }

    #[test]
    fn lists_sheets_in_workbook_order() {
        let workbook = workbook();
        let store = Storage::open_in_memory().unwrap();
        let selection = ProtocolSelection::new(&workbook, &store);
        assert_eq!(
            selection.list_available_protocols().unwrap(),
            vec!["CT Head", "CT Chest", "MR Brain"]
        );
    }

    #[test]
    fn unknown_sheet_is_rejected_and_nothing_changes() {
        let workbook = workbook();
        let store = Storage::open_in_memory().unwrap();
        let selection = ProtocolSelection::new(&workbook, &store);
        selection.set_selection(["CT Head"]).unwrap();

        let err = selection.set_selection(["CT Chest", "PET Body"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(selection.selection().unwrap(), ["CT Head".to_string()].into());
    }

    #[test]
    fn clears_only_orphaned_mappings() {
        let workbook = workbook();
        let store = Storage::open_in_memory().unwrap();
        store.replace_mappings_for("CT Head", &[record("CT Head")]).unwrap();
        store.replace_mappings_for("MR Brain", &[record("MR Brain")]).unwrap();

        let selection = ProtocolSelection::new(&workbook, &store);
        selection.set_selection(["CT Head", "CT Chest"]).unwrap();

        assert_eq!(selection.clear_orphaned_mappings().unwrap(), 1);
        assert_eq!(store.mappings_for("CT Head").unwrap().len(), 1);
        assert!(store.mappings_for("MR Brain").unwrap().is_empty());
        assert_eq!(selection.clear_orphaned_mappings().unwrap(), 0);
    }

    #[test]
    fn clearing_is_refused_while_locked() {
        let workbook = workbook();
        let store = Storage::open_in_memory().unwrap();
        store.replace_mappings_for("CT Head", &[record("CT Head")]).unwrap();
        store.replace_mappings_for("MR Brain", &[record("MR Brain")]).unwrap();

        let selection = ProtocolSelection::new(&workbook, &store);
        selection.set_selection(["CT Head"]).unwrap();
        store.set_lock_state(LockState::Locked).unwrap();

        let err = selection.clear_mappings(&["CT Head".to_string()]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Locked);
        let err = selection.clear_orphaned_mappings().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Locked);

        assert_eq!(store.mappings_for("CT Head").unwrap().len(), 1);
        assert_eq!(store.mappings_for("MR Brain").unwrap().len(), 1);
        assert_eq!(store.lock_state().unwrap(), LockState::Locked);
    }

    #[test]
    fn links_encode_protocol_names() {
        let workbook = workbook();
        let store = Storage::open_in_memory().unwrap();
        let selection = ProtocolSelection::new(&workbook, &store);
        selection.set_selection(["CT Head"]).unwrap();

        let links = selection
            .protocol_links("https://attest.example.org/Attest?protocol=")
            .unwrap();
        assert_eq!(
            links,
            vec![ProtocolLink {
                protocol: "CT Head".to_string(),
                url: "https://attest.example.org/Attest?protocol=CT%20Head".to_string(),
            }]
        );
    }

    proptest! {
        #[test]
        fn selection_round_trips_through_the_workbook(
            picks in prop::collection::vec(prop::sample::select(vec!["CT Head", "CT Chest", "MR Brain"]), 0..6)
        ) {
            let workbook = workbook();
            let store = Storage::open_in_memory().unwrap();
            let selection = ProtocolSelection::new(&workbook, &store);

            let expected: BTreeSet<String> = picks.iter().map(|p| p.to_string()).collect();
            prop_assert_eq!(selection.set_selection(&picks).unwrap(), expected.clone());
            prop_assert_eq!(selection.selection().unwrap(), expected);
        }
    }
}
