use std::path::PathBuf;

use attest_model::{
    AttestationRecord, HeaderedTable, MappingRecord, NewAttestation, ProjectedTable,
    ProtocolMapping,
};
use attest_notify::{attestation_summary, Notifier};
use attest_storage::AttestStore;
use attest_workbook::WorkbookSource;
use chrono::{Local, NaiveDateTime, Timelike};
use serde::Serialize;

use crate::{AppError, Result, Settings};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", content = "table", rename_all = "snake_case")]
pub enum ReviewStatus {
    Ready(ProjectedTable),
    /// The protocol is selected but its sheet is gone from the workbook.
    SheetMissing,
    NoMapping,
    /// The saved header row no longer exists in the sheet.
    InvalidHeaderRow,
    /// None of the saved columns match the sheet's current header labels.
    NoMatchingColumns,
}

/// What a supervisor sees for one active protocol.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProtocolReview {
    pub protocol: String,
    pub status: ReviewStatus,
    pub notes: Option<String>,
    pub snapshot: Option<PathBuf>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AttestationForm {
    pub name: String,
    pub site: String,
    /// Protocols marked complete.
    pub completed: Vec<String>,
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum NotificationStatus {
    Sent,
    /// The attestation was recorded but the summary could not be delivered.
    Failed(String),
    /// No mail transport is configured; the summary went to the log.
    Skipped,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SubmitOutcome {
    pub record: AttestationRecord,
    pub notification: NotificationStatus,
}

impl SubmitOutcome {
    pub fn warning(&self) -> Option<String> {
        match &self.notification {
            NotificationStatus::Failed(message) => Some(format!(
                "attestation {} was recorded but the summary email failed: {message}",
                self.record.id
            )),
            _ => None,
        }
    }
}

pub struct Workflow<'a> {
    workbook: &'a dyn WorkbookSource,
    store: &'a dyn AttestStore,
    notifier: &'a dyn Notifier,
    settings: &'a Settings,
}

impl<'a> Workflow<'a> {
    pub fn new(
        workbook: &'a dyn WorkbookSource,
        store: &'a dyn AttestStore,
        notifier: &'a dyn Notifier,
        settings: &'a Settings,
    ) -> Self {
        Self {
            workbook,
            store,
            notifier,
            settings,
        }
    }

    /// The filtered view of every active protocol, in selection order.
    pub fn review(&self) -> Result<Vec<ProtocolReview>> {
        let active = self.store.active_protocols()?;
        if active.is_empty() {
            return Ok(Vec::new());
        }
        let sheets = self.workbook.sheet_names()?;
        let records = self.store.mappings()?;

        active
            .into_iter()
            .map(|protocol| self.review_one(protocol, &sheets, &records))
            .collect()
    }

    fn review_one(
        &self,
        protocol: String,
        sheets: &[String],
        records: &[MappingRecord],
    ) -> Result<ProtocolReview> {
        let mapping = ProtocolMapping::from_records(&protocol, records);
        let notes = mapping.as_ref().and_then(|m| m.description.clone());
        let snapshot = self.snapshot_for(&protocol);

        let status = if !sheets.contains(&protocol) {
            log::warn!("protocol `{protocol}` is selected but has no sheet in the workbook");
            ReviewStatus::SheetMissing
        } else {
            match mapping {
                None => ReviewStatus::NoMapping,
                Some(mapping) => {
                    let raw = self.workbook.read_sheet(&protocol)?;
                    match HeaderedTable::new(&raw, mapping.header_row) {
                        Err(err) => {
                            log::warn!("protocol `{protocol}`: {err}");
                            ReviewStatus::InvalidHeaderRow
                        }
                        Ok(table) => {
                            let projected =
                                table.project(&mapping.rows, &mapping.columns, &mapping.renames);
                            if projected.column_count() == 0 {
                                ReviewStatus::NoMatchingColumns
                            } else {
                                ReviewStatus::Ready(projected)
                            }
                        }
                    }
                }
            }
        };

        Ok(ProtocolReview {
            protocol,
            status,
            notes,
            snapshot,
        })
    }

    fn snapshot_for(&self, protocol: &str) -> Option<PathBuf> {
        let dir = self.settings.sheet_images_dir.as_ref()?;
        let path = dir.join(format!("{protocol}.png"));
        path.is_file().then_some(path)
    }

    /// Site names a submission may use. Falls back to the configured defaults when none are saved.
    pub fn sites(&self) -> Result<Vec<String>> {
        let saved = self.store.sites()?;
        if saved.is_empty() {
            Ok(self.settings.default_sites.clone())
        } else {
            Ok(saved)
        }
    }

    pub fn set_sites(&self, sites: &[String]) -> Result<Vec<String>> {
        self.store.replace_sites(sites)?;
        self.sites()
    }

    pub fn submit(&self, form: &AttestationForm) -> Result<SubmitOutcome> {
        let now = Local::now().naive_local();
        self.submit_at(form, now.with_nanosecond(0).unwrap_or(now))
    }

    /// Validate `form`, append it to the log and send the summary.
    ///
    /// A failed notification never undoes the append; it is reported on the outcome.
    pub fn submit_at(&self, form: &AttestationForm, timestamp: NaiveDateTime) -> Result<SubmitOutcome> {
        let name = form.name.trim();
        let site = form.site.trim();
        if name.is_empty() {
            return Err(AppError::validation("supervisor name is required"));
        }
        if site.is_empty() {
            return Err(AppError::validation("site is required"));
        }
        let sites = self.sites()?;
        if !sites.is_empty() && !sites.iter().any(|s| s == site) {
            return Err(AppError::validation(format!(
                "unknown site `{site}` (expected one of: {})",
                sites.join(", ")
            )));
        }

        let reviewed = self.store.active_protocols()?;
        if reviewed.is_empty() {
            return Err(AppError::validation("no protocols are selected for review"));
        }

        for extra in form
            .completed
            .iter()
            .map(|p| p.trim())
            .filter(|p| !reviewed.iter().any(|r| r == p))
        {
            log::warn!("ignoring completion of `{extra}`: it is not under review");
        }
        let completed: Vec<String> = reviewed
            .iter()
            .filter(|p| form.completed.iter().any(|c| c.trim() == p.as_str()))
            .cloned()
            .collect();

        let entry = NewAttestation {
            timestamp,
            name: name.to_string(),
            site: site.to_string(),
            protocols_reviewed: reviewed,
            protocols_completed: completed,
            description: form
                .description
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
        };
        let record = self.store.append_attestation(&entry)?;
        log::info!(
            "recorded attestation {} by {} at {} ({}/{} complete)",
            record.id,
            record.name,
            record.site,
            record.protocols_completed.len(),
            record.protocols_reviewed.len()
        );

        let notification = self.notify(&record);
        Ok(SubmitOutcome {
            record,
            notification,
        })
    }

    fn notify(&self, record: &AttestationRecord) -> NotificationStatus {
        let message = attestation_summary(record, &self.settings.notify_recipients);
        match self.notifier.send(&message) {
            Ok(()) if self.notifier.delivers() => NotificationStatus::Sent,
            Ok(()) => NotificationStatus::Skipped,
            Err(err) => {
                log::warn!("attestation {}: summary not sent: {err}", record.id);
                NotificationStatus::Failed(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use attest_model::{CellValue, RawTable};
    use attest_notify::LogNotifier;
    use attest_storage::Storage;
    use attest_workbook::MemoryWorkbook;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn workbook() -> MemoryWorkbook {
        MemoryWorkbook::new()
            .with_sheet(
                "CT Head",
                RawTable::from_text_rows(vec![
                    vec!["Name", "Dose"],
                    vec!["Routine", "40"],
                    vec!["Stroke", "50"],
                ]),
            )
            .with_sheet("CT Chest", RawTable::from_text_rows(vec![vec!["Phase"]]))
    }

    fn mapping(protocol: &str, header_row: usize, columns: &[&str]) -> Vec<MappingRecord> {
        ProtocolMapping {
            protocol: protocol.to_string(),
            header_row,
            rows: vec![1],
            columns: columns.iter().map(|c| c.to_string()).collect(),
            renames: Default::default(),
            description: Some("new kVp".to_string()),
        }
        .to_records()
    }

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 5)
            .unwrap()
            .and_hms_opt(14, 0, 0)
            .unwrap()
    }

    #[test]
    fn review_reports_each_protocol_state() {
        let workbook = workbook();
        let store = Storage::open_in_memory().unwrap();
        let settings = Settings::default();
        store
            .replace_active_protocols(&[
                "CT Head".into(),
                "CT Chest".into(),
                "CT Spine".into(),
                "MR Brain".into(),
            ])
            .unwrap();
        store
            .replace_mappings_for("CT Head", &mapping("CT Head", 0, &["Dose"]))
            .unwrap();
        store
            .replace_mappings_for("CT Chest", &mapping("CT Chest", 4, &["Phase"]))
            .unwrap();
        store
            .replace_mappings_for("MR Brain", &mapping("MR Brain", 0, &["Name"]))
            .unwrap();

        let workflow = Workflow::new(&workbook, &store, &LogNotifier, &settings);
        let reviews = workflow.review().unwrap();
        let statuses: Vec<(&str, &ReviewStatus)> = reviews
            .iter()
            .map(|r| (r.protocol.as_str(), &r.status))
            .collect();

        assert_eq!(
            statuses,
            vec![
                ("CT Chest", &ReviewStatus::InvalidHeaderRow),
                (
                    "CT Head",
                    &ReviewStatus::Ready(ProjectedTable {
                        columns: vec!["Dose".to_string()],
                        source_rows: vec![1],
                        rows: vec![vec![CellValue::Text("50".into())]],
                    })
                ),
                ("CT Spine", &ReviewStatus::SheetMissing),
                ("MR Brain", &ReviewStatus::SheetMissing),
            ]
        );
        assert_eq!(reviews[1].notes.as_deref(), Some("new kVp"));
    }

    #[test]
    fn stale_columns_mean_nothing_to_show() {
        let workbook = workbook();
        let store = Storage::open_in_memory().unwrap();
        let settings = Settings::default();
        store.replace_active_protocols(&["CT Head".into()]).unwrap();
        store
            .replace_mappings_for("CT Head", &mapping("CT Head", 0, &["kVp"]))
            .unwrap();

        let reviews = Workflow::new(&workbook, &store, &LogNotifier, &settings)
            .review()
            .unwrap();
        assert_eq!(reviews[0].status, ReviewStatus::NoMatchingColumns);
    }

    #[test]
    fn submission_requires_name_site_and_selection() {
        let workbook = workbook();
        let store = Storage::open_in_memory().unwrap();
        let settings = Settings::default();
        let workflow = Workflow::new(&workbook, &store, &LogNotifier, &settings);

        let form = AttestationForm {
            name: "Jane Doe".into(),
            site: "MMC".into(),
            ..AttestationForm::default()
        };
        let err = workflow.submit_at(&form, at()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        store.replace_active_protocols(&["CT Head".into()]).unwrap();
        for bad in [
            AttestationForm { name: "  ".into(), ..form.clone() },
            AttestationForm { site: "".into(), ..form.clone() },
            AttestationForm { site: "Elsewhere".into(), ..form.clone() },
        ] {
            let err = workflow.submit_at(&bad, at()).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
        assert!(store.attestations().unwrap().is_empty());

        let outcome = workflow.submit_at(&form, at()).unwrap();
        assert_eq!(outcome.notification, NotificationStatus::Skipped);
        assert_eq!(outcome.warning(), None);
    }

    #[test]
    fn saved_sites_replace_defaults() {
        let workbook = workbook();
        let store = Storage::open_in_memory().unwrap();
        let settings = Settings::default();
        let workflow = Workflow::new(&workbook, &store, &LogNotifier, &settings);

        assert_eq!(workflow.sites().unwrap(), vec!["MMC", "Overlook"]);
        workflow.set_sites(&["Morristown".into()]).unwrap();
        assert_eq!(workflow.sites().unwrap(), vec!["Morristown"]);
    }

    #[test]
    fn snapshot_is_attached_when_the_image_exists() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("CT Head.png"), b"png").unwrap();
        let workbook = workbook();
        let store = Storage::open_in_memory().unwrap();
        let settings = Settings {
            sheet_images_dir: Some(dir.path().to_path_buf()),
            ..Settings::default()
        };
        store
            .replace_active_protocols(&["CT Head".into(), "CT Chest".into()])
            .unwrap();

        let reviews = Workflow::new(&workbook, &store, &LogNotifier, &settings)
            .review()
            .unwrap();
        assert_eq!(reviews[0].snapshot, None);
        assert_eq!(reviews[1].snapshot, Some(dir.path().join("CT Head.png")));
    }
}
