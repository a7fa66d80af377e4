use std::sync::{Arc, Mutex};

use attest_app::{
    AppConfig, AttestApp, AttestationForm, ErrorKind, MappingDraft, NotificationStatus,
    ReviewStatus, Settings,
};
use attest_model::{CellValue, LockState, RawTable};
use attest_notify::{Notification, Notifier, NotifyError};
use attest_storage::Storage;
use attest_workbook::MemoryWorkbook;
use chrono::{NaiveDate, NaiveDateTime};
use pretty_assertions::assert_eq;
use secrecy::SecretString;

#[derive(Clone, Default)]
struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl Notifier for RecordingNotifier {
    fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn send(&self, _notification: &Notification) -> Result<(), NotifyError> {
        Err(NotifyError::NoRecipients)
    }
}

fn workbook() -> MemoryWorkbook {
    MemoryWorkbook::new()
        .with_sheet(
            "ProtocolA",
            RawTable::from_text_rows(vec![
                vec!["Name", "Dose", "kVp"],
                vec!["Routine", "40", "120"],
                vec!["Stroke", "50", "100"],
                vec!["Trauma", "45", "120"],
            ]),
        )
        .with_sheet(
            "ProtocolB",
            RawTable::from_text_rows(vec![vec!["Phase", "Delay"], vec!["Arterial", "25"]]),
        )
}

fn settings() -> Settings {
    Settings {
        lock_password: Some(SecretString::from("open-sesame".to_string())),
        notify_recipients: vec!["qa@example.org".to_string()],
        ..Settings::default()
    }
}

fn app_with(notifier: Box<dyn Notifier>) -> AttestApp {
    AttestApp::new(
        Box::new(workbook()),
        Arc::new(Storage::open_in_memory().expect("open storage")),
        notifier,
        settings(),
    )
}

fn at() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 6, 5)
        .unwrap()
        .and_hms_opt(14, 30, 0)
        .unwrap()
}

fn map_protocol_a(app: &AttestApp) {
    app.mapping()
        .save(&MappingDraft {
            protocol: "ProtocolA".to_string(),
            header_row: 0,
            rows: vec![1, 2],
            columns: vec!["Name".to_string(), "Dose".to_string()],
            ..MappingDraft::default()
        })
        .expect("save mapping");
}

fn jane_completing(completed: &[&str]) -> AttestationForm {
    AttestationForm {
        name: "Jane Doe".to_string(),
        site: "MMC".to_string(),
        completed: completed.iter().map(|p| p.to_string()).collect(),
        description: None,
    }
}

#[test]
fn select_map_review_submit() {
    let notifier = RecordingNotifier::default();
    let app = app_with(Box::new(notifier.clone()));

    app.selection()
        .set_selection(["ProtocolA", "ProtocolB"])
        .unwrap();
    map_protocol_a(&app);

    let reviews = app.workflow().review().unwrap();
    assert_eq!(reviews.len(), 2);
    assert_eq!(reviews[0].protocol, "ProtocolA");
    match &reviews[0].status {
        ReviewStatus::Ready(table) => {
            assert_eq!(table.columns, vec!["Name", "Dose"]);
            assert_eq!(
                table.rows,
                vec![
                    vec![CellValue::Text("Stroke".into()), CellValue::Text("50".into())],
                    vec![CellValue::Text("Trauma".into()), CellValue::Text("45".into())],
                ]
            );
        }
        other => panic!("expected a ready table, got {other:?}"),
    }
    assert_eq!(reviews[1].status, ReviewStatus::NoMapping);

    let outcome = app
        .workflow()
        .submit_at(&jane_completing(&["ProtocolA"]), at())
        .unwrap();
    assert_eq!(outcome.notification, NotificationStatus::Sent);
    assert_eq!(outcome.record.protocols_reviewed, vec!["ProtocolA", "ProtocolB"]);
    assert_eq!(outcome.record.protocols_completed, vec!["ProtocolA"]);

    let log = app.dashboard().load().unwrap();
    assert_eq!(log, vec![outcome.record.clone()]);

    let sent = notifier.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Protocol Attestation Submitted by Jane Doe");
    assert_eq!(sent[0].recipients, vec!["qa@example.org"]);
    assert!(sent[0]
        .body
        .ends_with("Completed Protocols:\n  ProtocolA\n\nNot Marked Complete:\n  ProtocolB"));
}

#[test]
fn failed_notification_keeps_the_record() {
    let app = app_with(Box::new(FailingNotifier));
    app.selection().set_selection(["ProtocolA"]).unwrap();

    let outcome = app
        .workflow()
        .submit_at(&jane_completing(&["ProtocolA"]), at())
        .unwrap();

    assert!(matches!(outcome.notification, NotificationStatus::Failed(_)));
    assert!(outcome.warning().is_some());
    assert_eq!(app.dashboard().load().unwrap(), vec![outcome.record]);
}

#[test]
fn submissions_append_without_reordering() {
    let app = app_with(Box::new(RecordingNotifier::default()));
    app.selection().set_selection(["ProtocolB"]).unwrap();

    let first = app.workflow().submit_at(&jane_completing(&[]), at()).unwrap();
    let later = at() + chrono::Duration::hours(2);
    let second = app
        .workflow()
        .submit_at(&jane_completing(&["ProtocolB"]), later)
        .unwrap();

    let log = app.dashboard().load().unwrap();
    assert_eq!(log, vec![second.record, first.record]);
}

#[test]
fn locked_mappings_reject_saves_until_unlocked() {
    let app = app_with(Box::new(RecordingNotifier::default()));
    app.selection().set_selection(["ProtocolA"]).unwrap();

    app.lock_gate().lock().unwrap();
    let err = app
        .mapping()
        .save(&MappingDraft {
            protocol: "ProtocolA".to_string(),
            rows: vec![0],
            columns: vec!["Name".to_string()],
            ..MappingDraft::default()
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Locked);

    let err = app.lock_gate().unlock("wrong").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(app.lock_gate().state().unwrap(), LockState::Locked);

    app.lock_gate().unlock("open-sesame").unwrap();
    map_protocol_a(&app);
}

#[test]
fn missing_workbook_file_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = AppConfig::defaults_in(dir.path());
    config.workbook = dir.path().join("absent.xlsx");

    let app = AttestApp::from_config(&config).expect("database opens without the workbook");
    let err = app.selection().list_available_protocols().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(dir.path().join("data").join("attest.sqlite3").is_file());
}
