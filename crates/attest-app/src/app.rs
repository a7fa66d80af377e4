use std::path::PathBuf;
use std::sync::Arc;

use attest_notify::{LogNotifier, Notifier, SmtpNotifier};
use attest_storage::{AttestStore, Storage};
use attest_workbook::{CalamineWorkbook, WorkbookSource};
use secrecy::SecretString;

use crate::config::AppConfig;
use crate::{Dashboard, LockGate, MappingManager, ProtocolSelection, Result, Workflow};

/// Deployment settings the services consult at run time.
#[derive(Clone, Debug)]
pub struct Settings {
    /// Offered when no site list has been saved.
    pub default_sites: Vec<String>,
    pub lock_password: Option<SecretString>,
    pub notify_recipients: Vec<String>,
    /// Directory holding `<protocol>.png` snapshots of each sheet.
    pub sheet_images_dir: Option<PathBuf>,
    pub attest_base_url: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_sites: vec!["MMC".to_string(), "Overlook".to_string()],
            lock_password: None,
            notify_recipients: Vec::new(),
            sheet_images_dir: None,
            attest_base_url: None,
        }
    }
}

impl Settings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            default_sites: config.default_sites.clone(),
            lock_password: config.lock_password.clone(),
            notify_recipients: config
                .notify
                .as_ref()
                .map(|n| n.recipients.clone())
                .unwrap_or_default(),
            sheet_images_dir: config.sheet_images_dir.clone(),
            attest_base_url: config.attest_base_url.clone(),
        }
    }
}

pub struct AttestApp {
    workbook: Box<dyn WorkbookSource>,
    store: Arc<dyn AttestStore>,
    notifier: Box<dyn Notifier>,
    settings: Settings,
}

impl AttestApp {
    pub fn new(
        workbook: Box<dyn WorkbookSource>,
        store: Arc<dyn AttestStore>,
        notifier: Box<dyn Notifier>,
        settings: Settings,
    ) -> Self {
        Self {
            workbook,
            store,
            notifier,
            settings,
        }
    }

    /// Open the configured database and workbook and pick a notifier.
    ///
    /// The workbook is not touched until a service needs it, so a missing file surfaces as
    /// `NotFound` from that service rather than here.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let store = Storage::open_path(&config.database)?;
        let notifier: Box<dyn Notifier> = match config.notify.as_ref() {
            Some(notify) => Box::new(SmtpNotifier::new(&notify.smtp_settings())?),
            None => {
                log::debug!("no [notify] section configured; summaries go to the log");
                Box::new(LogNotifier)
            }
        };

        Ok(Self::new(
            Box::new(CalamineWorkbook::new(&config.workbook)),
            Arc::new(store),
            notifier,
            Settings::from_config(config),
        ))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn selection(&self) -> ProtocolSelection<'_> {
        ProtocolSelection::new(self.workbook.as_ref(), self.store.as_ref())
    }

    pub fn mapping(&self) -> MappingManager<'_> {
        MappingManager::new(self.workbook.as_ref(), self.store.as_ref())
    }

    pub fn workflow(&self) -> Workflow<'_> {
        Workflow::new(
            self.workbook.as_ref(),
            self.store.as_ref(),
            self.notifier.as_ref(),
            &self.settings,
        )
    }

    pub fn dashboard(&self) -> Dashboard<'_> {
        Dashboard::new(self.store.as_ref())
    }

    pub fn lock_gate(&self) -> LockGate<'_> {
        LockGate::new(self.store.as_ref(), self.settings.lock_password.as_ref())
    }
}
