use attest_model::LockState;
use attest_storage::AttestStore;
use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;

use crate::{AppError, Result};

/// Password-gated freeze on mapping edits.
///
/// The state lives in the store, so every session observes the same lock. Locking needs no
/// password; unlocking needs the configured one.
pub struct LockGate<'a> {
    store: &'a dyn AttestStore,
    password: Option<&'a SecretString>,
}

impl<'a> LockGate<'a> {
    pub fn new(store: &'a dyn AttestStore, password: Option<&'a SecretString>) -> Self {
        Self { store, password }
    }

    pub fn state(&self) -> Result<LockState> {
        Ok(self.store.lock_state()?)
    }

    pub fn lock(&self) -> Result<LockState> {
        self.store.set_lock_state(LockState::Locked)?;
        log::info!("protocol mappings locked");
        Ok(LockState::Locked)
    }

    pub fn unlock(&self, password: &str) -> Result<LockState> {
        let Some(expected) = self.password else {
            return Err(AppError::validation(
                "no unlock password is configured; set [lock] password or ATTEST_LOCK_PASSWORD",
            ));
        };

        let matches: bool = expected
            .expose_secret()
            .as_bytes()
            .ct_eq(password.as_bytes())
            .into();
        if !matches {
            log::warn!("rejected unlock attempt with an incorrect password");
            return Err(AppError::validation("incorrect password"));
        }

        self.store.set_lock_state(LockState::Unlocked)?;
        log::info!("protocol mappings unlocked");
        Ok(LockState::Unlocked)
    }

    pub fn ensure_unlocked(&self) -> Result<()> {
        if self.state()?.is_locked() {
            Err(AppError::Locked)
        } else {
            Ok(())
        }
    }
}
