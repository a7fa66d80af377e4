mod cli;
mod render;

use std::process::ExitCode;

use attest_app::{AppError, ErrorKind};

fn main() -> ExitCode {
    match cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}

fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<AppError>().map(AppError::kind) {
        Some(ErrorKind::NotFound) => 3,
        Some(ErrorKind::Validation) => 4,
        Some(ErrorKind::Locked) => 5,
        Some(ErrorKind::Storage) => 6,
        Some(ErrorKind::Notification) | None => 1,
    }
}
