//! Exit codes following sysexits.h conventions.
//!
//! These codes let scripts tell "no seal" apart from "could not read the
//! file" and from "ran out of time".

use aureo_core::SealError;

/// Successful execution.
pub const SUCCESS: u8 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: u8 = 1;

/// Command line usage error (invalid arguments).
/// Maps to EX_USAGE from sysexits.h.
pub const USAGE_ERROR: u8 = 64;

/// No seal found, or the seal does not verify.
/// Maps to EX_DATAERR from sysexits.h.
pub const VERIFICATION_FAILED: u8 = 65;

/// Cannot open or decode the input file.
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: u8 = 66;

/// I/O error (cannot write output file).
/// Maps to EX_IOERR from sysexits.h.
pub const IO_ERROR: u8 = 74;

/// Detection did not finish in time; retrying may succeed.
/// Maps to EX_TEMPFAIL from sysexits.h.
pub const INCONCLUSIVE: u8 = 75;

/// Represents an exit code with optional error context.
pub struct ExitCode {
    pub code: u8,
    pub message: Option<String>,
}

impl ExitCode {
    pub const fn success() -> Self {
        Self {
            code: SUCCESS,
            message: None,
        }
    }

    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");
        let code = err
            .chain()
            .find_map(|cause| cause.downcast_ref::<SealError>())
            .map(classify_seal_error)
            .unwrap_or_else(|| classify_message(&message));

        Self {
            code,
            message: Some(message),
        }
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code.code)
    }
}

fn classify_seal_error(err: &SealError) -> u8 {
    match err {
        SealError::UnreadableImage(_) => INPUT_ERROR,
        SealError::Cancelled { .. } => INCONCLUSIVE,
        SealError::InvalidAuthor(_) | SealError::Composition(_) | SealError::InvalidGeometry(_) => {
            USAGE_ERROR
        }
        SealError::InvalidSealId(_) | SealError::ExtractionOutOfBounds { .. } => {
            VERIFICATION_FAILED
        }
        SealError::Serialization(_) => IO_ERROR,
    }
}

fn classify_message(message: &str) -> u8 {
    if message.contains("Failed to read") || message.contains("Failed to parse receipt") {
        INPUT_ERROR
    } else if message.contains("Verification failed") || message.contains("No seal found") {
        VERIFICATION_FAILED
    } else if message.contains("inconclusive") {
        INCONCLUSIVE
    } else if message.contains("Failed to write") || message.contains("serialize") {
        IO_ERROR
    } else {
        GENERAL_ERROR
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_seal_errors_map_through_context() {
        let err = Err::<(), _>(SealError::UnreadableImage("bad".into()))
            .context("Failed to seal image")
            .unwrap_err();
        assert_eq!(ExitCode::from_anyhow(&err).code, INPUT_ERROR);

        let err = anyhow::Error::new(SealError::Cancelled { rows_scanned: 64 });
        assert_eq!(ExitCode::from_anyhow(&err).code, INCONCLUSIVE);
    }

    #[test]
    fn test_plain_messages_are_classified() {
        let cases = [
            ("Failed to read file: x.png", INPUT_ERROR),
            ("No seal found in 1 of 2 images", VERIFICATION_FAILED),
            ("Detection inconclusive for 1 image", INCONCLUSIVE),
            ("Failed to write sealed image", IO_ERROR),
            ("something else", GENERAL_ERROR),
        ];
        for (message, code) in cases {
            let err = anyhow::anyhow!(message);
            assert_eq!(ExitCode::from_anyhow(&err).code, code, "{}", message);
        }
    }
}
