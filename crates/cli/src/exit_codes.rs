//! CLI Exit Code Registry
//!
//! Single source of truth for all `ensemble` exit codes. Scripts rely on
//! them, so treat changes as breaking.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain    | Description                                 |
//! |---------|-----------|---------------------------------------------|
//! | 0       | Universal | Success                                     |
//! | 1       | Universal | General error, or `compare --fail-on-diff`  |
//! | 2       | Universal | Usage error (bad args, unreadable file)     |
//! | 3-9     | ensemble  | Config, input and reconciliation failures   |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Map it in [`recon_exit_code`] if a library error produces it

use ensemble_recon::ReconError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing or unreadable files.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Ensemble (3-9)
// =============================================================================

/// `compare --fail-on-diff` found disagreements. Like `diff(1)`.
pub const EXIT_COMPARE_DIFFS: u8 = 1;

/// Config failed to parse or validate.
pub const EXIT_INVALID_CONFIG: u8 = 3;

/// Source file could not be parsed (bad label, missing column, duplicate key).
pub const EXIT_INPUT: u8 = 4;

/// Sources disagree on which keys exist.
pub const EXIT_KEY_MISMATCH: u8 = 5;

/// Run finished but some keys could not be resolved.
pub const EXIT_PARTIAL: u8 = 6;

/// Could not write the output file.
pub const EXIT_OUTPUT: u8 = 7;

/// Map a library error to its exit code.
pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::ConfigParse(_) | ReconError::Configuration(_) => EXIT_INVALID_CONFIG,
        ReconError::KeySetMismatch { .. } => EXIT_KEY_MISMATCH,
        ReconError::InvalidValue { .. }
        | ReconError::MissingColumn { .. }
        | ReconError::DuplicateKey { .. }
        | ReconError::Csv(_) => EXIT_INPUT,
        ReconError::NoCandidates { .. } => EXIT_PARTIAL,
    }
}
