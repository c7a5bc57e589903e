//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract — scripts rely on them.
//!
//! | Code | Meaning                                             |
//! |------|-----------------------------------------------------|
//! | 0    | Success                                             |
//! | 1    | General error (unspecified)                         |
//! | 2    | Usage error (bad args, unsupported file type)       |
//! | 3    | Invalid config file                                 |
//! | 4    | Input invalid (no header row, empty sheet)          |
//! | 5    | IO error (cannot read input, cannot write output)   |
//! | 6    | Variance found and `--strict` was given             |

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, unsupported file type.
pub const EXIT_USAGE: u8 = 2;

/// Config file failed to parse or validate.
pub const EXIT_INVALID_CONFIG: u8 = 3;

/// An input sheet is unusable: no header row, no rows, failed pre-validation.
pub const EXIT_INPUT_INVALID: u8 = 4;

/// Reading an input or writing an output failed.
pub const EXIT_IO: u8 = 5;

/// The run completed but some scanned quantity is in variance (`--strict`).
pub const EXIT_VARIANCE: u8 = 6;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct() {
        let codes = [
            EXIT_SUCCESS,
            EXIT_ERROR,
            EXIT_USAGE,
            EXIT_INVALID_CONFIG,
            EXIT_INPUT_INVALID,
            EXIT_IO,
            EXIT_VARIANCE,
        ];
        let mut sorted = codes.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), codes.len());
    }
}
