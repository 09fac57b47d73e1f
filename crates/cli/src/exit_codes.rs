//! CLI Exit Code Registry
//!
//! Single source of truth for `bcstats` exit codes. Scripts rely on them.
//!
//! | Code | Meaning                                              |
//! |------|------------------------------------------------------|
//! | 0    | Run completed, no Type 1/2 differences               |
//! | 1    | Run completed, Type 1/2 differences found            |
//! | 2    | Usage error (bad arguments, no input file named)     |
//! | 3    | Invalid config (parse error, contradictory options)  |
//! | 4    | Input or runtime error (unreadable file, bad data)   |

/// Success - nothing to follow up.
pub const EXIT_SUCCESS: u8 = 0;

/// Differences found among Type 1 or Type 2 variables.
/// Like `diff(1)`, exit 1 means "datasets differ."
pub const EXIT_DIFFERENCES: u8 = 1;

/// Usage error - missing input path, bad arguments.
pub const EXIT_USAGE: u8 = 2;

/// Config could not be parsed or failed validation.
pub const EXIT_INVALID_CONFIG: u8 = 3;

/// Data could not be read, joined, or tested.
pub const EXIT_RUNTIME: u8 = 4;
