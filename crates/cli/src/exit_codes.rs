//! CLI Exit Code Registry
//!
//! Single source of truth for `linkwise` exit codes. Scripts rely on them.
//!
//! | Code | Meaning                                              |
//! |------|------------------------------------------------------|
//! | 0    | Success                                              |
//! | 2    | Usage error (bad arguments; clap exits with 2)       |
//! | 3    | Invalid config (TOML, schema, or rule definitions)   |
//! | 4    | Runtime error (unreadable files, bad data, matching) |

use linkwise_linkage::LinkError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// Config could not be parsed, failed validation, or holds a malformed rule.
pub const EXIT_INVALID_CONFIG: u8 = 3;

/// Input files unreadable, key fields missing or not unique, or a rule
/// failed while running.
pub const EXIT_RUNTIME: u8 = 4;

/// Map an engine error to its exit code.
pub fn link_exit_code(err: &LinkError) -> u8 {
    match err {
        LinkError::ConfigParse(_)
        | LinkError::ConfigValidation(_)
        | LinkError::InvalidCriterion { .. } => EXIT_INVALID_CONFIG,
        _ => EXIT_RUNTIME,
    }
}
