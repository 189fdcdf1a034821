//! CLI command implementations

pub mod analyze;
pub mod anonymize;
pub mod validate;

use anyhow::Context;
use std::io::Read;
use std::path::Path;

/// Exit code for success
pub const EXIT_OK: i32 = 0;
/// Exit code for configuration errors
pub const EXIT_CONFIG: i32 = 2;
/// Exit code for fatal errors
pub const EXIT_FATAL: i32 = 5;

/// Read a file, or stdin for `-`
pub(crate) fn read_input(input: &str) -> anyhow::Result<String> {
    if input == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read stdin")?;
        return Ok(buffer);
    }
    std::fs::read_to_string(Path::new(input)).with_context(|| format!("Failed to read {input}"))
}
