//! Output formatting for the packager CLI.
//!
//! Progress lines, the success banner, and `du -h` style size strings.

use crate::archive::ArchiveDescriptor;
use crate::function_name::FunctionName;
use std::io::Write;

const UNITS: [char; 4] = ['K', 'M', 'G', 'T'];

/// Format a byte count the way `du -h` does: binary units, rounded up, one
/// decimal below ten.
///
/// # Examples
///
/// ```
/// use lambda_packager::output::human_size;
///
/// assert_eq!(human_size(512), "512B");
/// assert_eq!(human_size(1536), "1.5K");
/// assert_eq!(human_size(20 * 1024 * 1024), "20M");
/// ```
#[must_use]
pub fn human_size(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{bytes}B");
    }

    let bytes = u128::from(bytes);
    let mut unit_index = 0;
    let mut unit: u128 = 1024;
    while unit_index + 1 < UNITS.len() && bytes >= unit * 1024 {
        unit *= 1024;
        unit_index += 1;
    }

    let tenths = (bytes * 10).div_ceil(unit);
    if tenths < 100 {
        return format!("{}.{}{}", tenths / 10, tenths % 10, UNITS[unit_index]);
    }

    let whole = bytes.div_ceil(unit);
    if whole >= 1024 && unit_index + 1 < UNITS.len() {
        return format!("1.0{}", UNITS[unit_index + 1]);
    }
    format!("{whole}{}", UNITS[unit_index])
}

/// Format the banner printed after a successful build.
#[must_use]
pub fn success_banner(function_name: &FunctionName, descriptor: &ArchiveDescriptor) -> String {
    let file_name = descriptor
        .path
        .file_name()
        .unwrap_or(descriptor.path.as_str());
    format!(
        concat!(
            "Deployment package created: {}\n",
            "  Function: {}\n",
            "  Archive:  {}\n",
            "  Size:     {}"
        ),
        file_name,
        function_name,
        descriptor.path,
        human_size(descriptor.size_bytes)
    )
}

/// Format the summary printed by `inspect`.
#[must_use]
pub fn inspection_summary(descriptor: &ArchiveDescriptor) -> String {
    let mut text = format!(
        "{} ({}, {} entries)\n  sha256: {}\n  root:",
        descriptor.path,
        human_size(descriptor.size_bytes),
        descriptor.entries.len(),
        descriptor.sha256
    );
    for member in descriptor.root_members() {
        text.push_str("\n    ");
        text.push_str(member);
    }
    text
}

/// Write a line, ignoring failures; progress output is best-effort.
pub fn write_line(out: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(out, "{message}").is_err() {
        // Best-effort output; ignore write failures.
    }
}
