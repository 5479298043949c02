//! Progress events emitted while a reconciliation downloads files.

/// Snapshot sent after each completed download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileProgress {
    /// Path of the file that just finished.
    pub path: String,
    /// Bytes written for that file.
    pub bytes: u64,
    pub files_done: usize,
    pub files_total: usize,
    pub bytes_done: u64,
    /// Sum of the manifest sizes of every selected file.
    pub bytes_total: u64,
    /// `floor(bytes_done * 100 / bytes_total)`, capped at 100.
    pub percent: u8,
}

/// Percentage of `total` covered by `done`, floored and capped at 100. An
/// empty total counts as complete.
pub fn percent(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let pct = (u128::from(done) * 100) / u128::from(total);
    pct.min(100) as u8
}

/// Format a byte count the way progress lines show it.
pub fn human_size(bytes: u64) -> String {
    if bytes > 1024 * 1024 {
        format!("{:.2} MB", bytes as f64 / 1024.0 / 1024.0)
    } else {
        format!("{:.2} KB", bytes as f64 / 1024.0)
    }
}
