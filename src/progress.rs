//! Upload progress reporting.

/// A snapshot of how much of an upload has been handed to the connection.
///
/// # Examples
///
/// ```
/// use netpoint::UploadProgress;
///
/// let progress = UploadProgress::new(50, 200);
/// assert_eq!(progress.percentage(), 25.0);
///
/// // Unknown totals report zero rather than dividing by zero.
/// assert_eq!(UploadProgress::new(0, 0).percentage(), 0.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    /// Bytes sent so far in this attempt.
    pub bytes_sent: u64,
    /// Total bytes expected for this attempt.
    pub total_bytes: u64,
}

impl UploadProgress {
    /// Creates a new progress snapshot.
    pub fn new(bytes_sent: u64, total_bytes: u64) -> Self {
        Self {
            bytes_sent,
            total_bytes,
        }
    }

    /// Percentage of the upload completed, `0.0` when the total is unknown.
    pub fn percentage(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        self.bytes_sent as f64 / self.total_bytes as f64 * 100.0
    }

    /// Returns `true` once every expected byte has been sent.
    pub fn is_complete(&self) -> bool {
        self.total_bytes > 0 && self.bytes_sent >= self.total_bytes
    }
}
