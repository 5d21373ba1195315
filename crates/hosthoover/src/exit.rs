//! Process exit codes

use hosthoover_core::RunReport;

/// Run completed; device failures are reported, not fatal
pub const COMPLETED: u8 = 0;
/// Aborted before dispatch (configuration, range, probe policy)
pub const ABORTED: u8 = 1;
/// Interrupted by a shutdown signal; report is partial
pub const PARTIAL: u8 = 2;

/// Exit code for a finalized run
pub fn code_for(report: &RunReport) -> u8 {
    if report.is_partial() {
        PARTIAL
    } else {
        COMPLETED
    }
}

#[cfg(test)]
mod tests {
    use chrono::Local;

    use super::*;

    #[test]
    fn test_codes() {
        let complete = RunReport::new("r1", Local::now(), Vec::new(), false);
        let partial = RunReport::new("r2", Local::now(), Vec::new(), true);
        assert_eq!(code_for(&complete), COMPLETED);
        assert_eq!(code_for(&partial), PARTIAL);
        assert_ne!(ABORTED, COMPLETED);
    }
}
