/// Whether `job_status` should be recorded. This is a substring check on
/// the raw notify-when string, so `"failure,success"` matches `"failure"`
/// and also `"fail"`.
pub fn should_notify(job_status: &str, notify_when: &str) -> bool {
    notify_when.contains(job_status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_in_list_notifies() {
        assert!(should_notify("failure", "failure,success"));
        assert!(should_notify("success", "failure,success"));
        assert!(should_notify("cancelled", "cancelled"));
    }

    #[test]
    fn status_not_in_list_is_skipped() {
        assert!(!should_notify("success", "failure"));
        assert!(!should_notify("cancelled", "failure,success"));
    }

    #[test]
    fn comparison_is_case_sensitive_substring() {
        assert!(should_notify("fail", "failure"));
        assert!(!should_notify("Failure", "failure"));
    }
}
