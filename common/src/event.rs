use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

use crate::inputs::{ActionInputs, CiContext};

/// Format accepted by BigQuery for TIMESTAMP columns in streaming inserts.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f UTC";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct JobId(pub String);

impl JobId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One row of the job events table. Fields are declared in schema order and
/// stay private so a built event cannot be changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobEvent {
    job_id: JobId,
    #[serde(serialize_with = "serialize_timestamp")]
    job_date: DateTime<Utc>,
    job_status: String,
    job_name: String,
    job_title: String,
    job_message: String,
    job_stat: Option<String>,
    git_workflow: Option<String>,
    git_run_id: Option<String>,
    git_job: Option<String>,
}

impl JobEvent {
    /// Build an event from the collected inputs. Fails when any required
    /// field is empty.
    pub fn new(
        job_id: JobId,
        job_date: DateTime<Utc>,
        inputs: &ActionInputs,
        ci: &CiContext,
    ) -> Result<Self> {
        let required = [
            ("job_status", &inputs.job_status),
            ("job_name", &inputs.job_name),
            ("job_title", &inputs.job_title),
            ("job_message", &inputs.job_message),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                bail!("{} must not be empty", field);
            }
        }
        if job_id.0.is_empty() {
            bail!("job_id must not be empty");
        }

        Ok(Self {
            job_id,
            job_date,
            job_status: inputs.job_status.clone(),
            job_name: inputs.job_name.clone(),
            job_title: inputs.job_title.clone(),
            job_message: inputs.job_message.clone(),
            job_stat: inputs.job_stat.clone(),
            git_workflow: ci.workflow.clone(),
            git_run_id: ci.run_id.clone(),
            git_job: ci.job.clone(),
        })
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn job_date(&self) -> DateTime<Utc> {
        self.job_date
    }

    pub fn job_status(&self) -> &str {
        &self.job_status
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    pub fn job_title(&self) -> &str {
        &self.job_title
    }

    pub fn job_message(&self) -> &str {
        &self.job_message
    }

    pub fn job_stat(&self) -> Option<&str> {
        self.job_stat.as_deref()
    }

    pub fn git_workflow(&self) -> Option<&str> {
        self.git_workflow.as_deref()
    }

    pub fn git_run_id(&self) -> Option<&str> {
        self.git_run_id.as_deref()
    }

    pub fn git_job(&self) -> Option<&str> {
        self.git_job.as_deref()
    }

    pub fn formatted_date(&self) -> String {
        self.job_date.format(TIMESTAMP_FORMAT).to_string()
    }
}

fn serialize_timestamp<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(&date.format(TIMESTAMP_FORMAT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inputs::tests::action_env;
    use crate::JOB_EVENT_SCHEMA;
    use chrono::TimeZone;

    fn inputs() -> ActionInputs {
        let env = action_env();
        ActionInputs::from_lookup(|k| env.get(k).cloned()).unwrap()
    }

    fn ci() -> CiContext {
        CiContext {
            workflow: Some("CI".to_string()),
            run_id: Some("4242".to_string()),
            job: Some("test".to_string()),
            ..Default::default()
        }
    }

    fn fixed_date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap()
    }

    #[test]
    fn serialized_keys_follow_table_schema() {
        let event = JobEvent::new(JobId::generate(), fixed_date(), &inputs(), &ci()).unwrap();
        let text = serde_json::to_string(&event).unwrap();

        let mut last = 0;
        for field in JOB_EVENT_SCHEMA.iter() {
            let key = format!("\"{}\":", field.name);
            let offset = text
                .find(&key)
                .unwrap_or_else(|| panic!("{} missing from {}", field.name, text));
            assert!(
                offset >= last,
                "{} serialized out of schema order in {}",
                field.name,
                text
            );
            last = offset;
        }

        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value.as_object().unwrap().len(), JOB_EVENT_SCHEMA.len());
    }

    #[test]
    fn getters_expose_built_fields() {
        let event = JobEvent::new(JobId("abc".into()), fixed_date(), &inputs(), &ci()).unwrap();
        assert_eq!(event.job_name(), "build");
        assert_eq!(event.job_title(), "Nightly build");
        assert_eq!(event.job_message(), "tests failed on linux");
        assert_eq!(event.formatted_date(), "2024-03-05 14:07:09.000000 UTC");
    }

    #[test]
    fn serializes_timestamp_and_ci_fields() {
        let event = JobEvent::new(JobId("abc".into()), fixed_date(), &inputs(), &ci()).unwrap();
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["job_id"], "abc");
        assert_eq!(json["job_date"], "2024-03-05 14:07:09.000000 UTC");
        assert_eq!(json["job_status"], "failure");
        assert_eq!(json["git_run_id"], "4242");
        assert!(json["job_stat"].is_null());
    }

    #[test]
    fn rejects_empty_required_field() {
        let mut inputs = inputs();
        inputs.job_title = " ".to_string();
        let err = JobEvent::new(JobId::generate(), fixed_date(), &inputs, &ci()).unwrap_err();
        assert_eq!(err.to_string(), "job_title must not be empty");
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = JobId::generate();
        let b = JobId::generate();
        assert_ne!(a, b);
        assert_eq!(a.0.len(), 36);
    }
}
