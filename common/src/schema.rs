use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldType {
    String,
    Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldMode {
    Required,
    Nullable,
}

/// One column of the destination table, serialized the way the BigQuery
/// tables API expects (`{"name", "type", "mode"}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldSchema {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub mode: FieldMode,
}

impl FieldSchema {
    const fn required(name: &'static str, field_type: FieldType) -> Self {
        Self { name, field_type, mode: FieldMode::Required }
    }

    const fn nullable(name: &'static str) -> Self {
        Self { name, field_type: FieldType::String, mode: FieldMode::Nullable }
    }

    pub fn is_required(&self) -> bool {
        self.mode == FieldMode::Required
    }
}

/// Fixed schema of the job events table. Column order matches the field
/// order of `JobEvent`.
pub const JOB_EVENT_SCHEMA: [FieldSchema; 10] = [
    FieldSchema::required("job_id", FieldType::String),
    FieldSchema::required("job_date", FieldType::Timestamp),
    FieldSchema::required("job_status", FieldType::String),
    FieldSchema::required("job_name", FieldType::String),
    FieldSchema::required("job_title", FieldType::String),
    FieldSchema::required("job_message", FieldType::String),
    FieldSchema::nullable("job_stat"),
    FieldSchema::nullable("git_workflow"),
    FieldSchema::nullable("git_run_id"),
    FieldSchema::nullable("git_job"),
];
