pub mod event;
pub mod inputs;
pub mod schema;

pub use event::{JobEvent, JobId};
pub use inputs::{ActionInputs, CiContext};
pub use schema::{FieldMode, FieldSchema, FieldType, JOB_EVENT_SCHEMA};

// CI-provided environment
pub const ENV_GITHUB_WORKFLOW: &str = "GITHUB_WORKFLOW";
pub const ENV_GITHUB_REPOSITORY: &str = "GITHUB_REPOSITORY";
pub const ENV_GITHUB_REF: &str = "GITHUB_REF";
pub const ENV_GITHUB_SHA: &str = "GITHUB_SHA";
pub const ENV_GITHUB_RUN_ID: &str = "GITHUB_RUN_ID";
pub const ENV_GITHUB_JOB: &str = "GITHUB_JOB";

// Action inputs
pub const ENV_JOB_STATUS: &str = "INPUT_JOB_STATUS";
pub const ENV_JOB_NAME: &str = "INPUT_JOB_NAME";
pub const ENV_JOB_TITLE: &str = "INPUT_JOB_TITLE";
pub const ENV_JOB_MESSAGE: &str = "INPUT_JOB_MESSAGE";
pub const ENV_JOB_STAT: &str = "INPUT_JOB_STAT";
pub const ENV_PROJECT: &str = "INPUT_PROJECT";
pub const ENV_DATASET: &str = "INPUT_DATASET";
pub const ENV_TABLE: &str = "INPUT_TABLE";
pub const ENV_NOTIFY_WHEN: &str = "INPUT_NOTIFY_WHEN";

pub const SHORT_SHA_LEN: usize = 7;
