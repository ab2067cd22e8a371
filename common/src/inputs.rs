use anyhow::{anyhow, Result};

use crate::*;

/// Values supplied to the action by the workflow author.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionInputs {
    pub job_status: String,
    pub job_name: String,
    pub job_title: String,
    pub job_message: String,
    pub job_stat: Option<String>,
    pub project: String,
    pub dataset: String,
    pub table: String,
    pub notify_when: String,
}

impl ActionInputs {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Collect inputs through `lookup`. An unset required input is an error;
    /// an empty one is accepted here and rejected when the event is built.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| lookup(key).ok_or_else(|| anyhow!("{} is missing", key));

        Ok(Self {
            job_status: required(ENV_JOB_STATUS)?,
            job_name: required(ENV_JOB_NAME)?,
            job_title: required(ENV_JOB_TITLE)?,
            job_message: required(ENV_JOB_MESSAGE)?,
            job_stat: optional(&lookup, ENV_JOB_STAT),
            project: required(ENV_PROJECT)?,
            dataset: required(ENV_DATASET)?,
            table: required(ENV_TABLE)?,
            notify_when: required(ENV_NOTIFY_WHEN)?,
        })
    }
}

/// Environment the CI runner exports for every job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CiContext {
    pub workflow: Option<String>,
    pub repository: Option<String>,
    pub git_ref: Option<String>,
    pub sha: Option<String>,
    pub run_id: Option<String>,
    pub job: Option<String>,
}

impl CiContext {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            workflow: optional(&lookup, ENV_GITHUB_WORKFLOW),
            repository: optional(&lookup, ENV_GITHUB_REPOSITORY),
            git_ref: optional(&lookup, ENV_GITHUB_REF),
            sha: optional(&lookup, ENV_GITHUB_SHA),
            run_id: optional(&lookup, ENV_GITHUB_RUN_ID),
            job: optional(&lookup, ENV_GITHUB_JOB),
        }
    }

    pub fn short_sha(&self) -> Option<&str> {
        self.sha.as_deref().map(|sha| match sha.char_indices().nth(SHORT_SHA_LEN) {
            Some((idx, _)) => &sha[..idx],
            None => sha,
        })
    }
}

fn optional<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|v| !v.trim().is_empty())
}
