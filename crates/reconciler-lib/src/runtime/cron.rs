//! Crontab-backed periodic creation trigger

use super::command::run;
use super::CreationTrigger;
use crate::error::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;

/// Installs `* * * * * <create script>` in the invoking user's crontab
#[derive(Debug, Clone)]
pub struct CronTrigger {
    script: PathBuf,
    schedule: String,
}

impl CronTrigger {
    pub fn every_minute(script: impl Into<PathBuf>) -> Self {
        Self {
            script: script.into(),
            schedule: "* * * * *".to_string(),
        }
    }

    pub fn entry(&self) -> String {
        format!("{} {}", self.schedule, self.script.display())
    }

    /// Pipeline that drops existing lines for the script and appends ours
    pub fn install_command(&self) -> String {
        format!(
            "(crontab -l 2>/dev/null | grep -vF {}; echo {}) | crontab -",
            single_quoted(&self.script.display().to_string()),
            single_quoted(&self.entry())
        )
    }

    /// Pipeline that drops every line referencing the script
    pub fn remove_command(&self) -> String {
        format!(
            "crontab -l 2>/dev/null | grep -vF {} | crontab -",
            single_quoted(&self.script.display().to_string())
        )
    }
}

/// Quote `value` as one shell word; embedded `'` become `'\''`
fn single_quoted(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[async_trait]
impl CreationTrigger for CronTrigger {
    async fn install(&self) -> Result<()> {
        let command = self.install_command();
        run("bash", &["-c", command.as_str()], None).await?;
        info!(entry = %self.entry(), "Creation cron job installed");
        Ok(())
    }

    async fn remove(&self) -> Result<()> {
        let command = self.remove_command();
        run("bash", &["-c", command.as_str()], None).await?;
        info!(script = %self.script.display(), "Creation cron job removed");
        Ok(())
    }
}
