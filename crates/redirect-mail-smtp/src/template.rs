//! Plain-text mail templates.
//!
//! A template file starts with a `Subject: ...` line, the rest is the body.
//! `{key}` placeholders anywhere in the file are substituted before parsing.

use std::path::{Path, PathBuf};

use redirect_core::{Error, Result};

pub const DNS_CLEAN: &str = "dns_clean.txt";
pub const SUBSCRIPTION_TRIAL: &str = "subscription_trial.txt";
pub const ACCOUNT_LOCK_SOON: &str = "account_lock_soon.txt";
pub const ACCOUNT_LOCKED: &str = "account_locked.txt";

const SUBJECT_PREFIX: &str = "Subject: ";

/// A rendered notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub subject: String,
    pub body: String,
}

/// Substitute placeholders and split off the subject line
pub fn render(template: &str, substitutions: &[(&str, &str)]) -> Result<Rendered> {
    let mut text = template.to_string();
    for (key, value) in substitutions {
        text = text.replace(&format!("{{{}}}", key), value);
    }

    let (subject_line, body) = text
        .split_once('\n')
        .ok_or_else(|| Error::mail("cannot parse template: missing subject line"))?;
    let subject = subject_line.replace(SUBJECT_PREFIX, "");

    Ok(Rendered {
        subject: subject.trim_end_matches('\r').to_string(),
        body: body.to_string(),
    })
}

/// Template directory
#[derive(Debug, Clone)]
pub struct Templates {
    dir: PathBuf,
}

impl Templates {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Read and render one template, re-read on every call so edits apply
    /// without a restart
    pub async fn render(&self, name: &str, substitutions: &[(&str, &str)]) -> Result<Rendered> {
        let path = self.dir.join(name);
        let template = tokio::fs::read_to_string(&path).await.map_err(|e| {
            tracing::error!(template = %path.display(), "Unable to read email template: {}", e);
            Error::mail(format!("unable to read template {}: {}", path.display(), e))
        })?;
        render(&template, substitutions)
    }

    /// Fail fast when a notification template is missing
    pub fn check(&self) -> Result<()> {
        for name in [DNS_CLEAN, SUBSCRIPTION_TRIAL, ACCOUNT_LOCK_SOON, ACCOUNT_LOCKED] {
            let path = self.dir.join(name);
            if !path.is_file() {
                return Err(Error::config(format!(
                    "mail template not found: {}",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}
