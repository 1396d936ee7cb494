//! The external add/submit primitive.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::info;

/// Environment variables passed through to remote jobs by default.
pub const DEFAULT_ENV_WHITELIST: &[&str] =
    &["CLASSPATH", "LD_LIBRARY_PATH", "PATH", "PERL5LIB", "REF_PATH"];

/// Errors from invoking the submit primitive.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// The primitive could not be started
    #[error("Cannot run '{command}': {source}")]
    Spawn {
        /// Command line
        command: String,
        /// Underlying OS error
        source: std::io::Error,
    },

    /// The primitive exited unsuccessfully
    #[error("'{command}' exited with {status}: {stderr}")]
    Failed {
        /// Command line
        command: String,
        /// Exit status description
        status: String,
        /// Captured standard error
        stderr: String,
    },
}

/// Options of the add primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOptions {
    /// Executable to run
    pub program: String,
    /// Working directory of remote jobs
    pub cwd: PathBuf,
    /// Disk requirement in GB
    pub disk: u32,
    /// Resource override level
    pub override_level: u8,
    /// Retries granted to each job by the scheduler
    pub retries: u32,
    /// Variables forwarded to remote jobs when set
    pub env_whitelist: Vec<String>,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            program: "wr".to_string(),
            cwd: PathBuf::from("."),
            disk: 0,
            override_level: 2,
            retries: 1,
            env_whitelist: DEFAULT_ENV_WHITELIST.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl SubmitOptions {
    /// Set the program.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Set the working directory.
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }

    /// Set the disk requirement.
    pub fn with_disk(mut self, disk: u32) -> Self {
        self.disk = disk;
        self
    }

    /// Set the override level.
    pub fn with_override(mut self, override_level: u8) -> Self {
        self.override_level = override_level;
        self
    }

    /// Set the retry count.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Replace the environment whitelist.
    pub fn with_env_whitelist<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.env_whitelist = names.into_iter().map(Into::into).collect();
        self
    }

    /// `K=V,K=V` for whitelisted variables that `lookup` finds, sorted by name.
    pub fn env_string<F>(&self, lookup: F) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut names: Vec<&str> = self.env_whitelist.iter().map(String::as_str).collect();
        names.sort_unstable();
        names.dedup();

        let pairs: Vec<String> = names
            .into_iter()
            .filter_map(|name| lookup(name).map(|value| format!("{}={}", name, value)))
            .collect();

        (!pairs.is_empty()).then(|| pairs.join(","))
    }

    /// Arguments of the add invocation for `file`.
    pub fn args(&self, file: &Path, env: Option<String>) -> Vec<String> {
        let mut args = vec![
            "add".to_string(),
            "--cwd".to_string(),
            self.cwd.to_string_lossy().into_owned(),
            "--disk".to_string(),
            self.disk.to_string(),
            "--override".to_string(),
            self.override_level.to_string(),
            "--retries".to_string(),
            self.retries.to_string(),
        ];
        if let Some(env) = env {
            args.push("--env".to_string());
            args.push(env);
        }
        args.push("-f".to_string());
        args.push(file.to_string_lossy().into_owned());
        args
    }
}

/// Hands a submission file to the scheduler.
#[async_trait]
pub trait Submitter: Send + Sync {
    /// Submit every record in `file`.
    async fn submit(&self, file: &Path) -> Result<(), SubmitError>;
}

/// Submits through the `wr add` command line.
#[derive(Debug, Clone, Default)]
pub struct WrSubmitter {
    options: SubmitOptions,
}

impl WrSubmitter {
    /// Create a submitter with the given options.
    pub fn new(options: SubmitOptions) -> Self {
        Self { options }
    }

    /// Arguments for `file`, reading the whitelist from the process environment.
    pub fn command_args(&self, file: &Path) -> Vec<String> {
        let env = self.options.env_string(|name| std::env::var(name).ok());
        self.options.args(file, env)
    }
}

#[async_trait]
impl Submitter for WrSubmitter {
    async fn submit(&self, file: &Path) -> Result<(), SubmitError> {
        let args = self.command_args(file);
        let command = format!("{} {}", self.options.program, args.join(" "));
        info!("Submitting: {}", command);

        let output = Command::new(&self.options.program)
            .args(&args)
            .output()
            .await
            .map_err(|source| SubmitError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(SubmitError::Failed {
                command,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}
