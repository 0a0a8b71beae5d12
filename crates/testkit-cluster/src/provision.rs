//! Provisioning steps are run by an external tool; this module only launches it.

use crate::error::ClusterError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Variables handed to a provisioning step.
pub type PlaybookVars = BTreeMap<String, String>;

/// Runs named provisioning playbooks and reports their exit status.
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Run `playbook`, limited to the host named by `subset` when given.
    ///
    /// Returns the exit status. Only a failure to launch is an error; a
    /// non-zero status is for the caller to judge.
    async fn run(
        &self,
        playbook: &str,
        vars: &PlaybookVars,
        subset: Option<&str>,
    ) -> Result<i32, ClusterError>;
}

/// Launches `program [args..] <playbook>.yml [--limit host] [-e key=value..]`.
///
/// With the defaults this is an `ansible-playbook` invocation against an
/// inventory; any tool accepting the same arguments works.
#[derive(Debug, Clone)]
pub struct CommandProvisioner {
    program: String,
    args: Vec<String>,
}

impl CommandProvisioner {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Ansible against `inventory`.
    pub fn ansible(inventory: impl Into<String>) -> Self {
        Self::new("ansible-playbook").with_args(["-i".to_string(), inventory.into()])
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = String>) -> Self {
        self.args.extend(args);
        self
    }

    fn command_args(&self, playbook: &str, vars: &PlaybookVars, subset: Option<&str>) -> Vec<String> {
        let mut args = self.args.clone();
        args.push(format!("{playbook}.yml"));
        if let Some(host) = subset {
            args.push("--limit".to_string());
            args.push(host.to_string());
        }
        for (key, value) in vars {
            args.push("-e".to_string());
            args.push(format!("{key}={value}"));
        }
        args
    }
}

#[async_trait]
impl Provisioner for CommandProvisioner {
    async fn run(
        &self,
        playbook: &str,
        vars: &PlaybookVars,
        subset: Option<&str>,
    ) -> Result<i32, ClusterError> {
        let args = self.command_args(playbook, vars, subset);
        info!("Running provisioning step '{playbook}'");
        debug!("{} {}", self.program, args.join(" "));

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| ClusterError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        // Killed by a signal.
        let status = output.status.code().unwrap_or(-1);
        if status != 0 {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("'{playbook}' exited with {status}: {}", stderr.trim());
        }
        Ok(status)
    }
}

/// Fail with [`ClusterError::Provision`] unless `status` is 0.
pub(crate) fn ensure_success(playbook: &str, status: i32) -> Result<(), ClusterError> {
    if status == 0 {
        Ok(())
    } else {
        Err(ClusterError::Provision {
            playbook: playbook.to_string(),
            status,
        })
    }
}
