use std::process::{Command, Stdio};

use anyhow::{anyhow, Context, Result};
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};

use crate::models::{Target, HUB_PROCESS, HUB_SCHEME};

/// One technique for asking the OS to open a URL from a constrained caller.
///
/// Implementations are synchronous; the invoker runs each attempt on a
/// blocking task with a budget and discards results that arrive after the
/// budget is spent. An error means "this technique did not work here", not
/// that the handoff failed.
pub trait ActivationStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn attempt(&self, url: &str) -> Result<()>;
}

/// First tier: the blessed desktop open call, detached so the caller never
/// waits on the launched process.
pub struct DetachedOpenStrategy;

impl ActivationStrategy for DetachedOpenStrategy {
    fn name(&self) -> &'static str {
        "detached-open"
    }

    fn attempt(&self, url: &str) -> Result<()> {
        open::that_detached(url).with_context(|| format!("detached open of {url} failed"))
    }
}

/// Second tier: spawn the platform launcher binary directly and require a
/// clean exit. Slower than tier one, but works where the desktop portal is
/// unavailable to the caller.
pub struct LauncherCommandStrategy;

impl LauncherCommandStrategy {
    fn command(url: &str) -> Command {
        #[cfg(target_os = "macos")]
        {
            let mut cmd = Command::new("open");
            cmd.arg(url);
            cmd
        }

        #[cfg(target_os = "windows")]
        {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", "start", "", url]);
            cmd
        }

        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        {
            let mut cmd = Command::new("xdg-open");
            cmd.arg(url);
            cmd
        }
    }
}

impl ActivationStrategy for LauncherCommandStrategy {
    fn name(&self) -> &'static str {
        "launcher-command"
    }

    fn attempt(&self, url: &str) -> Result<()> {
        let status = Self::command(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .context("launcher binary did not start")?;
        if status.success() {
            Ok(())
        } else {
            Err(anyhow!("launcher exited with {status}"))
        }
    }
}

/// Last tier: if the destination app is already alive it will pick the
/// record up from the wake signal or its next poll, so the request counts
/// as handled even though no URL was opened.
pub struct ResidentProcessStrategy;

impl ActivationStrategy for ResidentProcessStrategy {
    fn name(&self) -> &'static str {
        "resident-process"
    }

    fn attempt(&self, url: &str) -> Result<()> {
        let scheme = url.split("://").next().unwrap_or_default();
        let process_name = if scheme == HUB_SCHEME {
            HUB_PROCESS
        } else {
            Target::from_scheme(scheme)
                .ok_or_else(|| anyhow!("no known destination for scheme '{scheme}'"))?
                .process_name()
        };

        if process_is_running(process_name) {
            Ok(())
        } else {
            Err(anyhow!("{process_name} is not running"))
        }
    }
}

fn process_is_running(name: &str) -> bool {
    let mut system = System::new();
    system.refresh_processes_specifics(ProcessesToUpdate::All, ProcessRefreshKind::new());
    system.processes().values().any(|process| {
        let process_name = process.name().to_string_lossy();
        process_name == name || process_name.starts_with(&format!("{name}-"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resident_process_rejects_unknown_schemes() {
        let err = ResidentProcessStrategy
            .attempt("mailto://nobody?x=1")
            .unwrap_err();
        assert!(err.to_string().contains("no known destination"));
    }
}
