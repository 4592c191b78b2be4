//! Starts the render worker and other sidecar processes ahead of the interaction server.

use core::time::Duration;
use tokio::process::{Child, Command};

/// Command lines to spawn, in order: the render worker first, then the `;`-separated sidecars.
pub fn command_lines(render: Option<&str>, sidecars: Option<&str>) -> Vec<String> {
    render
        .into_iter()
        .chain(sidecars.into_iter().flat_map(|lines| lines.split(';')))
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

fn command(line: &str) -> Option<Command> {
    let mut words = line.split_whitespace();
    let mut command = Command::new(words.next()?);
    command.args(words).kill_on_drop(true);
    Some(command)
}

/// Running sidecars. Dropping this kills them.
pub struct Sidecars(Vec<(String, Child)>);

impl Sidecars {
    /// Spawns each command in order, pausing after each so that it can warm up before the next one.
    pub async fn spawn(lines: Vec<String>, delay: Duration) -> std::io::Result<Self> {
        let mut children = Vec::with_capacity(lines.len());
        for line in lines {
            let Some(mut command) = command(&line) else {
                continue;
            };
            let child = command.spawn()?;
            log::info!("spawned sidecar `{line}` with pid {:?}", child.id());
            children.push((line, child));
            tokio::time::sleep(delay).await;
        }
        Ok(Self(children))
    }

    /// Kills the sidecars in reverse start order and reaps them.
    pub async fn shutdown(self) {
        for (line, mut child) in self.0.into_iter().rev() {
            match child.try_wait() {
                Ok(Some(status)) => log::warn!("sidecar `{line}` had already exited with {status}"),
                Ok(None) => match child.kill().await {
                    Ok(()) => log::info!("stopped sidecar `{line}`"),
                    Err(err) => log::error!("failed to stop sidecar `{line}`: {err}"),
                },
                Err(err) => log::error!("failed to poll sidecar `{line}`: {err}"),
            }
        }
    }
}
