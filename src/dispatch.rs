//! Focus event dispatch
//!
//! Takes focus changes from the window source, looks up the first matching
//! rule, and drives the kanata client. Keeps the last handled window so
//! repeated notifications for the same window are ignored.

use anyhow::Result;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::kanata::KanataClient;
use crate::wm::WindowDescription;

pub struct Dispatcher {
    config: Config,
    kanata: KanataClient,
    last_seen: Option<(String, String)>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(config: Config, kanata: KanataClient) -> Self {
        Self {
            config,
            kanata,
            last_seen: None,
        }
    }

    pub fn kanata_mut(&mut self) -> &mut KanataClient {
        &mut self.kanata
    }

    /// Handle one focus change.
    ///
    /// The last-seen cache only advances after a confirmed layer switch, so
    /// a window whose rule carries no layer keeps being evaluated and a
    /// failed no-op switch can be retried on the next event.
    pub async fn handle_focus(&mut self, win: WindowDescription) -> Result<()> {
        if self
            .last_seen
            .as_ref()
            .is_some_and(|(class, title)| *class == win.class && *title == win.title)
        {
            return Ok(());
        }

        let (layer, cmd, fake_key, set_mouse) = {
            let Some(rule) = self.config.detect_rule(&win) else {
                debug!("No rule matches {}: {}", win.class, win.title);
                return Ok(());
            };
            let Some(layer) = rule.layer.clone() else {
                debug!("Matched rule has no layer for {}: {}", win.class, win.title);
                return Ok(());
            };
            (layer, rule.cmd.clone(), rule.fake_key.clone(), rule.set_mouse)
        };

        if !self.kanata.change_layer(&layer).await? {
            return Ok(());
        }
        info!("Switched to layer '{layer}' for {}: {}", win.class, win.title);
        self.last_seen = Some((win.class, win.title));

        if let Some(cmd) = cmd {
            run_command_background(cmd);
        }
        if let Some(key) = fake_key {
            self.kanata.act_on_fake_key(&key).await?;
        }
        if let Some((x, y)) = set_mouse {
            self.kanata.set_mouse(x, y).await?;
        }
        Ok(())
    }
}

/// Run a shell command detached from the dispatch path. Failures only show
/// up in the log.
fn run_command_background(cmd: String) {
    debug!("Running command: {cmd}");
    tokio::spawn(async move {
        let shown = cmd.clone();
        let result = tokio::task::spawn_blocking(move || {
            std::process::Command::new("sh").arg("-c").arg(&cmd).status()
        })
        .await;
        match result {
            Ok(Ok(status)) if status.success() => {}
            Ok(Ok(status)) => error!("Command '{shown}' exited with {status}"),
            Ok(Err(e)) => error!("Failed to run command '{shown}': {e}"),
            Err(e) => error!("Command task for '{shown}' panicked: {e}"),
        }
    });
}
