//! Text front end for the autopilot: scripts of `token[=:]arg` lines and a
//! plain-text settings store.

use std::time::Instant;

use tracing::{info, warn};

use crate::ascent::Autopilot;
use crate::error::Result;

const LINE_SEPS: &[char] = &['\n', '\r', '|', ';'];
const ASSIGN_SEPS: &[char] = &['=', ':'];
pub const STORE_HEADER: &str = "// if edited manually, reload with command 'load'";

/// Splits a script into command lines, each as its token list. Blank lines and
/// `//` comments are skipped; the first token is lowercased.
pub fn tokenize(script: &str) -> Vec<Vec<String>> {
    script
        .split(LINE_SEPS)
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("//"))
        .map(|line| {
            line.split(ASSIGN_SEPS)
                .map(str::trim)
                .enumerate()
                .map(|(i, t)| if i == 0 { t.to_ascii_lowercase() } else { t.to_string() })
                .collect()
        })
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct CommandAdapter {
    /// Settings text as last written by `save`.
    pub store: String,
}

impl CommandAdapter {
    pub fn new(store: impl Into<String>) -> Self {
        Self { store: store.into() }
    }

    /// Runs every line of `script`. Returns whether all of them were handled.
    /// With `save_changes`, the store is rewritten after the script if any line
    /// succeeded.
    pub fn run(&mut self, autopilot: &mut Autopilot, script: &str, now: Instant, save_changes: bool) -> bool {
        let mut all_ok = true;
        let mut changed = false;
        for tokens in tokenize(script) {
            let Some((token, args)) = tokens.split_first() else { continue };
            let outcome = match token.as_str() {
                "save" if args.is_empty() => {
                    self.save(autopilot);
                    Ok(())
                }
                "load" if args.is_empty() => self.load(autopilot),
                _ => {
                    let args: Vec<&str> = args.iter().map(String::as_str).collect();
                    autopilot.handle_command(token, &args, now)
                }
            };
            match outcome {
                Ok(()) => {
                    info!(command = %tokens.join("="), "ok");
                    changed = true;
                }
                Err(e) => {
                    warn!(command = %tokens.join("="), "{e}");
                    all_ok = false;
                }
            }
        }
        if save_changes && changed {
            self.save(autopilot);
        }
        all_ok
    }

    pub fn save(&mut self, autopilot: &Autopilot) {
        let mut text = String::from(STORE_HEADER);
        for (k, v) in autopilot.tunables.save() {
            text.push('\n');
            text.push_str(&k);
            text.push('=');
            text.push_str(&v);
        }
        self.store = text;
    }

    /// Re-applies the stored settings.
    pub fn load(&self, autopilot: &mut Autopilot) -> Result<()> {
        let lines = tokenize(&self.store);
        let pairs = lines
            .iter()
            .filter_map(|t| match t.as_slice() {
                [k, v] => Some((k.as_str(), v.as_str())),
                _ => None,
            });
        autopilot.tunables.load(pairs)
    }
}
