use std::{
    env, fs,
    path::{Path, PathBuf},
};

use crate::{domain::ReplyKind, errors::Error, Result};

/// Typed configuration for the formatting layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Use Matrix reply relations instead of rendered quote blocks.
    pub native_replies: bool,
    /// Make the reply label in quote blocks a permalink to the quoted event.
    pub message_link_in_reply: bool,
    pub reply_label: String,
    pub edit_label: String,
    /// JSON identity/message directory used by the CLI.
    pub directory_file: Option<PathBuf>,
    /// Bot API token for live profile lookups; offline without it.
    pub telegram_bot_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            native_replies: false,
            message_link_in_reply: false,
            reply_label: "Reply".to_string(),
            edit_label: "Edit".to_string(),
            directory_file: None,
            telegram_bot_token: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source (env, tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let native_replies = lookup("MXTG_NATIVE_REPLIES")
            .map(|s| parse_bool(&s))
            .unwrap_or(defaults.native_replies);
        let message_link_in_reply = lookup("MXTG_MESSAGE_LINK_IN_REPLY")
            .map(|s| parse_bool(&s))
            .unwrap_or(defaults.message_link_in_reply);

        let reply_label = lookup("MXTG_REPLY_LABEL").unwrap_or(defaults.reply_label);
        let edit_label = lookup("MXTG_EDIT_LABEL").unwrap_or(defaults.edit_label);
        for (key, value) in [
            ("MXTG_REPLY_LABEL", &reply_label),
            ("MXTG_EDIT_LABEL", &edit_label),
        ] {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("{key} must not be empty")));
            }
        }

        let directory_file = lookup("MXTG_DIRECTORY_FILE")
            .and_then(non_empty)
            .map(PathBuf::from);

        let telegram_bot_token = lookup("MXTG_TELEGRAM_TOKEN").and_then(non_empty);

        Ok(Self {
            native_replies,
            message_link_in_reply,
            reply_label,
            edit_label,
            directory_file,
            telegram_bot_token,
        })
    }

    /// Label used in front of quoted replies ("Reply" / "Edit").
    pub fn reply_label(&self, kind: ReplyKind) -> &str {
        match kind {
            ReplyKind::Reply => &self.reply_label,
            ReplyKind::Edit => &self.edit_label,
        }
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
