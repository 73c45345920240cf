use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

/// Status text shown while nothing is loaded.
pub const STATUS_STOPPED: &str = "Stopped";

/// Transient song text shown between `loadfile` and the first metadata.
pub const SONG_LOADING: &str = "Loading...";

/// Exit code passed to mpv's `quit` command.
pub const QUIT_CODE: i32 = 9;

/// Snapshot of what the player is doing.  The controller owns the live copy
/// and hands out clones after every change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackState {
    /// Station name, or `"Stopped"`.
    pub status: String,
    /// Display title; empty or `"Loading..."` until metadata arrives.
    pub song: String,
    /// 0–100 in steps of 5.
    pub volume: u8,
}

impl PlaybackState {
    pub fn stopped(volume: u8) -> Self {
        Self {
            status: STATUS_STOPPED.to_string(),
            song: String::new(),
            volume,
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.status == STATUS_STOPPED
    }
}

/// Commands written to mpv's JSON IPC socket, one object per line.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    LoadFile(String),
    Stop,
    SetVolume(u8),
    GetMetadata,
    Quit,
}

impl EngineCommand {
    pub fn to_value(&self) -> Value {
        match self {
            Self::LoadFile(url) => json!(["loadfile", url]),
            Self::Stop => json!(["stop"]),
            Self::SetVolume(volume) => json!(["set_property", "volume", volume]),
            Self::GetMetadata => json!(["get_property", "metadata"]),
            Self::Quit => json!(["quit", QUIT_CODE]),
        }
    }

    /// Newline-terminated wire form.
    pub fn to_line(&self) -> String {
        let mut line = json!({ "command": self.to_value() }).to_string();
        line.push('\n');
        line
    }
}

// ── metadata reply ────────────────────────────────────────────────────────────

/// Reply to `get_property metadata`.  Every field is optional; a field with
/// the wrong JSON type reads as absent instead of failing the whole decode.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetadataReply {
    #[serde(default, deserialize_with = "lenient_metadata")]
    pub data: Option<StreamMetadata>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StreamMetadata {
    #[serde(rename = "icy-title", default, deserialize_with = "lenient_string")]
    pub icy_title: Option<String>,
    #[serde(alias = "ARTIST", alias = "Artist", default, deserialize_with = "lenient_string")]
    pub artist: Option<String>,
    #[serde(alias = "TITLE", alias = "Title", default, deserialize_with = "lenient_string")]
    pub title: Option<String>,
}

/// Title to display, split into (artist, title).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongTitle {
    pub artist: String,
    pub title: String,
}

impl StreamMetadata {
    /// `icy-title` wins outright; otherwise artist and title are only used
    /// when both are present.
    pub fn song_title(&self) -> Option<SongTitle> {
        if let Some(icy) = &self.icy_title {
            return Some(SongTitle {
                artist: String::new(),
                title: icy.clone(),
            });
        }
        match (&self.artist, &self.title) {
            (Some(artist), Some(title)) => Some(SongTitle {
                artist: artist.clone(),
                title: title.clone(),
            }),
            _ => None,
        }
    }
}

impl MetadataReply {
    /// Decode a raw query response.  mpv may interleave unsolicited event
    /// lines on the same connection, so the first line that is not an event
    /// is taken as the reply.
    pub fn decode(raw: &[u8]) -> anyhow::Result<Self> {
        let text = std::str::from_utf8(raw)?;
        let mut last_err = None;
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let value: Value = match serde_json::from_str(line) {
                Ok(v) => v,
                Err(e) => {
                    last_err = Some(anyhow::Error::from(e));
                    continue;
                }
            };
            if value.get("event").is_some() {
                continue;
            }
            return Ok(serde_json::from_value(value)?);
        }
        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("no reply in engine response")))
    }

    pub fn song_title(&self) -> Option<SongTitle> {
        self.data.as_ref().and_then(StreamMetadata::song_title)
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        _ => None,
    })
}

fn lenient_metadata<'de, D>(deserializer: D) -> Result<Option<StreamMetadata>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(v @ Value::Object(_)) => StreamMetadata::deserialize(v).ok(),
        _ => None,
    })
}
