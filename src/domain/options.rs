use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Encoder knobs a client may set per job. Missing fields take defaults.
///
/// Numeric knobs are kept as raw JSON and handed to ffmpeg as text, so
/// `"20"`, `20` and `20.5` are all accepted; ffmpeg judges the value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeOptions {
    /// x264 speed/quality preset
    pub ffmpeg_preset: String,
    /// x264 quality target
    pub constant_rate_factor: Value,
    /// Stereo when truthy, mono otherwise
    pub stereo: Value,
    /// Audio bitrate in kbps
    pub audio_bitrate: Value,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            ffmpeg_preset: String::from("medium"),
            constant_rate_factor: Value::from(23),
            stereo: Value::Bool(true),
            audio_bitrate: Value::from(128),
        }
    }
}

impl EncodeOptions {
    pub fn channels(&self) -> u8 {
        if is_truthy(&self.stereo) {
            2
        } else {
            1
        }
    }

    pub fn crf_arg(&self) -> String {
        argument_text(&self.constant_rate_factor)
    }

    /// Bitrate without the `k` suffix
    pub fn audio_bitrate_arg(&self) -> String {
        argument_text(&self.audio_bitrate)
    }

    /// Parse the options document stored in a workspace.
    pub fn from_document(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

/// Strings go through unquoted, everything else as its JSON text.
fn argument_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// `false`, `null`, zero and empty strings, arrays or objects are false.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

/// Normalise a client-supplied options document at submission time.
///
/// Anything that is not a JSON object is replaced by `{}`; field types are
/// not checked here and are only interpreted when the job runs.
pub fn normalize_document(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Value::Object(map),
        _ => Value::Object(Map::new()),
    }
}
