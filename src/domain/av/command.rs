use std::path::Path;

use crate::domain::options::EncodeOptions;
use crate::domain::workspace::Workspace;

/// Widest output the scale filter lets through.
pub const DEFAULT_MAX_WIDTH: u32 = 3840;

/// Process-wide settings for building transcode commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeSettings {
    /// ffmpeg binary name or path
    pub program: String,
    pub max_width: u32,
}

impl Default for TranscodeSettings {
    fn default() -> Self {
        Self {
            program: String::from("ffmpeg"),
            max_width: DEFAULT_MAX_WIDTH,
        }
    }
}

/// A fully-resolved external invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl TranscodeCommand {
    /// H.264/AAC mp4 from the workspace input into the workspace output.
    ///
    /// `subtitles` should be absolute: the subtitles filter resolves relative
    /// paths against ffmpeg's working directory.
    pub fn build(
        settings: &TranscodeSettings,
        workspace: &Workspace,
        options: &EncodeOptions,
        subtitles: Option<&Path>,
    ) -> Self {
        let input = workspace.input_path();
        let output = workspace.output_path();

        let args: Vec<String> = vec![
            "-y".into(),
            "-i".into(),
            input.to_string_lossy().into_owned(),
            "-vf".into(),
            video_filter(settings.max_width, subtitles),
            "-c:v".into(),
            "libx264".into(),
            "-preset".into(),
            options.ffmpeg_preset.clone(),
            "-profile:v".into(),
            "high".into(),
            "-level".into(),
            "4.2".into(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            "-crf".into(),
            options.crf_arg(),
            "-movflags".into(),
            "+faststart".into(),
            "-c:a".into(),
            "aac".into(),
            "-b:a".into(),
            format!("{}k", options.audio_bitrate_arg()),
            "-ac".into(),
            options.channels().to_string(),
            output.to_string_lossy().into_owned(),
        ];

        Self {
            program: settings.program.clone(),
            args,
        }
    }

    /// Value following `flag`, if present.
    pub fn arg_after(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|arg| arg == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }
}

/// Cap the width (keeping aspect ratio, even height) and optionally burn in
/// a subtitle file.
pub fn video_filter(max_width: u32, subtitles: Option<&Path>) -> String {
    let scale = format!("scale='min({},iw)':-2", max_width);
    match subtitles {
        Some(path) => format!("{},subtitles='{}'", scale, escape_filter_path(path)),
        None => scale,
    }
}

/// Backslashes and colons are separators in the filter-graph syntax.
pub fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "\\\\")
        .replace(':', "\\:")
}
