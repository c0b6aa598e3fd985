use std::path::{Path, PathBuf};

pub const INPUT_FILE: &str = "input_file";
pub const SUBTITLE_FILE: &str = "input.srt";
pub const OPTIONS_FILE: &str = "options.json";
pub const OUTPUT_FILE: &str = "output.mp4";

/// Private directory owned by exactly one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn input_path(&self) -> PathBuf {
        self.root.join(INPUT_FILE)
    }

    pub fn subtitle_path(&self) -> PathBuf {
        self.root.join(SUBTITLE_FILE)
    }

    pub fn options_path(&self) -> PathBuf {
        self.root.join(OPTIONS_FILE)
    }

    pub fn output_path(&self) -> PathBuf {
        self.root.join(OUTPUT_FILE)
    }
}
