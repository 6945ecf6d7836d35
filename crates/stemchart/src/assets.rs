use std::path::{Path, PathBuf};

use crate::channel::ChannelKind;

/// Default asset directory name, resolved next to the executable
pub const DEFAULT_ASSET_DIR: &str = "audio";

/// Maps a channel to the file that holds its stem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetLocator {
    dir: PathBuf,
    extension: String,
}

impl AssetLocator {
    pub fn new(dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        let extension = extension.into();
        Self {
            dir: dir.into(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    /// `audio/` beside the running executable, falling back to the working
    /// directory when the executable path is unknown
    pub fn beside_executable(extension: impl Into<String>) -> Self {
        let base = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."));
        Self::new(base.join(DEFAULT_ASSET_DIR), extension)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// `<dir>/<lower-cased label>.<extension>`
    pub fn path_for(&self, kind: ChannelKind) -> PathBuf {
        self.dir.join(format!(
            "{}.{}",
            kind.label().to_lowercase(),
            self.extension
        ))
    }
}
