use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static EXE_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Marker subdirectory that identifies a recorded session.
pub const SCRIBER_DIR_NAME: &str = "01_scriber";

/// Output subdirectory written next to the recorder inputs.
pub const ANALYTICS_DIR_NAME: &str = "02_scriber_analytics";

/// Returns the directory containing the executable.
pub fn get_exe_dir() -> &'static PathBuf {
    EXE_DIR.get_or_init(|| {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
    })
}

/// Returns the logs directory: `<exe_dir>/logs/`
pub fn get_logs_dir() -> PathBuf {
    get_exe_dir().join("logs")
}

/// Returns the default digit template directory: `<exe_dir>/resources/digits/`
pub fn get_digit_template_dir() -> PathBuf {
    get_exe_dir().join("resources").join("digits")
}

/// Returns the default config file: `<exe_dir>/config.json`
pub fn get_config_path() -> PathBuf {
    get_exe_dir().join("config.json")
}

/// Ensures the logs directory exists. Call at startup.
pub fn ensure_directories() -> std::io::Result<()> {
    std::fs::create_dir_all(get_logs_dir())
}

/// Input and output locations of one recorded session.
#[derive(Debug, Clone)]
pub struct SessionPaths {
    pub actions: PathBuf,
    pub video: PathBuf,
    pub analytics_dir: PathBuf,
}

impl SessionPaths {
    pub fn new(session_dir: &Path) -> Self {
        let scriber_dir = session_dir.join(SCRIBER_DIR_NAME);
        Self {
            actions: scriber_dir.join("actions.json"),
            video: scriber_dir.join("video.webm"),
            analytics_dir: session_dir.join(ANALYTICS_DIR_NAME),
        }
    }

    /// `02_scriber_analytics/screenshots/`
    pub fn screenshots_dir(&self) -> PathBuf {
        self.analytics_dir.join("screenshots")
    }

    /// `02_scriber_analytics/ocr_ms_per_frame.txt`
    pub fn frame_ms_file(&self) -> PathBuf {
        self.analytics_dir.join("ocr_ms_per_frame.txt")
    }

    /// `02_scriber_analytics/ocr_ms_per_frame_table.csv`
    pub fn frame_ms_table(&self) -> PathBuf {
        self.analytics_dir.join("ocr_ms_per_frame_table.csv")
    }

    /// `02_scriber_analytics/check_number_ocr/`
    pub fn check_dir(&self) -> PathBuf {
        self.analytics_dir.join("check_number_ocr")
    }

    /// `02_scriber_analytics/ocr_digits/ocr_digits.png`
    pub fn digit_capture_image(&self) -> PathBuf {
        self.analytics_dir.join("ocr_digits").join("ocr_digits.png")
    }

    /// `02_scriber_analytics/actions.json`
    pub fn augmented_actions(&self) -> PathBuf {
        self.analytics_dir.join("actions.json")
    }

    /// True if both recorder inputs are present.
    pub fn has_inputs(&self) -> bool {
        self.actions.exists() && self.video.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_session_layout() {
        let paths = SessionPaths::new(Path::new("sessions/abc"));
        assert_eq!(
            paths.actions,
            PathBuf::from("sessions/abc/01_scriber/actions.json")
        );
        assert_eq!(paths.video, PathBuf::from("sessions/abc/01_scriber/video.webm"));
        assert_eq!(
            paths.frame_ms_table(),
            PathBuf::from("sessions/abc/02_scriber_analytics/ocr_ms_per_frame_table.csv")
        );
    }

    #[test]
    fn test_has_inputs_requires_both_files() {
        let dir = tempdir().unwrap();
        let paths = SessionPaths::new(dir.path());
        std::fs::create_dir_all(dir.path().join(SCRIBER_DIR_NAME)).unwrap();
        std::fs::write(&paths.actions, "[]").unwrap();
        assert!(!paths.has_inputs());

        std::fs::write(&paths.video, b"").unwrap();
        assert!(paths.has_inputs());
    }
}
