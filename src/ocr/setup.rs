use anyhow::{Context, Result, anyhow};
use std::path::PathBuf;
use std::process::Command;

#[cfg(windows)]
const EXECUTABLE_NAME: &str = "tesseract.exe";
#[cfg(not(windows))]
const EXECUTABLE_NAME: &str = "tesseract";

const COMMON_EXECUTABLE_PATHS: &[&str] = &[
    "/usr/bin/tesseract",
    "/usr/local/bin/tesseract",
    "/opt/homebrew/bin/tesseract",
    r"C:\Program Files\Tesseract-OCR\tesseract.exe",
    r"C:\Program Files (x86)\Tesseract-OCR\tesseract.exe",
];

const COMMON_TESSDATA_PATHS: &[&str] = &[
    "/usr/share/tesseract-ocr/5/tessdata",
    "/usr/share/tesseract-ocr/4.00/tessdata",
    "/usr/share/tessdata",
    "/opt/homebrew/share/tessdata",
    r"C:\Program Files\Tesseract-OCR\tessdata",
    r"C:\Program Files (x86)\Tesseract-OCR\tessdata",
];

/// Returns the directory for a locally installed Tesseract
pub fn get_tesseract_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("scriber-screenshots")
        .join("tesseract")
}

fn responds_to_version(executable: &PathBuf) -> bool {
    Command::new(executable)
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Finds the Tesseract executable, checking our local dir first, then system
pub fn find_tesseract_executable() -> Result<PathBuf> {
    let local_exe = get_tesseract_dir().join(EXECUTABLE_NAME);
    if local_exe.exists() {
        return Ok(local_exe);
    }

    // Check PATH
    let on_path = PathBuf::from("tesseract");
    if responds_to_version(&on_path) {
        return Ok(on_path);
    }

    COMMON_EXECUTABLE_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .ok_or_else(|| anyhow!("Tesseract not found. Please install Tesseract-OCR."))
}

/// Finds a tessdata directory containing eng.traineddata.
///
/// Returns `None` when Tesseract should use its built-in default.
pub fn find_tessdata_dir() -> Option<PathBuf> {
    let local_tessdata = get_tesseract_dir().join("tessdata");
    if local_tessdata.join("eng.traineddata").exists() {
        return Some(local_tessdata);
    }

    // TESSDATA_PREFIX is honored by Tesseract itself
    if std::env::var_os("TESSDATA_PREFIX").is_some() {
        return None;
    }

    COMMON_TESSDATA_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|p| p.join("eng.traineddata").exists())
}

/// Verifies Tesseract can be started. Call before decoding any frame.
pub fn ensure_tesseract() -> Result<PathBuf> {
    let executable = find_tesseract_executable().map_err(|e| {
        anyhow!(
            "{}\n\
             Install Tesseract-OCR and make sure it is on PATH:\n\
             - Debian/Ubuntu: apt install tesseract-ocr\n\
             - macOS: brew install tesseract\n\
             - Windows: https://github.com/UB-Mannheim/tesseract/releases\n\
             Or copy the executable to: {}",
            e,
            get_tesseract_dir().display()
        )
    })?;

    let output = Command::new(&executable)
        .arg("--version")
        .output()
        .with_context(|| format!("Failed to start Tesseract at {}", executable.display()))?;
    if !output.status.success() {
        return Err(anyhow!(
            "Tesseract at {} is not usable: {}",
            executable.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }

    let version = String::from_utf8_lossy(&output.stdout);
    crate::log(&format!(
        "Tesseract found at: {} ({})",
        executable.display(),
        version.lines().next().unwrap_or("unknown version").trim()
    ));
    Ok(executable)
}
