use anyhow::{Result, anyhow};
use image::GrayImage;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::NamedTempFile;

/// Words Tesseract grouped into one text line, in reading order
#[derive(Debug, Clone)]
pub struct OcrLine {
    pub words: Vec<OcrWord>,
}

/// Represents a single word from OCR with confidence score (0-100, -1 when
/// Tesseract reports none)
#[derive(Debug, Clone)]
pub struct OcrWord {
    pub text: String,
    pub confidence: f32,
}

/// Recognition settings passed to Tesseract.
#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub lang: String,
    /// Page segmentation mode (7 = single text line)
    pub psm: u32,
    /// Restricts recognized characters when set
    pub whitelist: Option<String>,
    /// Passed as `--tessdata-dir`; Tesseract's default when unset
    pub tessdata_dir: Option<PathBuf>,
}

impl OcrConfig {
    /// Single-line recognition restricted to 0-9.
    pub fn digits_single_line() -> Self {
        Self {
            lang: "eng".to_string(),
            psm: 7,
            whitelist: Some("0123456789".to_string()),
            tessdata_dir: None,
        }
    }
}

/// The `<base>.tsv` file Tesseract writes next to the output base.
/// Removed on drop, whether or not the run succeeded.
struct TsvOutput {
    path: PathBuf,
}

impl TsvOutput {
    fn for_base(output_base: &str) -> Self {
        Self {
            path: PathBuf::from(format!("{}.tsv", output_base)),
        }
    }
}

impl Drop for TsvOutput {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Runs Tesseract on a grayscale image.
/// Returns structured output with lines and confidence scores.
pub fn recognize_image(tesseract_exe: &Path, img: &GrayImage, config: &OcrConfig) -> Result<Vec<OcrLine>> {
    // Save image to temporary file
    let temp_input = NamedTempFile::with_suffix(".png")?;
    img.save(temp_input.path())?;

    // Create temporary output file (Tesseract adds .tsv extension)
    let temp_output = NamedTempFile::new()?;
    let output_base = temp_output.path().to_string_lossy().to_string();
    let tsv_output = TsvOutput::for_base(&output_base);

    let mut command = Command::new(tesseract_exe);
    command.arg(temp_input.path()).arg(&output_base);
    if let Some(tessdata_dir) = &config.tessdata_dir {
        command.arg("--tessdata-dir").arg(tessdata_dir);
    }
    command
        .arg("-l")
        .arg(&config.lang)
        .arg("--psm")
        .arg(config.psm.to_string());
    if let Some(whitelist) = &config.whitelist {
        command
            .arg("-c")
            .arg(format!("tessedit_char_whitelist={}", whitelist));
    }
    // TSV output for structured data
    let output = command.arg("tsv").output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("Tesseract failed: {}", stderr));
    }

    let tsv_content = std::fs::read_to_string(&tsv_output.path)
        .map_err(|e| anyhow!("Failed to read Tesseract output: {}", e))?;

    Ok(parse_tsv_output(&tsv_content))
}

/// Parses Tesseract TSV output into structured OcrLine data.
///
/// Every non-empty word is kept; an unparseable confidence is stored as -1 so
/// callers can skip it.
pub fn parse_tsv_output(tsv: &str) -> Vec<OcrLine> {
    let mut lines: Vec<OcrLine> = Vec::new();
    let mut current_line: Option<(i32, i32, i32)> = None;
    let mut current_words: Vec<OcrWord> = Vec::new();

    // Skip header
    for line in tsv.lines().skip(1) {
        // TSV fields: level, page_num, block_num, par_num, line_num, word_num,
        //             left, top, width, height, conf, text
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 12 {
            continue;
        }

        let level: i32 = fields[0].parse().unwrap_or(-1);
        // Level 5 = word
        if level != 5 {
            continue;
        }
        let text = fields[11].trim();
        if text.is_empty() {
            continue;
        }

        let key = (
            fields[2].parse().unwrap_or(-1),
            fields[3].parse().unwrap_or(-1),
            fields[4].parse().unwrap_or(-1),
        );
        if current_line.is_some_and(|k| k != key) && !current_words.is_empty() {
            lines.push(OcrLine {
                words: std::mem::take(&mut current_words),
            });
        }
        current_line = Some(key);

        let confidence = fields[10]
            .trim()
            .parse::<f32>()
            .ok()
            .filter(|c| c.is_finite())
            .unwrap_or(-1.0);
        current_words.push(OcrWord {
            text: text.to_string(),
            confidence,
        });
    }

    if !current_words.is_empty() {
        lines.push(OcrLine {
            words: current_words,
        });
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    #[test]
    fn test_parse_tsv_words_and_lines() {
        let tsv = format!(
            "{HEADER}\n\
             1\t1\t0\t0\t0\t0\t0\t0\t100\t30\t-1\t\n\
             4\t1\t1\t1\t1\t0\t0\t0\t100\t30\t-1\t\n\
             5\t1\t1\t1\t1\t1\t0\t0\t50\t30\t91.5\t0012\n\
             5\t1\t1\t1\t1\t2\t55\t0\t45\t30\t88.0\t34\n\
             5\t1\t1\t1\t2\t1\t0\t40\t45\t30\t70\t99\n"
        );
        let lines = parse_tsv_output(&tsv);

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].words.len(), 2);
        assert_eq!(lines[0].words[0].text, "0012");
        assert_eq!(lines[0].words[1].confidence, 88.0);
        assert_eq!(lines[1].words[0].text, "99");
    }

    #[test]
    fn test_parse_tsv_keeps_unscored_words() {
        let tsv = format!("{HEADER}\n5\t1\t1\t1\t1\t1\t0\t0\t50\t30\tabc\t12\n");
        let lines = parse_tsv_output(&tsv);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].words[0].confidence, -1.0);
    }

    #[test]
    fn test_parse_tsv_empty() {
        assert!(parse_tsv_output("").is_empty());
        assert!(parse_tsv_output(HEADER).is_empty());
    }

    #[test]
    fn test_digits_config() {
        let config = OcrConfig::digits_single_line();
        assert_eq!(config.psm, 7);
        assert_eq!(config.whitelist.as_deref(), Some("0123456789"));
        assert!(config.tessdata_dir.is_none());
    }

    #[test]
    fn test_tsv_output_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("out").to_string_lossy().to_string();
        let output = TsvOutput::for_base(&base);
        std::fs::write(&output.path, "level").unwrap();

        drop(output);
        assert!(!dir.path().join("out.tsv").exists());
    }

    /// Stand-in Tesseract: records its output base, writes `<base>.tsv`
    /// and exits with `status`.
    #[cfg(unix)]
    fn fake_tesseract(dir: &Path, tsv: &str, status: i32) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let tsv_file = dir.join("canned.tsv");
        std::fs::write(&tsv_file, tsv).unwrap();
        let script = dir.join("tesseract");
        std::fs::write(
            &script,
            format!(
                "#!/bin/sh\necho \"$2\" > \"{}\"\ncp \"{}\" \"$2.tsv\"\nexit {}\n",
                dir.join("base.txt").display(),
                tsv_file.display(),
                status
            ),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    #[cfg(unix)]
    fn recorded_tsv(dir: &Path) -> PathBuf {
        let base = std::fs::read_to_string(dir.join("base.txt")).unwrap();
        PathBuf::from(format!("{}.tsv", base.trim_end()))
    }

    #[cfg(unix)]
    #[test]
    fn test_recognize_image_with_given_executable() {
        let dir = tempfile::tempdir().unwrap();
        let tsv = format!("{HEADER}\n5\t1\t1\t1\t1\t1\t0\t0\t50\t30\t93\t004217\n");
        let exe = fake_tesseract(dir.path(), &tsv, 0);

        let lines = recognize_image(&exe, &GrayImage::new(8, 8), &OcrConfig::digits_single_line()).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].words[0].text, "004217");
        assert!(!recorded_tsv(dir.path()).exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_run_leaves_no_tsv() {
        let dir = tempfile::tempdir().unwrap();
        let exe = fake_tesseract(dir.path(), HEADER, 1);

        let result = recognize_image(&exe, &GrayImage::new(8, 8), &OcrConfig::digits_single_line());
        assert!(result.is_err());
        assert!(!recorded_tsv(dir.path()).exists());
    }
}
