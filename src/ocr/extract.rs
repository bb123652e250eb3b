use super::engine::OcrLine;
use crate::decode::{normalize_similarity, parse_overlay_digits};

/// Digits read from one OCR pass.
#[derive(Debug, Clone, PartialEq)]
pub struct DigitReading {
    pub value: u32,
    /// Mean word confidence scaled to [0, 1]
    pub confidence: f32,
}

/// Collects the digit characters of every word that contains at least one
/// digit, in reading order, plus the confidences of those words.
fn collect_digit_words(lines: &[OcrLine]) -> (String, Vec<f32>) {
    let mut digits = String::new();
    let mut confidences = Vec::new();
    for word in lines.iter().flat_map(|line| &line.words) {
        if !word.text.chars().any(|c| c.is_ascii_digit()) {
            continue;
        }
        digits.extend(word.text.chars().filter(|c| c.is_ascii_digit()));
        if word.confidence >= 0.0 {
            confidences.push(word.confidence);
        }
    }
    (digits, confidences)
}

/// Turns one OCR pass into a reading.
///
/// Returns `None` when no digits were recognized or they do not form a valid
/// overlay value of at most `max_digits` digits.
pub fn extract_digit_reading(lines: &[OcrLine], max_digits: usize) -> Option<DigitReading> {
    let (digits, confidences) = collect_digit_words(lines);
    let value = parse_overlay_digits(&digits, max_digits)?;
    let confidence = if confidences.is_empty() {
        0.0
    } else {
        confidences.iter().sum::<f32>() / confidences.len() as f32 / 100.0
    };
    Some(DigitReading {
        value,
        confidence: normalize_similarity(confidence),
    })
}

/// Keeps the more confident of two passes; ties favour the first.
pub fn best_reading(first: Option<DigitReading>, second: Option<DigitReading>) -> Option<DigitReading> {
    match (first, second) {
        (Some(a), Some(b)) => Some(if b.confidence > a.confidence { b } else { a }),
        (a, b) => a.or(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::engine::OcrWord;

    fn make_line(words: &[(&str, f32)]) -> OcrLine {
        OcrLine {
            words: words
                .iter()
                .map(|(t, c)| OcrWord {
                    text: t.to_string(),
                    confidence: *c,
                })
                .collect(),
        }
    }

    #[test]
    fn test_single_word() {
        let reading = extract_digit_reading(&[make_line(&[("001234", 90.0)])], 6).unwrap();
        assert_eq!(reading.value, 1234);
        assert!((reading.confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_split_words_are_joined() {
        let lines = [make_line(&[("00", 80.0), ("1|2", 60.0), ("ab", 99.0)])];
        let reading = extract_digit_reading(&lines, 6).unwrap();
        assert_eq!(reading.value, 12);
        // The non-digit word does not contribute
        assert!((reading.confidence - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_unscored_words_are_skipped_for_confidence() {
        let lines = [make_line(&[("12", -1.0), ("34", 50.0)])];
        let reading = extract_digit_reading(&lines, 6).unwrap();
        assert_eq!(reading.value, 1234);
        assert!((reading.confidence - 0.5).abs() < 1e-6);

        let unscored = [make_line(&[("7", -1.0)])];
        assert_eq!(extract_digit_reading(&unscored, 6).unwrap().confidence, 0.0);
    }

    #[test]
    fn test_rejects_empty_and_overlong() {
        assert_eq!(extract_digit_reading(&[], 6), None);
        assert_eq!(extract_digit_reading(&[make_line(&[("abc", 90.0)])], 6), None);
        assert_eq!(extract_digit_reading(&[make_line(&[("1234567", 90.0)])], 6), None);
    }

    #[test]
    fn test_best_reading() {
        let low = DigitReading { value: 1, confidence: 0.4 };
        let high = DigitReading { value: 2, confidence: 0.8 };
        assert_eq!(best_reading(Some(low.clone()), Some(high.clone())), Some(high.clone()));
        assert_eq!(best_reading(Some(high.clone()), Some(low.clone())), Some(high.clone()));
        assert_eq!(best_reading(None, Some(low.clone())), Some(low.clone()));
        assert_eq!(best_reading(None, None), None);

        let tie = DigitReading { value: 3, confidence: 0.8 };
        assert_eq!(best_reading(Some(high.clone()), Some(tie)), Some(high));
    }
}
