const MAX_TRANSCRIPT_LENGTH: usize = 16_000;
const MAX_ERROR_LENGTH: usize = 2_000;

/// Keep the head and tail of a long PoC transcript.
pub fn truncate_transcript(output: &str) -> String {
    if output.len() <= MAX_TRANSCRIPT_LENGTH {
        return output.to_string();
    }
    let half = MAX_TRANSCRIPT_LENGTH / 2;
    let start = &output[..floor_boundary(output, half)];
    let end = &output[ceil_boundary(output, output.len() - half)..];
    format!(
        "{}\n\n... [truncated {} bytes] ...\n\n{}",
        start,
        output.len() - start.len() - end.len(),
        end
    )
}

pub fn truncate_error(error: &str) -> String {
    if error.len() <= MAX_ERROR_LENGTH {
        error.to_string()
    } else {
        format!("{}...", &error[..floor_boundary(error, MAX_ERROR_LENGTH)])
    }
}

/// At most `max` characters, with an ellipsis when cut.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(max.saturating_sub(3)).collect();
        cut.push_str("...");
        cut
    }
}

fn floor_boundary(s: &str, mut idx: usize) -> usize {
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_boundary(s: &str, mut idx: usize) -> usize {
    while idx < s.len() && !s.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_untouched() {
        assert_eq!(truncate_transcript("ok"), "ok");
        assert_eq!(truncate_error("bad"), "bad");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn test_transcript_keeps_head_and_tail() {
        let long = format!("{}{}", "a".repeat(10_000), "b".repeat(10_000));
        let cut = truncate_transcript(&long);
        assert!(cut.starts_with("aaaa"));
        assert!(cut.ends_with("bbbb"));
        assert!(cut.contains("[truncated 4000 bytes]"));
    }

    #[test]
    fn test_multibyte_boundaries() {
        let long = "é".repeat(3_000);
        let cut = truncate_error(&long);
        assert!(cut.ends_with("..."));
        assert_eq!(truncate_chars("héllo wörld", 8), "héllo...");
    }
}
