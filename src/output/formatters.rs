use serde::{Deserialize, Serialize};
use std::fmt;

use crate::transcribe::{SpeechSegment, WordSpan};

/// One rendered transcript line with the time range of its words
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptLine {
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub text: String,
}

impl fmt::Display for TranscriptLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:.2}s - {:.2}s] {}",
            self.start_seconds, self.end_seconds, self.text
        )
    }
}

/// Ordered transcript lines
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Transcript {
    pub lines: Vec<TranscriptLine>,
}

impl Transcript {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Render every line followed by a newline
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Transcript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

/// Pack words greedily into lines of at most `max_chars` characters.
///
/// Every word added to a line is followed by a space, and a word starts a new line when the
/// current line (trailing space included) plus the word would exceed `max_chars`. A word that
/// is longer than `max_chars` on its own keeps a line to itself and is never split.
pub fn format_lines(words: &[WordSpan], max_chars: usize) -> Transcript {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;
    let mut line_start = 0.0;
    let mut previous_end = 0.0;

    for word in words {
        if current.is_empty() {
            line_start = word.start_seconds;
        }

        let word_len = word.text.chars().count();
        if current_len + word_len > max_chars && !current.is_empty() {
            lines.push(TranscriptLine {
                start_seconds: line_start,
                end_seconds: previous_end,
                text: current.trim_end().to_string(),
            });
            current.clear();
            current_len = 0;
            line_start = word.start_seconds;
        }

        current.push_str(&word.text);
        current.push(' ');
        current_len += word_len + 1;
        previous_end = word.end_seconds;
    }

    if !current.is_empty() {
        lines.push(TranscriptLine {
            start_seconds: line_start,
            end_seconds: previous_end,
            text: current.trim_end().to_string(),
        });
    }

    Transcript { lines }
}

/// Format the best alternative of each segment, keeping the service's segment order
pub fn format_segments(segments: &[SpeechSegment], max_chars: usize) -> Transcript {
    let lines = segments
        .iter()
        .filter_map(SpeechSegment::best)
        .filter(|alt| !alt.words.is_empty())
        .flat_map(|alt| format_lines(&alt.words, max_chars).lines)
        .collect();

    Transcript { lines }
}
