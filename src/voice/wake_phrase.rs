//! Wake phrase stripping
//!
//! Transcripts may start with the wake phrase ("hey beacon, what time is
//! it"). The phrase is matched case-insensitively at the start of the text,
//! on a word boundary, and removed before the rest is treated as a command.

/// Outcome of checking a transcript for the wake phrase
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WakeMatch {
    /// No wake phrase; the trimmed input is the command
    NoWake(String),
    /// Wake phrase followed by a command
    Command(String),
    /// Only the wake phrase was said
    WakeOnly,
}

/// Configured wake phrase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WakePhrase {
    phrase: String,
}

impl WakePhrase {
    /// Normalize to lowercase with single spaces between words
    #[must_use]
    pub fn new(phrase: &str) -> Self {
        let phrase = phrase
            .split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join(" ");

        tracing::debug!(phrase = %phrase, "wake phrase configured");
        Self { phrase }
    }

    /// The normalized phrase
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.phrase
    }

    /// Strip a leading wake phrase from `input`
    #[must_use]
    pub fn strip(&self, input: &str) -> WakeMatch {
        let input = input.trim();

        let Some(end) = self.prefix_end(input) else {
            return WakeMatch::NoWake(input.to_string());
        };

        let rest = input[end..]
            .trim_start_matches(|c: char| c.is_whitespace() || matches!(c, ',' | '.' | '!' | ':'))
            .trim();

        if rest.is_empty() {
            tracing::debug!("wake phrase only");
            WakeMatch::WakeOnly
        } else {
            WakeMatch::Command(rest.to_string())
        }
    }

    /// Byte offset just past the wake phrase, if `input` starts with it
    fn prefix_end(&self, input: &str) -> Option<usize> {
        if self.phrase.is_empty() {
            return None;
        }

        let mut chars = input.char_indices().peekable();

        for expected in self.phrase.chars() {
            if expected == ' ' {
                // Any run of whitespace matches a single space
                if !chars.peek().is_some_and(|(_, c)| c.is_whitespace()) {
                    return None;
                }
                while chars.peek().is_some_and(|(_, c)| c.is_whitespace()) {
                    chars.next();
                }
                continue;
            }

            let (_, actual) = chars.next()?;
            if !actual.to_lowercase().eq(expected.to_lowercase()) {
                return None;
            }
        }

        match chars.peek() {
            None => Some(input.len()),
            Some(&(idx, c)) if !c.is_alphanumeric() => Some(idx),
            Some(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_after_wake_phrase() {
        let wake = WakePhrase::new("Hey Assistant");
        assert_eq!(
            wake.strip("Hey Assistant  what time is it"),
            WakeMatch::Command("what time is it".to_string())
        );
    }

    #[test]
    fn test_wake_only() {
        let wake = WakePhrase::new("hey assistant");
        assert_eq!(wake.strip("hey assistant "), WakeMatch::WakeOnly);
        assert_eq!(wake.strip("HEY ASSISTANT!"), WakeMatch::WakeOnly);
    }

    #[test]
    fn test_punctuation_after_phrase() {
        let wake = WakePhrase::new("hey beacon");
        assert_eq!(
            wake.strip("Hey Beacon, turn it up"),
            WakeMatch::Command("turn it up".to_string())
        );
    }

    #[test]
    fn test_word_boundary() {
        let wake = WakePhrase::new("hey beacon");
        assert_eq!(
            wake.strip("hey beacons rock"),
            WakeMatch::NoWake("hey beacons rock".to_string())
        );
    }

    #[test]
    fn test_no_wake_is_trimmed() {
        let wake = WakePhrase::new("hey beacon");
        assert_eq!(
            wake.strip("  what's up  "),
            WakeMatch::NoWake("what's up".to_string())
        );
    }

    #[test]
    fn test_phrase_normalized() {
        let wake = WakePhrase::new("  Hey   BEACON ");
        assert_eq!(wake.as_str(), "hey beacon");
        assert_eq!(wake.strip("hey\tbeacon"), WakeMatch::WakeOnly);
    }

    #[test]
    fn test_empty_phrase_never_matches() {
        let wake = WakePhrase::new("");
        assert_eq!(wake.strip("hello"), WakeMatch::NoWake("hello".to_string()));
    }
}
