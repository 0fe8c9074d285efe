//! Simulated token streaming.
//!
//! The full reply is known before playback starts; playback only reveals it
//! word by word with a randomized pause after each word.

use std::time::Duration;

use rand::Rng;

/// Pause bounds between revealed words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackSettings {
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(150),
        }
    }
}

impl PlaybackSettings {
    /// Playback without pauses.
    #[must_use]
    pub fn instant() -> Self {
        Self {
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Draw the next inter-word pause, uniform in `[min_delay, max_delay]`.
    #[must_use]
    pub fn next_delay(&self) -> Duration {
        let min = millis(self.min_delay);
        let max = millis(self.max_delay);
        if max <= min {
            return self.min_delay;
        }
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Successive reveal states of `text`, one per whitespace-separated word.
///
/// State `i` is the prefix of `text` ending with word `i`, so every state is
/// a strict prefix of the next and the last one is `text` without trailing
/// whitespace. Line breaks and spacing inside the text are preserved.
#[must_use]
pub fn word_prefixes(text: &str) -> Vec<&str> {
    let mut prefixes = Vec::new();
    let mut in_word = false;

    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            if in_word {
                prefixes.push(&text[..i]);
                in_word = false;
            }
        } else {
            in_word = true;
        }
    }
    if in_word {
        prefixes.push(text);
    }

    prefixes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_state_per_word() {
        let text = "Data science blends statistics and code";
        let states = word_prefixes(text);

        assert_eq!(states.len(), text.split_whitespace().count());
        assert_eq!(states[0], "Data");
        assert_eq!(states[1], "Data science");
        assert_eq!(*states.last().unwrap(), text);

        for pair in states.windows(2) {
            assert!(pair[1].starts_with(pair[0]));
            assert!(pair[1].len() > pair[0].len());
        }
    }

    #[test]
    fn test_preserves_line_breaks() {
        let text = "Skills:\n- SQL\n- Python  \n";
        let states = word_prefixes(text);
        assert_eq!(states, vec!["Skills:", "Skills:\n-", "Skills:\n- SQL", "Skills:\n- SQL\n-", "Skills:\n- SQL\n- Python"]);
    }

    #[test]
    fn test_blank_text_has_no_states() {
        assert!(word_prefixes("").is_empty());
        assert!(word_prefixes(" \n\t ").is_empty());
    }

    #[test]
    fn test_multibyte_words() {
        let states = word_prefixes("café naïve");
        assert_eq!(states, vec!["café", "café naïve"]);
    }

    #[test]
    fn test_delay_bounds() {
        let settings = PlaybackSettings::default();
        for _ in 0..200 {
            let d = settings.next_delay();
            assert!(d >= Duration::from_millis(50) && d <= Duration::from_millis(150));
        }
        assert_eq!(PlaybackSettings::instant().next_delay(), Duration::ZERO);
    }
}
