//! Heuristic language-model token estimation.
//!
//! Real tokenizers are model-specific and expensive to embed; admission
//! control only needs a repeatable approximation. The estimate here is
//! deterministic and side-effect-free — both the server-side governor and
//! the client-side advisor rely on getting the same number for the same
//! text.
//!
//! # Example
//!
//! ```rust
//! use recipegate::estimator::estimate;
//!
//! assert_eq!(estimate(""), 0);
//! assert_eq!(estimate("hello world"), 2);
//! // punctuation, digits and non-ASCII all cost extra
//! assert!(estimate("héllo, wörld!") > estimate("hello world"));
//! ```

pub mod extract;

/// Punctuation characters that carry a standalone-token cost.
const PUNCTUATION: &[char] = &[
    ',', '.', ';', ':', '!', '?', '(', ')', '[', ']', '{', '}', '\'', '"',
];

/// Extra tokens charged per word once it exceeds this many characters.
const LONG_WORD_THRESHOLD: usize = 12;
/// Divisor for the long-word surcharge: `floor(len / 8)` extra tokens.
const LONG_WORD_DIVISOR: usize = 8;
/// Minimum run of consecutive digits that triggers the numeric surcharge.
const DIGIT_RUN_THRESHOLD: usize = 4;
/// Divisor for the numeric surcharge: `floor(run / 3)` extra tokens.
const DIGIT_RUN_DIVISOR: usize = 3;

/// Estimate the number of LLM tokens `text` would consume.
///
/// Rules, applied over a fractional accumulator that is only rounded (up)
/// at the end:
///
/// - base count: one token per whitespace-delimited word
/// - words longer than 12 characters add `floor(len / 8)` extra tokens
///   (long words fragment into sub-word tokens)
/// - a run of 4+ consecutive digits adds `floor(digits / 3)` extra tokens
/// - each non-ASCII character adds a full token (multi-byte/subword
///   encoding of non-Latin scripts and emoji)
/// - punctuation adds 0.3 per character when a word is nothing but
///   punctuation, 0.2 when it is embedded in a word; any other embedded
///   non-alphanumeric character adds 0.2
/// - each newline adds 0.5
///
/// Empty input returns 0. Never panics, never returns a negative count.
pub fn estimate(text: &str) -> u32 {
    if text.is_empty() {
        return 0;
    }

    let mut total: f64 = 0.0;

    for word in text.split_whitespace() {
        total += 1.0;

        let len = word.chars().count();
        if len > LONG_WORD_THRESHOLD {
            total += (len / LONG_WORD_DIVISOR) as f64;
        }

        let punctuation_only = word.chars().all(|c| PUNCTUATION.contains(&c));

        let mut digit_run = 0usize;
        for c in word.chars() {
            if c.is_ascii_digit() {
                digit_run += 1;
                continue;
            }
            if digit_run >= DIGIT_RUN_THRESHOLD {
                total += (digit_run / DIGIT_RUN_DIVISOR) as f64;
            }
            digit_run = 0;

            if !c.is_ascii() {
                // Non-ASCII costs a full token; the other character rules
                // assume ASCII, so this one takes precedence.
                total += 1.0;
            } else if PUNCTUATION.contains(&c) {
                total += if punctuation_only { 0.3 } else { 0.2 };
            } else if !c.is_ascii_alphanumeric() {
                total += 0.2;
            }
        }
        if digit_run >= DIGIT_RUN_THRESHOLD {
            total += (digit_run / DIGIT_RUN_DIVISOR) as f64;
        }
    }

    // split_whitespace swallows line breaks, so count them separately.
    total += text.chars().filter(|c| *c == '\n').count() as f64 * 0.5;

    total.ceil() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_zero() {
        assert_eq!(estimate(""), 0);
    }

    #[test]
    fn test_whitespace_only_is_zero() {
        assert_eq!(estimate("   \t  "), 0);
    }

    #[test]
    fn test_plain_words() {
        assert_eq!(estimate("hello world"), 2);
        assert_eq!(estimate("one two three four"), 4);
    }

    #[test]
    fn test_long_word_surcharge() {
        // 20 chars -> 1 base + floor(20/8) = 3
        assert_eq!(estimate("internationalization"), 3);
        // 12 chars is at the threshold, not over it
        assert_eq!(estimate("dodecahedral"), 1);
    }

    #[test]
    fn test_embedded_punctuation_costs_fifth() {
        // "hello," + "world!" -> 2 + 0.2 + 0.2 = 2.4 -> 3
        assert_eq!(estimate("hello, world!"), 3);
    }

    #[test]
    fn test_standalone_punctuation_costs_more() {
        // "," and "." as bare words -> (1 + 0.3) * 2 = 2.6 -> 3
        assert_eq!(estimate(", ."), 3);
    }

    #[test]
    fn test_digit_runs() {
        // 8-digit run -> 1 + floor(8/3) = 3
        assert_eq!(estimate("12345678"), 3);
        // 3 digits: below the run threshold
        assert_eq!(estimate("123"), 1);
    }

    #[test]
    fn test_non_ascii_full_token() {
        // 1 base + 1 for the accented char
        assert_eq!(estimate("héllo"), 2);
        // 1 base + 1 for the emoji
        assert_eq!(estimate("🍕"), 2);
    }

    #[test]
    fn test_newlines_cost_half() {
        // 2 words + 0.5 for the newline -> 2.5 -> 3
        assert_eq!(estimate("first\nsecond"), 3);
    }

    #[test]
    fn test_deterministic() {
        let text = "Chicken parmesan, serves 4 — prep 25min! 🍗";
        assert_eq!(estimate(text), estimate(text));
    }

    // P5: non-negativity over a grab-bag of inputs.
    #[test]
    fn test_never_negative() {
        for text in ["", " ", "\n\n\n", "a", "...", "日本語", "\u{1F600}"] {
            // u32 return already guarantees >= 0; the point is no panic.
            let _ = estimate(text);
        }
    }

    // P6: decorated text never estimates below its plain counterpart.
    #[test]
    fn test_decoration_is_monotonic() {
        let pairs = [
            ("hello world", "héllo wörld"),
            ("pasta sauce", "pasta, sauce!"),
            ("two words", "two\nwords extra"),
        ];
        for (plain, decorated) in pairs {
            assert!(
                estimate(decorated) >= estimate(plain),
                "{decorated:?} should cost at least as much as {plain:?}"
            );
        }
    }
}
