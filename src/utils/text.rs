//! String helpers shared by story generation and soundtrack search.

use regex::Regex;
use std::sync::OnceLock;

const QUOTE_CHARS: [char; 3] = ['"', '\u{201C}', '\u{201D}'];
const SENTENCE_END: [char; 3] = ['.', '!', '?'];
const MUSICAL_NOTES: [char; 2] = ['\u{266A}', '\u{266B}'];
const SUNG_PLACEHOLDER: &str = "La la la";

fn whitespace_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s{2,}").expect("static regex"))
}

fn word_separator() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r",?\.* +").expect("static regex"))
}

fn blank_lines() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\n\r]{2,}").expect("static regex"))
}

fn non_letters() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z ]").expect("static regex"))
}

/// Caption text as handed to the bot: one string, or subtitle fragments in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptionInput {
    Text(String),
    Fragments(Vec<String>),
}

impl From<&str> for CaptionInput {
    fn from(value: &str) -> Self {
        CaptionInput::Text(value.to_string())
    }
}

impl From<String> for CaptionInput {
    fn from(value: String) -> Self {
        CaptionInput::Text(value)
    }
}

impl From<Vec<String>> for CaptionInput {
    fn from(value: Vec<String>) -> Self {
        CaptionInput::Fragments(value)
    }
}

/// Joins caption fragments with single spaces, turns newlines into spaces and
/// collapses whitespace runs. A clean single string comes back unchanged.
pub fn normalize_captions(input: &CaptionInput) -> String {
    let joined = match input {
        CaptionInput::Text(text) => text.clone(),
        CaptionInput::Fragments(parts) => parts.join(" "),
    };
    let flattened = joined.replace(['\n', '\r'], " ");
    whitespace_run().replace_all(&flattened, " ").into_owned()
}

/// Caption text taken as a finished story: fragments joined with single
/// spaces, a single string exactly as given.
pub fn literal_story(input: &CaptionInput) -> String {
    match input {
        CaptionInput::Text(text) => text.clone(),
        CaptionInput::Fragments(parts) => parts.join(" "),
    }
}

/// Cuts `full` after the last `.`, `!` or `?` that follows `prefix`.
/// Without such a mark the text is returned as is.
pub fn trim_to_sentence_boundary(full: &str, prefix: &str) -> String {
    let Some(remaining) = full.get(prefix.len()..) else {
        return full.to_string();
    };
    match remaining.rfind(SENTENCE_END) {
        Some(idx) => format!("{}{}", &full[..prefix.len()], &remaining[..=idx]),
        None => full.to_string(),
    }
}

pub fn count_quotes(text: &str) -> usize {
    text.chars().filter(|c| QUOTE_CHARS.contains(c)).count()
}

/// Adds a closing `"` before the final sentence mark, or at the very end when
/// the last quote already sits after that mark.
pub fn insert_closing_quote(text: &str) -> String {
    let last_quote = text.rfind(QUOTE_CHARS);
    match text.rfind(SENTENCE_END) {
        Some(punct) if last_quote.is_none_or(|q| q < punct) => {
            format!("{}\"{}", &text[..punct], &text[punct..])
        }
        _ => format!("{}\"", text),
    }
}

pub fn close_unbalanced_quotes(text: &str) -> String {
    if count_quotes(text) % 2 == 1 {
        insert_closing_quote(text)
    } else {
        text.to_string()
    }
}

/// Shortens `text` to at most `max_chars` characters, backing up to the last
/// word separator inside the limit when there is one. Periods in the
/// separator stay, commas and spaces go.
pub fn truncate_at_separator(text: &str, max_chars: usize) -> String {
    let Some((cut, _)) = text.char_indices().nth(max_chars) else {
        return text.to_string();
    };
    let head = &text[..cut];
    match word_separator().find_iter(head).last() {
        Some(m) if m.start() > 0 => {
            let dots = m.as_str().trim_start_matches(',').trim_end_matches(' ');
            format!("{}{}", &head[..m.start()], dots)
        }
        _ => head.to_string(),
    }
}

pub fn collapse_blank_lines(text: &str) -> String {
    blank_lines().replace_all(text, "\n\n").into_owned()
}

/// Replaces sung-lyric glyphs with something a voice can read out.
pub fn replace_musical_notes(text: &str) -> String {
    text.replace(MUSICAL_NOTES, SUNG_PLACEHOLDER)
}

/// First `word_count` plain words of `story`, used as a music search term.
pub fn extract_query(story: &str, word_count: usize) -> Option<String> {
    if story.is_empty() {
        return None;
    }
    let letters = non_letters().replace_all(story, "");
    let words: Vec<&str> = letters.split_whitespace().take(word_count).collect();
    if words.is_empty() {
        return None;
    }
    Some(words.join(" "))
}

pub fn slugify(query: &str) -> String {
    query.to_lowercase().replace(' ', "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_fragments() {
        let input = CaptionInput::Fragments(vec![
            "I told you\nalready".to_string(),
            " twice,".to_string(),
            "Donkey.".to_string(),
        ]);
        assert_eq!(normalize_captions(&input), "I told you already twice, Donkey.");
    }

    #[test]
    fn test_normalize_never_leaves_newlines_or_double_spaces() {
        let inputs = vec![
            CaptionInput::from("a\n\nb   c"),
            CaptionInput::from(vec!["x  ".to_string(), "\ny".to_string()]),
            CaptionInput::from(vec![]),
            CaptionInput::from("\r\n"),
        ];
        for input in inputs {
            let out = normalize_captions(&input);
            assert!(!out.contains('\n'), "{:?}", out);
            assert!(!out.contains("  "), "{:?}", out);
        }
    }

    #[test]
    fn test_normalize_clean_string_unchanged() {
        let input = CaptionInput::from("Flavortown awaits.");
        assert_eq!(normalize_captions(&input), "Flavortown awaits.");
    }

    #[test]
    fn test_literal_story_keeps_line_breaks() {
        assert_eq!(
            literal_story(&CaptionInput::from("Line one.\nLine  two.")),
            "Line one.\nLine  two."
        );
        assert_eq!(
            literal_story(&CaptionInput::from(vec!["a\nb".to_string(), "c".to_string()])),
            "a\nb c"
        );
    }

    #[test]
    fn test_trim_keeps_full_when_boundary_at_end() {
        assert_eq!(
            trim_to_sentence_boundary("Hello world. Extra.", "Hello world."),
            "Hello world. Extra."
        );
    }

    #[test]
    fn test_trim_empty_continuation() {
        assert_eq!(trim_to_sentence_boundary("Hello world", "Hello world"), "Hello world");
    }

    #[test]
    fn test_trim_drops_trailing_fragment() {
        assert_eq!(
            trim_to_sentence_boundary("Hi. It was great! And then", "Hi."),
            "Hi. It was great!"
        );
    }

    #[test]
    fn test_trim_ignores_punctuation_in_prefix() {
        assert_eq!(
            trim_to_sentence_boundary("Hi. and then some", "Hi."),
            "Hi. and then some"
        );
    }

    #[test]
    fn test_close_quotes_odd() {
        assert_eq!(close_unbalanced_quotes("He said \"hi."), "He said \"hi\".");
    }

    #[test]
    fn test_close_quotes_balanced_untouched() {
        assert_eq!(close_unbalanced_quotes("\"hi\" there."), "\"hi\" there.");
        assert_eq!(close_unbalanced_quotes("no quotes."), "no quotes.");
    }

    #[test]
    fn test_close_quotes_without_punctuation() {
        assert_eq!(close_unbalanced_quotes("He said \"hi"), "He said \"hi\"");
    }

    #[test]
    fn test_close_quotes_curly() {
        assert_eq!(
            close_unbalanced_quotes("She whispered \u{201C}run!"),
            "She whispered \u{201C}run\"!"
        );
    }

    #[test]
    fn test_truncate_short_text_untouched() {
        assert_eq!(truncate_at_separator("short text", 50), "short text");
    }

    #[test]
    fn test_truncate_backs_up_to_separator() {
        assert_eq!(truncate_at_separator("one two three four", 10), "one two");
        assert_eq!(truncate_at_separator("alpha, beta", 8), "alpha");
        assert_eq!(truncate_at_separator("One two. Three four", 12), "One two.");
    }

    #[test]
    fn test_truncate_without_separator_hard_cuts() {
        assert_eq!(truncate_at_separator("abcdefghij", 4), "abcd");
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\nb\r\n\r\nc\nd"), "a\n\nb\n\nc\nd");
    }

    #[test]
    fn test_musical_notes() {
        assert_eq!(replace_musical_notes("\u{266A} tonight"), "La la la tonight");
    }

    #[test]
    fn test_extract_query() {
        assert_eq!(
            extract_query("The quick brown fox!!", 3).as_deref(),
            Some("The quick brown")
        );
        assert_eq!(extract_query("Hey   you, 42 there", 4).as_deref(), Some("Hey you there"));
        assert_eq!(extract_query("", 3), None);
        assert_eq!(extract_query("!!! ???", 3), None);
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("The Quick brown"), "the-quick-brown");
    }
}
