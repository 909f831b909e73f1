//! Sentence segmentation and overlapping packing.

use regex::Regex;
use std::sync::OnceLock;

fn boundary_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Terminal punctuation, optional closing quotes/brackets, then whitespace.
    RE.get_or_init(|| Regex::new(r#"[.!?]["'”’)\]]*\s+"#).expect("valid boundary regex"))
}

/// Whether the token ending at a `.` is an abbreviation or initial rather
/// than the end of a sentence (`J.`, `e.g.`, `U.S.`).
fn is_abbreviation(before: &str) -> bool {
    let token = before
        .rsplit(char::is_whitespace)
        .next()
        .unwrap_or("")
        .trim_start_matches(|c: char| !c.is_alphanumeric());

    if !token.ends_with('.') {
        return false;
    }
    let stem = &token[..token.len() - 1];
    let mut chars = stem.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => c.is_uppercase(),
        _ => stem.contains('.'),
    }
}

/// Split text into sentences. Whitespace inside sentences is normalized to
/// single spaces.
pub fn split_sentences(text: &str) -> Vec<String> {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.is_empty() {
        return Vec::new();
    }

    let mut sentences = Vec::new();
    let mut start = 0;

    for m in boundary_regex().find_iter(&normalized) {
        let next = normalized[m.end()..].chars().next();
        let starts_sentence = next.is_some_and(|c| c.is_uppercase() || c.is_ascii_digit());
        if !starts_sentence {
            continue;
        }

        let candidate = normalized[start..m.end()].trim();
        if is_abbreviation(candidate) {
            continue;
        }

        if !candidate.is_empty() {
            sentences.push(candidate.to_string());
        }
        start = m.end();
    }

    let tail = normalized[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }

    sentences
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Break a sentence longer than `max_chars` at word boundaries. Words longer
/// than the limit are cut.
fn split_long_sentence(sentence: &str, max_chars: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();

    for word in sentence.split(' ') {
        let mut word = word.to_string();
        while char_len(&word) > max_chars {
            if !current.is_empty() {
                pieces.push(std::mem::take(&mut current));
            }
            let cut: String = word.chars().take(max_chars).collect();
            word = word.chars().skip(max_chars).collect();
            pieces.push(cut);
        }

        let needed = usize::from(!current.is_empty()) + char_len(&word);
        if char_len(&current) + needed > max_chars && !current.is_empty() {
            pieces.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }

    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// Pack text into chunks of at most `chunk_size` characters on sentence
/// boundaries. Each chunk after the first repeats the trailing sentences of
/// its predecessor that fit within `overlap` characters.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chunk_size = chunk_size.max(1);
    let sentences: Vec<String> = split_sentences(text)
        .into_iter()
        .flat_map(|s| {
            if char_len(&s) > chunk_size {
                split_long_sentence(&s, chunk_size)
            } else {
                vec![s]
            }
        })
        .collect();

    let mut chunks = Vec::new();
    let mut i = 0;

    while i < sentences.len() {
        let mut size = 0;
        let mut taken = 0;

        for sentence in &sentences[i..] {
            let added = char_len(sentence) + usize::from(taken > 0);
            if taken > 0 && size + added > chunk_size {
                break;
            }
            size += added;
            taken += 1;
        }

        chunks.push(sentences[i..i + taken].join(" "));

        if i + taken >= sentences.len() {
            break;
        }

        // Trailing sentences that fit in the overlap budget.
        let mut overlap_size = 0;
        let mut overlap_count = 0;
        for (k, sentence) in sentences[i..i + taken].iter().enumerate().rev() {
            let added = char_len(sentence) + usize::from(k + 1 < taken);
            if overlap_size + added > overlap {
                break;
            }
            overlap_size += added;
            overlap_count += 1;
        }

        let next = i + taken - overlap_count;
        i = next.max(i + 1);
    }

    chunks
}
