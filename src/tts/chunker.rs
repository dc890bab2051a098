//! Reply text chunking for synthesis.
//!
//! Splitting order matters: sentence boundaries first, then clause commas,
//! then whitespace, and a hard split only when a single word exceeds the
//! limit. Breaking mid-sentence produces worse-sounding, harder-to-interrupt
//! speech, so the coarser boundaries always win when they fit.

/// Split `text` into speakable chunks of at most `max_len` characters.
///
/// Concatenating the chunks (with single spaces restored between them)
/// reproduces the input text modulo whitespace normalization at split points.
pub fn chunk_text(text: &str, max_len: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() || max_len == 0 {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut current = String::new();

    for sentence in split_sentences(text) {
        if fits_appended(&current, &sentence, max_len) {
            append_piece(&mut current, &sentence);
        } else {
            flush(&mut chunks, &mut current);
            if sentence.chars().count() <= max_len {
                current = sentence;
            } else {
                pack_oversized_sentence(&sentence, max_len, &mut chunks, &mut current);
            }
        }
    }

    flush(&mut chunks, &mut current);
    chunks
}

/// Split into sentences, keeping terminators attached.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            // Consume runs of terminators ("...", "?!") as one boundary.
            while let Some(&next) = chars.peek() {
                if matches!(next, '.' | '!' | '?') {
                    current.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            // Only a terminator followed by whitespace (or end) ends a
            // sentence; "3.5" stays intact.
            if chars.peek().is_none_or(|next| next.is_whitespace()) {
                let trimmed = current.trim();
                if !trimmed.is_empty() {
                    sentences.push(trimmed.to_string());
                }
                current.clear();
            }
        }
    }

    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
    sentences
}

/// A sentence longer than the limit: fall back to clauses, then words.
fn pack_oversized_sentence(
    sentence: &str,
    max_len: usize,
    chunks: &mut Vec<String>,
    current: &mut String,
) {
    for clause in split_clauses(sentence) {
        if fits_appended(current, &clause, max_len) {
            append_piece(current, &clause);
        } else {
            flush(chunks, current);
            if clause.chars().count() <= max_len {
                *current = clause;
            } else {
                pack_words(&clause, max_len, chunks, current);
            }
        }
    }
}

/// Split on commas, keeping each comma attached to its clause.
fn split_clauses(sentence: &str) -> Vec<String> {
    let mut clauses = Vec::new();
    let mut current = String::new();
    for c in sentence.chars() {
        current.push(c);
        if c == ',' {
            let trimmed = current.trim();
            if !trimmed.is_empty() {
                clauses.push(trimmed.to_string());
            }
            current.clear();
        }
    }
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        clauses.push(trimmed.to_string());
    }
    clauses
}

/// Whitespace packing; hard-splits a single word only when it alone exceeds
/// the limit.
fn pack_words(clause: &str, max_len: usize, chunks: &mut Vec<String>, current: &mut String) {
    for word in clause.split_whitespace() {
        if fits_appended(current, word, max_len) {
            append_piece(current, word);
            continue;
        }
        flush(chunks, current);
        if word.chars().count() <= max_len {
            *current = word.to_string();
        } else {
            let mut piece = String::new();
            for c in word.chars() {
                if piece.chars().count() == max_len {
                    chunks.push(std::mem::take(&mut piece));
                }
                piece.push(c);
            }
            *current = piece;
        }
    }
}

fn fits_appended(current: &str, piece: &str, max_len: usize) -> bool {
    let current_len = current.chars().count();
    let piece_len = piece.chars().count();
    if current_len == 0 {
        piece_len <= max_len
    } else {
        current_len + 1 + piece_len <= max_len
    }
}

fn append_piece(current: &mut String, piece: &str) {
    if !current.is_empty() {
        current.push(' ');
    }
    current.push_str(piece);
}

fn flush(chunks: &mut Vec<String>, current: &mut String) {
    if !current.is_empty() {
        chunks.push(std::mem::take(current));
    }
}
