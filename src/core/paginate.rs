/// Text pagination for dialogue boxes of varying width.
///
/// Pages are packed from whole sentences when possible, from whole words
/// when a sentence is too long, and a single over-long word gets a page to
/// itself. Whitespace is kept attached to the preceding piece, so joining
/// the pages reproduces the input exactly.

/// Characters that end a sentence.
const SENTENCE_ENDERS: &[char] = &['.', '!', '?', '…'];
/// Characters allowed to trail a sentence ender (closing quotes, brackets).
const CLOSERS: &[char] = &['"', '\'', ')', ']', '”', '’', '»'];

/// Display width of a page, ignoring trailing whitespace.
pub fn display_width(text: &str) -> usize {
    text.trim_end().chars().count()
}

/// Split `text` into pages no wider than `max_width` where possible.
/// Always returns at least one page. A zero width is treated as one.
pub fn paginate(text: &str, max_width: usize) -> Vec<String> {
    let max_width = max_width.max(1);
    if text.is_empty() {
        return vec![String::new()];
    }

    let mut pages = Vec::new();
    let mut current = String::new();

    for sentence in split_sentences(text) {
        if fits(&current, sentence, max_width) {
            current.push_str(sentence);
            continue;
        }
        if !current.is_empty() {
            pages.push(std::mem::take(&mut current));
        }
        if display_width(sentence) <= max_width {
            current.push_str(sentence);
            continue;
        }
        // Sentence too long on its own: pack its words instead.
        for word in split_words(sentence) {
            if fits(&current, word, max_width) {
                current.push_str(word);
            } else {
                if !current.is_empty() {
                    pages.push(std::mem::take(&mut current));
                }
                current.push_str(word);
            }
        }
    }

    if !current.is_empty() || pages.is_empty() {
        pages.push(current);
    }
    pages
}

fn fits(current: &str, piece: &str, max_width: usize) -> bool {
    if current.is_empty() {
        return display_width(piece) <= max_width;
    }
    current.chars().count() + display_width(piece) <= max_width
}

/// Sentences with their trailing whitespace. The final piece may lack an
/// ender.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if !SENTENCE_ENDERS.contains(&c) {
            continue;
        }
        // Absorb runs like "?!" and closing quotes.
        while let Some(&(_, next)) = chars.peek() {
            if SENTENCE_ENDERS.contains(&next) || CLOSERS.contains(&next) {
                chars.next();
            } else {
                break;
            }
        }
        // Only a boundary if followed by whitespace (or end of text).
        match chars.peek() {
            None => {}
            Some(&(_, next)) if next.is_whitespace() => {
                while let Some(&(_, ws)) = chars.peek() {
                    if ws.is_whitespace() {
                        chars.next();
                    } else {
                        break;
                    }
                }
            }
            Some(_) => continue,
        }
        let end = chars.peek().map_or(text.len(), |&(i, _)| i);
        out.push(&text[start..end]);
        start = end;
    }

    if start < text.len() {
        out.push(&text[start..]);
    }
    out
}

/// Words with their trailing whitespace. Leading whitespace sticks to the
/// first word.
fn split_words(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut in_space = false;
    let mut seen_word = false;

    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            in_space = true;
        } else {
            if in_space && seen_word {
                out.push(&text[start..i]);
                start = i;
            }
            in_space = false;
            seen_word = true;
        }
    }
    if start < text.len() {
        out.push(&text[start..]);
    }
    out
}
