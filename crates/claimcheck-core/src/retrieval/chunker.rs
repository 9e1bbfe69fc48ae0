//! Sentence-bounded chunking with one-sentence overlap.

/// Split text into sentences on `.`, `!` or `?` followed by whitespace or the
/// end of input.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);

        if !matches!(c, '.' | '!' | '?') {
            continue;
        }

        let boundary = match chars.peek() {
            None => true,
            Some(next) => next.is_whitespace(),
        };
        if boundary {
            push_trimmed(&mut sentences, &current);
            current.clear();
        }
    }

    push_trimmed(&mut sentences, &current);
    sentences
}

fn push_trimmed(out: &mut Vec<String>, sentence: &str) {
    let collapsed = sentence.split_whitespace().collect::<Vec<_>>().join(" ");
    if !collapsed.is_empty() {
        out.push(collapsed);
    }
}

/// Group sentences into chunks of roughly `chunk_size` characters.
///
/// A sentence is never split; a sentence longer than `chunk_size` becomes a
/// chunk of its own. Each chunk after the first starts with the last
/// sentence of the previous chunk.
pub fn chunk_text(text: &str, chunk_size: usize) -> Vec<String> {
    let sentences = split_sentences(text);
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0usize;
    // current holds at least one sentence not yet emitted
    let mut fresh = false;

    for sentence in &sentences {
        let added = if current.is_empty() {
            sentence.len()
        } else {
            sentence.len() + 1
        };

        if fresh && current_len + added > chunk_size {
            chunks.push(current.join(" "));
            let overlap = current[current.len() - 1];
            current = vec![overlap];
            current_len = overlap.len();
            fresh = false;
        }

        current_len += if current.is_empty() {
            sentence.len()
        } else {
            sentence.len() + 1
        };
        current.push(sentence);
        fresh = true;
    }

    if fresh {
        chunks.push(current.join(" "));
    }

    chunks
}
