pub const DEFAULT_CHUNK_SIZE: usize = 2000;
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Splits on character boundaries into pieces of exactly `chunk_size`
/// characters; only the last piece may be shorter. Words may be cut.
pub fn chunk_text(text: &str, chunk_size: usize) -> Vec<String> {
    let chunk_size = chunk_size.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for character in text.chars() {
        current.push(character);
        current_len += 1;
        if current_len == chunk_size {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

pub fn batch_chunks(chunks: &[String], batch_size: usize) -> Vec<String> {
    chunks
        .chunks(batch_size.max(1))
        .map(|group| group.join("\n"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_text_splits_into_fixed_lengths() {
        let text = "x".repeat(4500);
        let lengths: Vec<usize> = chunk_text(&text, 2000)
            .iter()
            .map(|chunk| chunk.chars().count())
            .collect();

        assert_eq!(lengths, vec![2000, 2000, 500]);
    }

    #[test]
    fn chunk_text_counts_characters_not_bytes() {
        let chunks = chunk_text("ñañañ", 2);
        assert_eq!(chunks, vec!["ña", "ña", "ñ"]);
    }

    #[test]
    fn chunk_text_is_lossless() {
        let text = "The quick brown fox jumps over the lazy dog.";
        assert_eq!(chunk_text(text, 7).concat(), text);
        assert!(chunk_text("", 7).is_empty());
    }

    #[test]
    fn batch_chunks_groups_by_five() {
        let chunks: Vec<String> = (0..11).map(|index| index.to_string()).collect();
        let batches = batch_chunks(&chunks, DEFAULT_BATCH_SIZE);

        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0], "0\n1\n2\n3\n4");
        assert_eq!(batches[2], "10");
    }
}
