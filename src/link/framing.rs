/// Chunk framing and reassembly for text payloads
use tracing::trace;

use crate::error::LinkError;

/// A bounded slice of an outbound message with sequence metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub total: usize,
    pub payload: String,
}

/// Split a message into chunks of at most `max_chunk_chars` characters.
///
/// Every chunk except possibly the last carries exactly `max_chunk_chars`
/// characters, and concatenating the payloads in index order reproduces
/// the message. Boundaries are measured in characters so multi-byte text
/// is never cut inside a scalar value.
pub fn split(message: &str, max_chunk_chars: usize) -> Result<Vec<Chunk>, LinkError> {
    if max_chunk_chars == 0 {
        return Err(LinkError::InvalidInput);
    }

    let chars: Vec<char> = message.chars().collect();
    let total = (chars.len() + max_chunk_chars - 1) / max_chunk_chars;

    let mut chunks = Vec::with_capacity(total);
    for (index, window) in chars.chunks(max_chunk_chars).enumerate() {
        chunks.push(Chunk {
            index,
            total,
            payload: window.iter().collect(),
        });
    }

    trace!("split {} chars into {} chunks", chars.len(), total);
    Ok(chunks)
}

/// Accumulator of received decoded units forming the displayed received
/// text. Units are appended verbatim: no ordering or duplication checks,
/// and no message boundary. The buffer grows until explicitly cleared.
#[derive(Debug, Default)]
pub struct ReassemblyBuffer {
    text: String,
}

impl ReassemblyBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one decoded unit.
    pub fn append(&mut self, unit: &str) {
        self.text.push_str(unit);
    }

    /// Current accumulated text.
    pub fn snapshot(&self) -> String {
        self.text.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_message_yields_single_chunk() {
        let chunks = split("hello", 30).unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].total, 1);
        assert_eq!(chunks[0].payload, "hello");
    }

    #[test]
    fn test_message_at_exact_boundary() {
        let message = "a".repeat(30);
        let chunks = split(&message, 30).unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].payload, message);

        let message = "b".repeat(60);
        let chunks = split(&message, 30).unwrap();
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.payload.chars().count() == 30));
    }

    #[test]
    fn test_long_message_chunk_sizes_and_order() {
        let message: String = ('a'..='z').cycle().take(65).collect();
        let chunks = split(&message, 30).unwrap();

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].payload.chars().count(), 30);
        assert_eq!(chunks[1].payload.chars().count(), 30);
        assert_eq!(chunks[2].payload.chars().count(), 5);
        assert!(chunks.iter().all(|c| c.total == 3));
        assert_eq!(
            chunks.iter().map(|c| c.index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );

        let reassembled: String = chunks.iter().map(|c| c.payload.as_str()).collect();
        assert_eq!(reassembled, message);
    }

    #[test]
    fn test_multibyte_text_splits_on_characters() {
        // 31 characters, mostly multi-byte; byte slicing would panic here
        let message = "안녕하세요 세상 이것은 음향 전송 테스트입니다 하나둘셋넷";
        assert_eq!(message.chars().count(), 31);

        let chunks = split(message, 30).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].payload.chars().count(), 30);
        assert_eq!(chunks[1].payload.chars().count(), 1);

        let reassembled: String = chunks.iter().map(|c| c.payload.as_str()).collect();
        assert_eq!(reassembled, message);
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        assert!(matches!(split("hello", 0), Err(LinkError::InvalidInput)));
    }

    #[test]
    fn test_empty_message_yields_no_chunks() {
        let chunks = split("", 30).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_buffer_appends_units_in_arrival_order() {
        let mut buffer = ReassemblyBuffer::new();
        assert!(buffer.is_empty());

        buffer.append("He");
        assert_eq!(buffer.snapshot(), "He");

        buffer.append("llo");
        assert_eq!(buffer.snapshot(), "Hello");
    }

    #[test]
    fn test_buffer_clear() {
        let mut buffer = ReassemblyBuffer::new();
        buffer.append("stale");
        buffer.clear();

        assert!(buffer.is_empty());
        assert_eq!(buffer.snapshot(), "");
    }
}
