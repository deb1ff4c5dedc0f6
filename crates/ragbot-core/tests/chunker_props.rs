use proptest::prelude::*;

use ragbot_core::chunker::{Chunker, ChunkingConfig};
use ragbot_core::types::{Document, Meta};

fn doc(text: &str) -> Document {
    Document { path: "p.txt".to_string(), raw_text: text.to_string(), metadata: Meta::new() }
}

fn sizes() -> impl Strategy<Value = (usize, usize)> {
    (1usize..64).prop_flat_map(|max| (Just(max), 0..max))
}

proptest! {
    #[test]
    fn windows_reconstruct_the_text((max, overlap) in sizes(), text in "\\PC{0,400}") {
        let chunks = Chunker::new(ChunkingConfig::new(max, overlap)).unwrap().chunk(&doc(&text));
        let chars: Vec<char> = text.chars().collect();

        let mut rebuilt = String::new();
        let mut covered = 0usize;
        for c in &chunks {
            let len = c.text.chars().count();
            prop_assert!(len <= max);
            prop_assert!(c.offset <= covered, "gap before offset {}", c.offset);
            let window: String = chars[c.offset..c.offset + len].iter().collect();
            prop_assert_eq!(&window, &c.text);
            rebuilt.extend(c.text.chars().skip(covered - c.offset));
            covered = c.offset + len;
        }
        prop_assert_eq!(rebuilt, text);
    }

    #[test]
    fn consecutive_chunks_overlap_by_the_configured_amount((max, overlap) in sizes(), len in 0usize..500) {
        let text = "ab".repeat(len);
        let chunks = Chunker::new(ChunkingConfig::new(max, overlap)).unwrap().chunk(&doc(&text));
        for pair in chunks.windows(2) {
            prop_assert_eq!(pair[1].offset - pair[0].offset, max - overlap);
            prop_assert_eq!(pair[0].text.chars().count(), max);
        }
    }

    #[test]
    fn chunk_count_matches_formula((max, overlap) in sizes(), len in 1usize..1000) {
        let cfg = ChunkingConfig::new(max, overlap);
        let chunks = Chunker::new(cfg.clone()).unwrap().chunk(&doc(&"z".repeat(len)));
        let step = max - overlap;
        let expected = if len <= max { 1 } else { (len - overlap).div_ceil(step) };
        prop_assert_eq!(chunks.len(), expected);
        prop_assert_eq!(cfg.expected_chunks(len), expected);
    }

    #[test]
    fn chunking_is_deterministic((max, overlap) in sizes(), text in "\\PC{0,300}") {
        let chunker = Chunker::new(ChunkingConfig::new(max, overlap)).unwrap();
        prop_assert_eq!(chunker.chunk(&doc(&text)), chunker.chunk(&doc(&text)));
    }
}
