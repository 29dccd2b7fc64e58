use crate::models::{DocumentRecord, Node};
use regex::Regex;
use std::sync::OnceLock;
use uuid::Uuid;

pub const DEFAULT_CHUNK_SIZE: usize = 500; // characters
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;

/// Splits document records into overlapping, sentence-aligned nodes.
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP)
    }
}

impl Chunker {
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size,
            overlap: overlap.min(chunk_size / 2),
        }
    }

    pub fn split_documents(&self, records: &[DocumentRecord]) -> Vec<Node> {
        let nodes: Vec<Node> = records.iter().flat_map(|r| self.split_record(r)).collect();
        log::info!("Created {} nodes from {} documents", nodes.len(), records.len());
        nodes
    }

    pub fn split_record(&self, record: &DocumentRecord) -> Vec<Node> {
        let ref_doc_id = Uuid::new_v4().to_string();
        let mut nodes = Vec::new();

        let cleaned = clean_text(&record.text);
        let mut current_chunk = String::new();
        let mut start_pos = 0;

        for sentence in split_into_sentences(&cleaned) {
            let current_len = current_chunk.chars().count();
            if current_len + sentence.chars().count() > self.chunk_size && !current_chunk.is_empty() {
                nodes.push(self.node(record, &ref_doc_id, &current_chunk, start_pos));

                // Carry the tail of the previous chunk into the next one.
                let overlap_text: String = if current_len > self.overlap {
                    current_chunk.chars().skip(current_len - self.overlap).collect()
                } else {
                    current_chunk.clone()
                };

                start_pos += current_len - overlap_text.chars().count();
                current_chunk = overlap_text + " " + sentence;
            } else {
                if !current_chunk.is_empty() {
                    current_chunk.push(' ');
                }
                current_chunk.push_str(sentence);
            }
        }

        if !current_chunk.trim().is_empty() {
            nodes.push(self.node(record, &ref_doc_id, &current_chunk, start_pos));
        }

        nodes
    }

    fn node(&self, record: &DocumentRecord, ref_doc_id: &str, chunk: &str, start_pos: usize) -> Node {
        Node {
            id: Uuid::new_v4().to_string(),
            ref_doc_id: ref_doc_id.to_string(),
            text: chunk.trim().to_string(),
            start_position: start_pos,
            end_position: start_pos + chunk.chars().count(),
            metadata: record.metadata.clone(),
        }
    }
}

fn clean_text(text: &str) -> String {
    static WHITESPACE: OnceLock<Regex> = OnceLock::new();
    static SPECIAL: OnceLock<Regex> = OnceLock::new();
    let whitespace = WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("valid regex"));
    let special = SPECIAL
        .get_or_init(|| Regex::new(r"[^\w\s.,!?;:'()\-\[\]{}%$/]").expect("valid regex"));

    let cleaned = special.replace_all(text, " ");
    let cleaned = whitespace.replace_all(&cleaned, " ");

    cleaned.trim().to_string()
}

/// Sentence pieces with their terminating punctuation kept.
fn split_into_sentences(text: &str) -> Vec<&str> {
    static BOUNDARY: OnceLock<Regex> = OnceLock::new();
    let boundary = BOUNDARY.get_or_init(|| Regex::new(r"[.!?]+\s+").expect("valid regex"));

    let mut sentences = Vec::new();
    let mut start = 0;
    for m in boundary.find_iter(text) {
        let sentence = text[start..m.end()].trim();
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
        start = m.end();
    }
    let rest = text[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest);
    }
    sentences
}
