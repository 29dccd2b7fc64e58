use crate::embedding_service::EmbeddingModel;
use crate::gemini_service::LanguageModel;
use crate::models::Node;
use crate::synthesis::{ResponseMode, Synthesizer};
use crate::vector_index::VectorIndex;
use anyhow::Result;
use std::sync::Arc;

const SUMMARY_KEYWORDS: [&str; 4] = [
    "summary",
    "summarize",
    "what is this about",
    "what is it about",
];

pub const SUMMARY_PROMPT: &str = "Provide a clear and concise summary of the latest document. \
Focus on the main points and key insights. \
Format the response in clean paragraphs without bullet points or excessive line breaks.";

pub const NO_DOCUMENT_TO_SUMMARIZE: &str = "I couldn't find the latest document to summarize. \
Please ensure documents are properly uploaded.";

const SENTENCES_PER_PARAGRAPH: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Summary,
    Direct,
}

/// Classifies a question by keyword, case-insensitively.
pub fn classify(question: &str) -> QueryKind {
    let lowered = question.to_lowercase();
    if SUMMARY_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        QueryKind::Summary
    } else {
        QueryKind::Direct
    }
}

#[derive(Debug, Clone, Copy)]
pub struct QueryOptions {
    pub streaming: bool,
    pub similarity_top_k: usize,
    pub response_mode: ResponseMode,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            streaming: false,
            similarity_top_k: 5,
            response_mode: ResponseMode::Compact,
        }
    }
}

/// Answers questions against one built index.
pub struct QueryEngine {
    index: Arc<VectorIndex>,
    embedding_model: Arc<dyn EmbeddingModel>,
    synthesizer: Synthesizer,
    options: QueryOptions,
}

impl QueryEngine {
    pub fn new(
        index: Arc<VectorIndex>,
        embedding_model: Arc<dyn EmbeddingModel>,
        llm: Arc<dyn LanguageModel>,
    ) -> Result<Self> {
        Ok(Self {
            index,
            embedding_model,
            synthesizer: Synthesizer::new(llm)?,
            options: QueryOptions::default(),
        })
    }

    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub async fn query(&self, question: &str) -> Result<String> {
        log::info!("Processing query: {}", question);

        let raw = match classify(question) {
            QueryKind::Summary => match self.latest_node() {
                Some(latest) => {
                    log::info!(
                        "Generating summary for latest document: {}",
                        latest.metadata.file_name
                    );
                    self.retrieve_and_answer(SUMMARY_PROMPT).await?
                }
                None => {
                    log::warn!("No latest document found for summarization");
                    NO_DOCUMENT_TO_SUMMARIZE.to_string()
                }
            },
            QueryKind::Direct => self.retrieve_and_answer(question).await?,
        };

        Ok(process_response(&raw))
    }

    /// Node with the greatest `file_name`, i.e. from the newest upload.
    fn latest_node(&self) -> Option<&Node> {
        self.index
            .docstore()
            .nodes()
            .max_by(|a, b| a.metadata.file_name.cmp(&b.metadata.file_name))
    }

    async fn retrieve_and_answer(&self, prompt: &str) -> Result<String> {
        let query_embedding = self.embedding_model.embed_query(prompt).await?;
        let nodes = self
            .index
            .retrieve(&query_embedding, self.options.similarity_top_k);
        log::info!("Found {} relevant chunks", nodes.len());

        self.synthesizer
            .synthesize(prompt, &nodes, self.options.response_mode)
            .await
    }
}

/// Reflows raw model output into paragraphs of up to three sentences.
///
/// Whitespace is collapsed, a space is forced after `.`, `!` and `?`, and the
/// text is cut on `". "`. This is a heuristic: abbreviations and decimals get
/// split too. Applying it to its own output changes nothing.
pub fn process_response(response_text: &str) -> String {
    let cleaned = response_text.split_whitespace().collect::<Vec<_>>().join(" ");

    let spaced = cleaned
        .replace('.', ". ")
        .replace('!', "! ")
        .replace('?', "? ");
    let cleaned = spaced.split_whitespace().collect::<Vec<_>>().join(" ");

    if cleaned.is_empty() {
        return String::new();
    }

    let mut sentences: Vec<&str> = cleaned.split(". ").collect();
    if let Some(last) = sentences.last_mut() {
        let unit: &str = *last;
        *last = unit.strip_suffix('.').unwrap_or(unit);
    }

    sentences
        .chunks(SENTENCES_PER_PARAGRAPH)
        .map(|group| {
            let mut paragraph = group.join(". ");
            if !paragraph.ends_with(['!', '?']) {
                paragraph.push('.');
            }
            paragraph
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index_builder::tests::LetterEmbedder;
    use crate::index_builder::IndexBuilder;
    use crate::models::DocumentRecord;
    use crate::synthesis::tests::ScriptedModel;
    use crate::synthesis::EMPTY_RESPONSE;

    #[test]
    fn groups_three_sentences_per_paragraph() {
        let input = "This is sentence one. This is sentence two. This is sentence three. This is sentence four.";
        assert_eq!(
            process_response(input),
            "This is sentence one. This is sentence two. This is sentence three.\n\nThis is sentence four."
        );
    }

    #[test]
    fn collapses_whitespace_and_fixes_spacing() {
        let input = "  First point.Second   point!\n\nThird?Fourth  ";
        assert_eq!(
            process_response(input),
            "First point. Second point! Third? Fourth."
        );
    }

    #[test]
    fn post_processing_is_idempotent() {
        let inputs = [
            "This is sentence one. This is sentence two. This is sentence three. This is sentence four.",
            "One. Two. Three. Four. Five. Six. Seven",
            "Really? Yes! It works.",
            "The rate is 3.5 percent. Next.",
            "",
        ];
        for input in inputs {
            let once = process_response(input);
            assert_eq!(process_response(&once), once, "input: {:?}", input);
        }
    }

    #[test]
    fn empty_answer_stays_empty() {
        assert_eq!(process_response("   \n "), "");
    }

    #[test]
    fn decimals_are_split_as_sentences() {
        assert_eq!(process_response("Pi is 3.14"), "Pi is 3. 14.");
    }

    #[test]
    fn summary_keywords_route_to_summary() {
        assert_eq!(classify("Please SUMMARIZE the contract"), QueryKind::Summary);
        assert_eq!(classify("Give me a summary"), QueryKind::Summary);
        assert_eq!(classify("What is this about?"), QueryKind::Summary);
        assert_eq!(classify("what is it about"), QueryKind::Summary);
        assert_eq!(
            classify("What is the termination clause? Also summarize it."),
            QueryKind::Summary
        );
    }

    #[test]
    fn other_questions_route_directly() {
        assert_eq!(classify("What is the termination clause?"), QueryKind::Direct);
        assert_eq!(classify("What is the notice period about rent?"), QueryKind::Direct);
    }

    #[test]
    fn default_options_match_query_configuration() {
        let options = QueryOptions::default();
        assert!(!options.streaming);
        assert_eq!(options.similarity_top_k, 5);
        assert_eq!(options.response_mode, ResponseMode::Compact);
    }

    async fn engine_for(records: &[DocumentRecord], llm: Arc<ScriptedModel>) -> QueryEngine {
        let embedder = Arc::new(LetterEmbedder::new(16));
        let index = IndexBuilder::new(embedder.clone())
            .build(records, None)
            .await
            .unwrap();
        QueryEngine::new(Arc::new(index), embedder, llm).unwrap()
    }

    #[tokio::test]
    async fn direct_question_is_sent_verbatim_and_formatted() {
        let llm = Arc::new(ScriptedModel::new(&["Thirty days.  Written notice\nis required."]));
        let records = vec![DocumentRecord::new(
            "Either party may terminate with thirty days written notice.".into(),
            "20240101_000000_lease.pdf".into(),
            true,
        )];
        let engine = engine_for(&records, llm.clone()).await;

        let answer = engine.query("What is the termination clause?").await.unwrap();

        assert_eq!(answer, "Thirty days. Written notice is required.");
        let prompts = llm.prompts.lock().await;
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("QUESTION: What is the termination clause?"));
        assert!(prompts[0].contains("thirty days written notice"));
    }

    #[tokio::test]
    async fn summary_request_uses_fixed_prompt() {
        let llm = Arc::new(ScriptedModel::new(&["A lease agreement"]));
        let records = vec![
            DocumentRecord::new("Newest lease terms.".into(), "20240301_000000_new.pdf".into(), true),
            DocumentRecord::new("Older invoice.".into(), "20240101_000000_old.pdf".into(), false),
        ];
        let engine = engine_for(&records, llm.clone()).await;

        assert_eq!(
            engine.latest_node().unwrap().metadata.file_name,
            "20240301_000000_new.pdf"
        );

        let answer = engine.query("Can you summarize this?").await.unwrap();

        assert_eq!(answer, "A lease agreement.");
        let prompts = llm.prompts.lock().await;
        assert!(prompts[0].contains(SUMMARY_PROMPT));
        assert!(!prompts[0].contains("Can you summarize this?"));
    }

    #[tokio::test]
    async fn summary_without_nodes_apologizes_without_model_call() {
        let llm = Arc::new(ScriptedModel::new(&["unused"]));
        let records = vec![DocumentRecord::new("   ".into(), "20240101_000000_blank.pdf".into(), true)];
        let engine = engine_for(&records, llm.clone()).await;

        let answer = engine.query("summary please").await.unwrap();

        assert_eq!(answer, NO_DOCUMENT_TO_SUMMARIZE);
        assert!(llm.prompts.lock().await.is_empty());
    }

    #[tokio::test]
    async fn direct_question_without_context_is_empty_response() {
        let llm = Arc::new(ScriptedModel::new(&["unused"]));
        let records = vec![DocumentRecord::new("".into(), "20240101_000000_blank.pdf".into(), true)];
        let engine = engine_for(&records, llm.clone()).await;

        let answer = engine.query("Who signed it?").await.unwrap();

        assert_eq!(answer, format!("{}.", EMPTY_RESPONSE));
        assert!(llm.prompts.lock().await.is_empty());
    }
}
