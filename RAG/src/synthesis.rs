use crate::gemini_service::LanguageModel;
use crate::models::ScoredNode;
use anyhow::Result;
use std::sync::Arc;
use tiktoken_rs::CoreBPE;

/// Token budget for the retrieved context packed into a single model call.
pub const DEFAULT_CONTEXT_BUDGET: usize = 3000;

pub const EMPTY_RESPONSE: &str = "Empty Response";

/// How retrieved chunks are turned into model calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    /// Pack as many chunks per call as the budget allows, refining across calls.
    Compact,
    /// One call for the first chunk, then one refine call per remaining chunk.
    Refine,
}

/// Compact-and-refine answer synthesis.
pub struct Synthesizer {
    llm: Arc<dyn LanguageModel>,
    tokenizer: CoreBPE,
    context_budget: usize,
}

impl Synthesizer {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Result<Self> {
        Ok(Self {
            llm,
            tokenizer: tiktoken_rs::cl100k_base()?,
            context_budget: DEFAULT_CONTEXT_BUDGET,
        })
    }

    pub fn with_context_budget(mut self, tokens: usize) -> Self {
        self.context_budget = tokens.max(1);
        self
    }

    pub async fn synthesize(
        &self,
        query: &str,
        nodes: &[ScoredNode],
        mode: ResponseMode,
    ) -> Result<String> {
        let sections: Vec<String> = nodes.iter().map(context_section).collect();
        let windows = match mode {
            ResponseMode::Compact => self.pack(&sections),
            ResponseMode::Refine => sections,
        };

        let mut windows = windows.into_iter();
        let Some(first) = windows.next() else {
            return Ok(EMPTY_RESPONSE.to_string());
        };

        let mut answer = self.llm.complete(&qa_prompt(&first, query)).await?;
        let mut calls = 1;
        for context in windows {
            answer = self
                .llm
                .complete(&refine_prompt(query, &answer, &context))
                .await?;
            calls += 1;
        }

        log::info!("Synthesized answer from {} chunks in {} model calls", nodes.len(), calls);
        Ok(answer)
    }

    /// Greedily groups sections into windows that fit the token budget.
    /// A section larger than the budget gets a window of its own.
    pub fn pack(&self, sections: &[String]) -> Vec<String> {
        let mut windows = Vec::new();
        let mut current = String::new();
        let mut current_tokens = 0;

        for section in sections {
            let tokens = self.count_tokens(section);
            if !current.is_empty() && current_tokens + tokens > self.context_budget {
                windows.push(std::mem::take(&mut current));
                current_tokens = 0;
            }
            if !current.is_empty() {
                current.push_str("\n\n");
            }
            current.push_str(section);
            current_tokens += tokens;
        }

        if !current.is_empty() {
            windows.push(current);
        }
        windows
    }

    fn count_tokens(&self, text: &str) -> usize {
        self.tokenizer.encode_with_special_tokens(text).len()
    }
}

fn context_section(scored: &ScoredNode) -> String {
    format!(
        "Document: {}\nContent: {}",
        scored.node.metadata.file_name, scored.node.text
    )
}

fn qa_prompt(context: &str, query: &str) -> String {
    format!(
        r#"You answer questions about the user's documents using only the context below.

CONTEXT DOCUMENTS:
{context}

Answer the question from the context alone, without prior knowledge. If the context does not contain the answer, say so plainly.

QUESTION: {query}

ANSWER:"#
    )
}

fn refine_prompt(query: &str, existing_answer: &str, context: &str) -> String {
    format!(
        r#"QUESTION: {query}

CURRENT ANSWER: {existing_answer}

More context from the user's documents is below.

CONTEXT DOCUMENTS:
{context}

Improve the current answer using this additional context if it helps. If the context is not useful, repeat the current answer unchanged.

REFINED ANSWER:"#
    )
}
