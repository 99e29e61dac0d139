//! Prompt assembly for RAG generation

use crate::types::chat::Message;
use crate::vector::SearchHit;

/// System instructions placed at the top of every retrieval prompt
const SYSTEM_PROMPT: &str = "\
You are a helpful financial assistant. Your role is to provide accurate,
context-aware answers to financial questions based on the provided documents.

Guidelines:
- Answer questions based ONLY on the provided context from financial documents
- If the context doesn't contain enough information to answer the question, clearly state that
- Be concise and professional in your responses
- Cite specific information from the documents when relevant
- If asked about topics not covered in the documents, politely indicate the limitation";

/// Canned refusal used when the no-context call itself fails
pub const REFUSAL_MESSAGE: &str = "\
I'm a financial assistant specialized in finance-related topics. \
I can only answer questions related to finance, accounting, investments, \
economics, banking, and other financial matters. Please ask me a question \
related to finance, or upload financial documents for more specific assistance.";

/// Builds the prompts the engine sends to the chat provider
pub struct PromptBuilder;

impl PromptBuilder {
    /// Assemble the retrieval prompt: system instructions, retrieved
    /// documents, conversation history, current question - in that order.
    ///
    /// Absent regions are omitted rather than emitted as empty sections.
    pub fn build(query: &str, hits: &[SearchHit], history: &[Message]) -> String {
        let mut prompt = String::from(SYSTEM_PROMPT);

        if !hits.is_empty() {
            prompt.push_str("\n\n=== RELEVANT FINANCIAL DOCUMENTS ===\n");
            for (i, hit) in hits.iter().enumerate() {
                prompt.push_str(&format!(
                    "\n[Document {}: {}]\n{}\n",
                    i + 1,
                    hit.metadata.filename,
                    hit.text
                ));
            }
        }

        if !history.is_empty() {
            prompt.push_str("\n\n=== CONVERSATION HISTORY ===\n");
            for message in history {
                prompt.push_str(&format!(
                    "\n{}: {}\n",
                    message.role.as_str().to_uppercase(),
                    message.content
                ));
            }
        }

        prompt.push_str(&format!(
            "\n\n=== CURRENT QUESTION ===\n{query}\n\nPlease provide a helpful answer based on the context above."
        ));

        prompt
    }

    /// Single combined classification-and-answer prompt for queries with no
    /// usable retrieval. The domain decision is encoded in the prompt, not in
    /// code: one LLM call either answers from model prior or redirects.
    pub fn build_no_context(query: &str) -> String {
        format!(
            "You are a financial assistant. Analyze the following question and respond accordingly:\n\
             \n\
             1. First, determine if the question is related to finance, accounting, economics, investments, banking, or financial topics.\n\
             2. If it IS finance-related: Provide a helpful, accurate answer using your general knowledge. Keep it concise and professional. If specific data would help, mention that uploading documents would provide more accurate answers.\n\
             3. If it is NOT finance-related: Politely explain that you only handle finance-related questions, starting your reply with \"I'm a financial assistant\", and ask the user to ask about finance topics.\n\
             \n\
             Question: {query}\n\
             \n\
             Your response:"
        )
    }
}
