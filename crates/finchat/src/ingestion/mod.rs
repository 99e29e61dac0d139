//! Document ingestion: extraction, chunking, embedding, indexing

mod chunker;
mod extract;
mod pipeline;

pub use chunker::RecursiveCharacterSplitter;
pub use extract::extract_text;
pub use pipeline::IngestionPipeline;
