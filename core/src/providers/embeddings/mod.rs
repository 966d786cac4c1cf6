pub(crate) mod hashing;
pub(crate) mod openai;

pub use hashing::HashingEmbeddingModel as HashingEmbedding;
pub use openai::OpenAIEmbeddingModel as OpenAIEmbedding;
