pub mod chat;
pub mod cohere;
pub mod openai;

pub use chat::{ChatClient, ChatJudge};
pub use cohere::CohereReRanker;
pub use openai::OpenAiEmbedder;
