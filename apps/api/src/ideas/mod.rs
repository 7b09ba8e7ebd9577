// Ideas: AI recommendations, the collaboration step, history and document export.
// All provider calls go through llm_client via the Recommender.

pub mod export;
pub mod handlers;
pub mod prompts;
pub mod recommend;
