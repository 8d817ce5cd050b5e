pub mod blog;
pub mod llm;
pub mod media;
pub mod moderation;
pub mod music;
pub mod story;
pub mod tts;
pub mod workflow;
