mod ollama;
pub mod traits;
pub mod types;

pub use ollama::OllamaGenerator;
pub use traits::{Generator, TokenSink};
pub use types::{Message, Role};
