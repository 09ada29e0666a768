pub mod memory;
pub mod traits;

pub use memory::InMemoryStore;
pub use traits::{MemoryRecall, MemorySave, PythonExec, RagSearch, ToolName, Toolkit, WebSearch};
