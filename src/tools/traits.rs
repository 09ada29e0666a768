use async_trait::async_trait;
use std::sync::Arc;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

// ─── Capability traits ───────────────────────────────────────────────────────

/// Web search: free-text query in, result digest out.
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str) -> anyhow::Result<String>;
}

/// Retrieval over an indexed document corpus.
#[async_trait]
pub trait RagSearch: Send + Sync {
    async fn search(&self, query: &str) -> anyhow::Result<String>;
}

/// Sandboxed code execution.
#[async_trait]
pub trait PythonExec: Send + Sync {
    async fn run(&self, code: &str) -> anyhow::Result<String>;
}

/// Persistent memory, write side.
#[async_trait]
pub trait MemorySave: Send + Sync {
    async fn save(&self, content: &str) -> anyhow::Result<String>;
}

/// Persistent memory, read side. Synchronous by contract: recall is served
/// from local state and never suspends.
pub trait MemoryRecall: Send + Sync {
    fn recall(&self, query: &str) -> String;
}

// ─── Wire names ──────────────────────────────────────────────────────────────

/// Tool names as they appear on the wire. Canonical form is snake_case;
/// the camelCase spellings are accepted as aliases since small models echo
/// whichever form they last saw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, EnumString)]
pub enum ToolName {
    #[strum(to_string = "web_search", serialize = "webSearch")]
    WebSearch,
    #[strum(to_string = "rag_search", serialize = "ragSearch")]
    RagSearch,
    #[strum(to_string = "python")]
    Python,
    #[strum(to_string = "memory_save", serialize = "memorySave")]
    MemorySave,
    #[strum(to_string = "memory_recall", serialize = "memoryRecall")]
    MemoryRecall,
}

impl ToolName {
    /// Canonical argument key for prompt documentation.
    pub fn arg_key(self) -> &'static str {
        match self {
            Self::WebSearch | Self::RagSearch | Self::MemoryRecall => "query",
            Self::Python => "code",
            Self::MemorySave => "content",
        }
    }

    /// Accepted argument spellings, canonical first.
    pub fn arg_aliases(self) -> &'static [&'static str] {
        match self {
            Self::WebSearch | Self::RagSearch | Self::MemoryRecall => &["query", "q"],
            Self::Python => &["code", "script"],
            Self::MemorySave => &["content", "text"],
        }
    }

    /// One-line description shown to the model in the system prompt.
    pub fn description(self) -> &'static str {
        match self {
            Self::WebSearch => "Search the web for current information",
            Self::RagSearch => "Search the indexed document collection",
            Self::Python => "Execute Python code and return its output",
            Self::MemorySave => "Save a note to persistent memory",
            Self::MemoryRecall => "Search previously saved memory notes",
        }
    }
}

// ─── Toolkit ─────────────────────────────────────────────────────────────────

/// The externally injected, partially-populated capability set for one loop
/// invocation. Presence is checked at dispatch time; absent capabilities are
/// never advertised to the model.
#[derive(Default, Clone)]
pub struct Toolkit {
    pub web_search: Option<Arc<dyn WebSearch>>,
    pub rag_search: Option<Arc<dyn RagSearch>>,
    pub python: Option<Arc<dyn PythonExec>>,
    pub memory_save: Option<Arc<dyn MemorySave>>,
    pub memory_recall: Option<Arc<dyn MemoryRecall>>,
}

impl Toolkit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_web_search(mut self, capability: Arc<dyn WebSearch>) -> Self {
        self.web_search = Some(capability);
        self
    }

    pub fn with_rag_search(mut self, capability: Arc<dyn RagSearch>) -> Self {
        self.rag_search = Some(capability);
        self
    }

    pub fn with_python(mut self, capability: Arc<dyn PythonExec>) -> Self {
        self.python = Some(capability);
        self
    }

    pub fn with_memory_save(mut self, capability: Arc<dyn MemorySave>) -> Self {
        self.memory_save = Some(capability);
        self
    }

    pub fn with_memory_recall(mut self, capability: Arc<dyn MemoryRecall>) -> Self {
        self.memory_recall = Some(capability);
        self
    }

    pub fn has(&self, name: ToolName) -> bool {
        match name {
            ToolName::WebSearch => self.web_search.is_some(),
            ToolName::RagSearch => self.rag_search.is_some(),
            ToolName::Python => self.python.is_some(),
            ToolName::MemorySave => self.memory_save.is_some(),
            ToolName::MemoryRecall => self.memory_recall.is_some(),
        }
    }

    /// Capabilities actually present, in declaration order.
    pub fn present(&self) -> Vec<ToolName> {
        ToolName::iter().filter(|name| self.has(*name)).collect()
    }

    pub fn is_empty(&self) -> bool {
        ToolName::iter().all(|name| !self.has(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeSearch;

    #[async_trait]
    impl WebSearch for FakeSearch {
        async fn search(&self, _query: &str) -> anyhow::Result<String> {
            Ok("results".to_string())
        }
    }

    #[test]
    fn empty_toolkit_has_nothing() {
        let toolkit = Toolkit::new();
        assert!(toolkit.is_empty());
        assert!(toolkit.present().is_empty());
        assert!(!toolkit.has(ToolName::WebSearch));
    }

    #[test]
    fn builder_registers_capability() {
        let toolkit = Toolkit::new().with_web_search(Arc::new(FakeSearch));
        assert!(toolkit.has(ToolName::WebSearch));
        assert!(!toolkit.has(ToolName::Python));
        assert_eq!(toolkit.present(), vec![ToolName::WebSearch]);
    }

    #[test]
    fn snake_case_is_canonical() {
        assert_eq!(ToolName::WebSearch.to_string(), "web_search");
        assert_eq!(ToolName::MemoryRecall.to_string(), "memory_recall");
    }

    #[test]
    fn camel_case_accepted_as_alias() {
        assert_eq!("webSearch".parse::<ToolName>().unwrap(), ToolName::WebSearch);
        assert_eq!("web_search".parse::<ToolName>().unwrap(), ToolName::WebSearch);
        assert_eq!("memorySave".parse::<ToolName>().unwrap(), ToolName::MemorySave);
        assert!("browse".parse::<ToolName>().is_err());
    }

    #[test]
    fn arg_aliases_start_with_canonical_key() {
        for name in ToolName::iter() {
            assert_eq!(name.arg_aliases()[0], name.arg_key());
        }
    }
}
