pub mod budget;
pub mod controller;
pub mod dispatch;
pub mod ledger;
pub mod parser;
pub mod repeat;
pub mod session;

pub use controller::AgentLoop;
pub use dispatch::Dispatcher;
pub use ledger::{Step, StepKind, StepLedger};
pub use parser::{parse_tool_call, strip_reasoning, ToolCall};
pub use session::{SessionSnapshot, SessionStatus};
