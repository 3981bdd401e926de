pub mod adapter;
pub mod block;
pub mod error;
pub mod extract;
pub mod filter;
pub mod orchestrator;
pub mod policy;
pub mod price;

pub use adapter::{ExtractedPage, HttpAdapter, PageCursor, PlatformAdapter, RawPage};
pub use error::{AdapterError, ScanError};
pub use extract::CompiledRules;
pub use filter::{accepts, in_range, matched_keywords, matches};
pub use orchestrator::{CompletionHandle, RecordStream, Scanner};
pub use policy::{RetryAction, RetryPolicy};
pub use price::parse_price;
