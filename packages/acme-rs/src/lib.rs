pub mod types;
pub mod binary;
pub mod channels;
pub mod reader;
pub mod merge;
pub mod process;
pub mod supervisor;
pub mod error;

pub use types::*;
pub use binary::{find_binary, require_binary, Invocation};
pub use reader::StreamReader;
pub use merge::{merge_artifacts, merge_readers, Merged};
pub use supervisor::CaptureSupervisor;
pub use error::{CaptureError, Result};
