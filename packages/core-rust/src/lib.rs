//! Judge dispatch core: submission records and compile-stage bus messages.

pub mod codec;
pub mod language;
pub mod messages;
pub mod submission;

pub use codec::WireFormat;
pub use language::{Language, UnsupportedLanguage};
pub use messages::{CompileRequest, CompileResult, RequestKind, Route};
pub use submission::{CompileStatus, Submission};
