pub mod classify;
pub mod config;
pub mod constants;
pub mod decode;
pub mod driver;
pub mod error;
pub mod frame;
pub mod layer;
pub mod packet;
pub mod registry;
pub mod render;
pub mod report;
pub mod source;
pub mod stats;


// Re-export the pieces a caller needs to run a dump
pub use config::RunConfig;
pub use driver::{Driver, EndReason, RunSummary};
pub use error::DumpError;
pub use frame::Frame;
pub use source::{FrameSource, MemorySource, PcapSource};
