//! Ingestion pipeline
//!
//! A single sequential consume-validate-persist loop over a
//! [`MessageSource`]. Messages are processed in receive order and every
//! failure is local to its message.

pub mod pipeline;
pub mod source;

pub use pipeline::{
    ingestion_task, process_message, run_ingestion, IngestConfig, IngestMetrics, IngestSnapshot,
    MessageOutcome,
};
pub use source::{
    channel, ChannelSource, JsonLinesSource, MessagePublisher, MessageSource, PublishError,
    RecvError,
};
