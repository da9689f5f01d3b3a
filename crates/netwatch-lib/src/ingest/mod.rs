//! Sample ingestion pipeline
//!
//! Each submission runs validate -> baseline snapshot -> classify -> persist
//! and ends in exactly one outcome: `Ok(IngestOutcome)` when the sample was
//! stored, `Err(IngestError)` when it was rejected.
//!
//! A storage failure after the baseline update leaves the baseline advanced
//! even though the sample was not recorded; it is never rolled back. Anomaly
//! counters, anomaly logs and alerts only cover stored samples.

mod pipeline;

#[cfg(test)]
mod tests;

pub use pipeline::{IngestOutcome, IngestionPipeline, IngestionPipelineBuilder};
