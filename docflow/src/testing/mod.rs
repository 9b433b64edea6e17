//! Test-support plugins.
//!
//! In-memory sources, processors and extractors with call counters, used
//! by this crate's tests and available to downstream test suites.

mod mocks;

pub use mocks::{
    sample_documents, CountExtractor, FailingProcessor, FlakyProcessor, MarkerProcessor,
    SlowProcessor, StaticSource,
};
