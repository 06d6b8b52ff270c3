pub mod extraction;
pub mod fingerprint;
pub mod ingestion;
pub mod metrics;

pub use extraction::{BillExtractor, GeminiExtractor};
pub use ingestion::{IngestOutcome, IngestionPipeline, UploadedBillFile};
