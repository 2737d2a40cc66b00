/*
[INPUT]:  Signer handles and ordered transaction intents
[OUTPUT]: Gas estimates, pending batches and confirmed batch results
[POS]:    Batch layer - atomic multi-call submission
[UPDATE]: When batch submission or confirmation rules change
*/

pub mod batcher;

pub use batcher::{BatchOptions, PendingBatch, TransactionBatcher};
