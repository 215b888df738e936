pub mod competition;
pub mod entry;
pub mod live;
pub mod payment;
pub mod performance;
pub mod scoring;
