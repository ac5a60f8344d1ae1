// ─── Data API access ───
pub mod cache;
pub mod data_api;

// ─── Record types + aggregation over them ───
pub mod aggregate;
pub mod types;
