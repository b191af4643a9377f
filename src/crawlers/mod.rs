pub mod frontier;
pub mod web;

pub use frontier::{Frontier, FrontierClaim, FrontierItem};
pub use web::{CrawlError, CrawlSession, CrawlStats, ItemOutcome};
