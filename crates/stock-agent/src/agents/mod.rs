//! Agents that turn a stock query into a recommendation

pub mod recommendation;

pub use recommendation::StockRecommendationAgent;
