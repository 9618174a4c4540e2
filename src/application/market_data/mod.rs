// Technical indicators for the historical view
pub mod indicators;
