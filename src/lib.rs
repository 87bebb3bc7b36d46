//! Chat bot for time tracking. A user links a spreadsheet, starts and stops timed
//! tasks through a conversation, and requests aggregated hour reports. The chat
//! transport and the spreadsheet service sit behind narrow trait boundaries.
//!

pub mod bot;
pub mod cli;
pub mod engine;
pub mod report;
pub mod sheet;
pub mod utils;
