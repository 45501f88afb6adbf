pub mod cli;
pub mod config;
pub mod node;

pub use config::NodeConfig;
pub use node::{GatherNode, NodeStats};
