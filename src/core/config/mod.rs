pub mod data;
pub mod env;
pub mod io;
pub mod printing;

pub use data::{Config, OpenAiConfig, UpstreamKind};
pub use io::ConfigError;
