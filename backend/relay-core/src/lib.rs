pub mod config;
pub mod envelope;
pub mod error;
pub mod probe;
pub mod protocol;
pub mod supervisor;
pub mod transport;

#[cfg(test)]
mod tests;

pub const DEFAULT_IP: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 7575;
pub const DEFAULT_TOKEN: &str = "hello";
pub const DEFAULT_ADDRESS: &str = const_format::concatcp!(DEFAULT_IP, ":", DEFAULT_PORT);
