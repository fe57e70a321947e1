pub mod config;
pub mod download_client;
pub mod error;
pub mod gitlab;
pub mod logging;
pub mod parser;
pub mod release;
pub mod source_url;
pub mod supervisor;
pub mod transfer;

#[cfg(test)]
pub mod test_helpers;
