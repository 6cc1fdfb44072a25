//! SMS log receiver library
//!
//! Accepts SMS log CSV files posted by the SMS recorder client as
//! `multipart/form-data` and stores them under a UTC date-partitioned tree:
//!
//! ```text
//! SMS_FILE/<YYYY>/<MM>/<DD>/smslog_<YYYYMMDDTHHMMSSZ>.csv
//! ```
//!
//! Successful uploads are acknowledged with
//! `{"message":"Good to go","succeeded":true}`; failed ones get an XML error
//! document rendered from `errorResponse.xml`.
//!
//! # Example
//!
//! ```no_run
//! use smslog_receiver::{config::Config, server::Server};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let server = Server::bind(config).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod logging;
pub mod metrics;
pub mod response;
pub mod server;
pub mod storage;
pub mod upload;

// Re-export commonly used types
pub use config::Config;
pub use server::Server;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
