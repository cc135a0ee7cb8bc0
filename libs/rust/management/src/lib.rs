//! Management API client.
//!
//! [`ManagementClient`] wires the request-execution runtime for the
//! management API: bearer-token and telemetry middleware, the management
//! error body parser, and one manager per resource family.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod error;
pub mod logs;

pub use client::{ManagementClient, ManagementClientOptions, default_client_info};
pub use error::{ManagementErrorBody, ManagementErrorParser};
pub use logs::{GetLogRequest, GetLogsRequest, ListLogsResponse, Log, LogsManager, LogsPage};
