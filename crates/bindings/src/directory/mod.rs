//! Directory-service binding.
//!
//! Reads and writes the users of a hosted directory domain through an
//! authenticated HTTP API. Every binding owns its [`DirectoryClient`]; the
//! client logs in with the admin credentials on first use.
//!
//! # Settings
//!
//! | Key | Required | Meaning |
//! |-----|----------|---------|
//! | `username` | yes | Admin login, `user@domain` |
//! | `password` | yes | Admin password |
//! | `domain` | no | Directory domain, else taken from `username` |
//! | `endpoint` | no | User feed URL, else derived from the domain |
//! | `auth_url` | no | Login URL |
//! | `timeout_secs` | no | Request timeout, default 30 |

mod binding;
pub mod client;
pub mod mapping;
pub mod settings;

pub use binding::DirectoryApiBinding;
#[cfg(feature = "directory")]
pub use client::HttpDirectoryClient;
pub use client::{DirectoryClient, DirectoryError, Login, Name, NewUser, UserEntry};
pub use settings::DirectorySettings;
