//! REST binding.
//!
//! Stateless and read-only: `find` runs one configured request, `read`
//! fetches `{url}/{identifier}`.
//!
//! # Settings
//!
//! | Key | Required | Meaning |
//! |-----|----------|---------|
//! | `url` | yes | Base URL |
//! | `resource` | no | Path appended to `url` |
//! | `method` | no | Method of the `find` request, default `GET` |
//! | `query` | no | Map of query parameters |
//! | `headers` | no | Map of extra headers |
//! | `username` / `password` | no | Basic authentication |
//! | `token` | no | Bearer token, used when `username` is absent |
//! | `timeout_secs` | no | Request timeout, default 30 |

mod binding;
pub mod client;
pub mod settings;

pub use binding::RestBinding;
#[cfg(feature = "rest")]
pub use client::HttpRestClient;
pub use client::{RestClient, RestError, RestRequest};
pub use settings::{RestAuth, RestMethod, RestSettings};
