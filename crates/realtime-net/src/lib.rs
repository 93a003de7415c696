#![warn(
	clippy::all,
	clippy::pedantic,
	clippy::correctness,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::complexity,
	clippy::nursery,
	clippy::unwrap_used,
	unused_qualifications,
	rust_2018_idioms,
	trivial_casts,
	trivial_numeric_casts,
	unused_allocation,
	clippy::unnecessary_cast,
	clippy::cast_lossless,
	clippy::cast_possible_truncation,
	clippy::cast_possible_wrap,
	clippy::cast_precision_loss,
	clippy::cast_sign_loss,
	clippy::dbg_macro,
	clippy::deprecated_cfg_attr,
	clippy::separated_literal_suffix,
	deprecated
)]
#![forbid(deprecated_in_future)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

//! Network adapters for `jm-realtime`.
//!
//! [`HttpApi`] implements every request/response collaborator over the JayMatch REST api and
//! [`WsTransport`] opens the live stream. Both derive their routes from one [`Endpoints`] value.

mod endpoints;
mod http;
mod ws;

pub use endpoints::{EndpointError, Endpoints, DEFAULT_BASE_URL};
pub use http::HttpApi;
pub use ws::WsTransport;
