//! Adaptive conditional polling of a JSON snapshot, plus history-aware in-page navigation, for the Stagger console.
//!
//! The core ([`backoff`], [`fetch`], [`navigation`]) only talks to the page through the traits in [`host`].
//! [`deterministic`] implements those with a virtual clock, `web` (on `wasm32` only) with `window`.

#![doc(html_root_url = "https://docs.rs/stagger-web/0.0.1")]
#![warn(clippy::pedantic)]

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

pub mod artifact;
pub mod backoff;
pub mod config;
pub mod deterministic;
pub mod error;
pub mod fetch;
pub mod host;
pub mod navigation;
pub mod pages;
pub mod query;
pub mod router;
pub mod signal;
pub mod view;

#[cfg(target_arch = "wasm32")]
mod closure_map;
#[cfg(target_arch = "wasm32")]
pub mod web;
