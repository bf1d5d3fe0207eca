#![forbid(unsafe_code)]

//! smartnav: keyboard navigation over a web page's most prominent buttons.
//!
//! The core ranks the clickable elements of a page, lets the user cycle
//! through them with Tab-like keys, and keeps per-page usage counters:
//! 1. **Detector**: collects, filters and scores button-like elements
//! 2. **Navigator**: ring state machine over the ranked list
//! 3. **Stats recorder**: shown/clicked counters with a debounced flush
//! 4. **Key router**: which keys the overlay takes, never while typing
//!
//! A host implements [`dom::Dom`] and [`presenter::Presenter`] and drives a
//! [`navigator::session::NavigatorSession`].
//!
//! # Library usage
//!
//! ```rust,no_run
//! use smartnav::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use smartnav::core::config::Config;
//! use smartnav::dom::snapshot::PageSnapshot;
//! ```

pub mod prelude;

pub mod core;
pub mod detector;
pub mod dom;
pub mod keys;
pub mod logger;
pub mod navigator;
pub mod presenter;
pub mod stats;
