//! Pipeline stages for document extraction.
//!
//! Each submodule implements exactly one step, so each is testable alone and
//! the collaborators (renderer, endpoint) can be swapped behind their traits.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render/encode ──▶ rate_limit ──▶ llm ──▶ postprocess
//! (path/URL)  (page images)    (60 s window)  (model)  (JSON object)
//! ```
//!
//! 1. [`input`]  — read a path or URL into a [`crate::model::Document`]
//! 2. [`render`] — rasterise PDF pages in `spawn_blocking`; images pass through
//! 3. [`encode`] — base64-wrap pages and image files as `PageImage`s
//! 4. [`rate_limit`] — sliding-window admission shared by every call
//! 5. [`llm`]    — compose the request and call the endpoint once
//! 6. [`postprocess`] — strip fences and parse the reply into an object

pub mod encode;
pub mod input;
pub mod llm;
pub mod postprocess;
pub mod rate_limit;
pub mod render;
