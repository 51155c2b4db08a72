//! Pipeline stages for table extraction.
//!
//! Each submodule implements exactly one step and is tested on its own.
//!
//! ## Data Flow
//!
//! ```text
//! gate ──▶ normalize ──▶ analyze ──▶ shape ──▶ export
//! (cost)   (GIF → PNG)   (layout)   (records)  (JSON/CSV + zip)
//! ```
//!
//! 1. [`gate`]: document/organization/range checks, then a credit
//!    reservation sized by [`cost`]
//! 2. [`normalize`]: download a page image and re-encode it as PNG
//! 3. [`analyze`]: submit the PNG to the layout model and poll for tables
//! 4. [`shape`]: raw service tables → [`crate::output::TableRecord`]
//! 5. [`export`]: per-document JSON or CSV, bundled into one zip

pub mod analyze;
pub mod cost;
pub mod export;
pub mod gate;
pub mod normalize;
pub mod shape;
