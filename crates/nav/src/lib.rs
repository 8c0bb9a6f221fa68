//! Navigation menu rendering for the SHM admin panel.
//!
//! A render pass fetches the menu permitted for a session and writes one
//! list item per displayable key into the `admin-nav` container of a
//! [`Document`]. See [`MenuRenderer`].

pub mod document;
pub mod renderer;

pub use document::*;
pub use renderer::*;
