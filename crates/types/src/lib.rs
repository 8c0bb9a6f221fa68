//! Shared data model for the SHM admin navigation menu.
//!
//! The types here describe what travels between the backend menu endpoint,
//! the session storage, and the navigation renderer:
//!
//! - [`SessionToken`]: opaque session credential read from local storage
//! - [`MenuKey`] and [`MenuResponse`]: the ordered list of permitted sections
//! - [`LabelResolver`], [`MenuTitles`], [`RawKeys`]: how keys become visible text

pub mod menu;
pub mod titles;

pub use menu::*;
pub use titles::*;
