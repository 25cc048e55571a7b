// Shared Node.js host for plugins backed by npm compiler packages
#[cfg(any(feature = "plugin-stylus", feature = "plugin-typescript"))]
pub mod node;

#[cfg(feature = "plugin-stylus")]
pub mod stylus;
#[cfg(feature = "plugin-typescript")]
pub mod typescript;
