pub mod components;
pub mod engine;
pub mod error;
pub mod models;
pub mod placement;
pub mod reporting;
pub mod rule;
pub mod sink;
pub mod values;

// Re-export commonly used items
pub use components::*;
pub use engine::*;
pub use error::*;
pub use models::*;
pub use placement::*;
pub use reporting::*;
pub use rule::*;
pub use sink::*;
pub use values::*;
