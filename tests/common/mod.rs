pub mod contexts;
pub mod engines;
pub mod observers;
pub mod strategies;
pub mod triggers;

pub use contexts::*;
pub use engines::*;
pub use observers::*;
pub use strategies::*;
pub use triggers::*;
