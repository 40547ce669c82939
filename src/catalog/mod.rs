pub mod dependencies;
pub mod entities;
pub mod types;

pub use dependencies::*;
pub use entities::*;
pub use types::*;
