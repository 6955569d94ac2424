pub mod draw;
pub mod flags;
pub mod jwt;
pub mod stats;

pub use flags::*;
pub use jwt::*;
