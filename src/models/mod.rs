pub mod batch;
pub mod common;
pub mod draw_session;
pub mod pagination;
pub mod prize;
pub mod stats;
pub mod token;

pub use batch::*;
pub use common::*;
pub use draw_session::*;
pub use pagination::*;
pub use prize::*;
pub use stats::*;
pub use token::*;
