pub mod draw_session_service;
pub mod issuance_service;
pub mod prize_service;
pub mod redemption_service;
pub mod signing_service;
pub mod stats_service;

pub use draw_session_service::*;
pub use issuance_service::*;
pub use prize_service::*;
pub use redemption_service::*;
pub use signing_service::*;
pub use stats_service::*;
