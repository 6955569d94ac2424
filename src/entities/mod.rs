pub mod batches;
pub mod draw_sessions;
pub mod draw_spins;
pub mod prizes;
pub mod tokens;

pub use batches as batch_entity;
pub use draw_sessions as draw_session_entity;
pub use draw_sessions::{DrawMode, DrawStatus};
pub use draw_spins as draw_spin_entity;
pub use prizes as prize_entity;
pub use tokens as token_entity;
pub use tokens::TokenKind;
