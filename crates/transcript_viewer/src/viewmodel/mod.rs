//! The conversation-to-display-state derivation engine.
//!
//! Data flow: the source supplies raw messages -> [`filter`] drops
//! tool-echo noise -> [`engine`] folds the rest into [`group::DisplayGroup`]s,
//! delegating text pagination to [`paginate`] and tool-block projection to
//! [`tool`] -> the engine's aggregator derives the working indicator from
//! the streaming flag and the groups' pending flags.

pub mod engine;
pub mod events;
pub mod filter;
pub mod group;
pub mod paginate;
pub mod tool;

pub use engine::ConversationViewModel;
pub use group::{BlockView, DisplayGroup, GroupEvent};
