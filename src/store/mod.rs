//! Persistence for the two leaf stores. Neither owns business rules beyond
//! the row-level guards that keep pairings symmetric and exclusive.

mod inbox;
mod profiles;

pub use inbox::{InboxStore, NewInboxMessage};
pub use profiles::ProfileStore;
