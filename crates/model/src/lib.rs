#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod ballot;
pub mod export;
pub mod mention;
pub mod page;
pub mod poll;
pub mod render;
pub mod tally;
pub mod token;
pub mod weight;

pub use poll::{GuildSettings, Poll, RoleMeta, Settings, Vote};
pub use tally::Tally;
