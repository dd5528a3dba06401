//! Data models describing a crystal net: the unit cell and the net itself.

pub mod cell;
pub mod net;
