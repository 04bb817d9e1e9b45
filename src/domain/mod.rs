pub mod action;
pub mod collectable;
pub mod door;
pub mod pill;
pub mod runner;
pub mod tile;
