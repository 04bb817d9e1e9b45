pub mod event;
pub mod gameloop;
pub mod level;
pub mod resolver;
pub mod scoring;
pub mod trace;
pub mod world;
