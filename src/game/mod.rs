pub mod config;
pub mod display;
pub mod geometry;
pub mod items;
pub mod mapgen;
pub mod recipes;
pub mod world;
