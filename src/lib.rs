pub mod game;
pub mod sim;
