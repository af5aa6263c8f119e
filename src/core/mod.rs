pub mod congress;
pub mod db;
pub mod distribution;
pub mod player;
pub mod round;
pub mod settings;
