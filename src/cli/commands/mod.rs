pub mod config;
pub mod credits;
pub mod estimate;
pub mod generate;
pub mod history;
pub mod providers;
