pub mod matches;
pub mod recommendations;
pub mod reminders;
pub mod teams;

pub use recommendations::{Recommender, RecommenderSettings};
