pub mod database;

pub use database::VoteDatabase;
