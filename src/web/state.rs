use crate::facade::VoteDatabase;

#[derive(Clone)]
pub struct AppState {
    pub db: VoteDatabase,
}

impl AppState {
    pub fn new(db: VoteDatabase) -> Self {
        Self { db }
    }
}
