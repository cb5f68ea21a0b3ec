//! Integration tests for WAL persistence and crash recovery

use std::fs::OpenOptions;
use std::io::Write;
use tempfile::TempDir;
use votetally::{
    DurabilityMode, NewPoll, RejectReason, StorageConfig, VoteDatabase, VoteOutcome, VoterId,
};

fn open(dir: &TempDir) -> VoteDatabase {
    VoteDatabase::open(StorageConfig::durable(dir.path())).unwrap()
}

#[tokio::test]
async fn test_votes_survive_reopen() {
    let temp_dir = TempDir::new().unwrap();

    let poll_id = {
        let db = open(&temp_dir);
        assert!(db.is_durable().await);
        let poll = db
            .polls()
            .create_poll(NewPoll::new("Pets?", vec!["Cats".into(), "Dogs".into()]))
            .await
            .unwrap();
        db.coordinator().cast_vote(&poll.id, "Cats", &VoterId::from("v1")).await;
        db.coordinator().cast_vote(&poll.id, "Dogs", &VoterId::from("v2")).await;
        poll.id
    };

    assert!(temp_dir.path().join("votetally.wal").exists());

    let db = open(&temp_dir);
    let results = db.results().get_results(&poll_id).await.unwrap().unwrap();
    assert_eq!(results.votes_for("Cats"), Some(1));
    assert_eq!(results.votes_for("Dogs"), Some(1));

    // The ledger came back too
    assert_eq!(
        db.coordinator().cast_vote(&poll_id, "Dogs", &VoterId::from("v1")).await,
        VoteOutcome::Rejected(RejectReason::Conflict)
    );
}

#[tokio::test]
async fn test_automatic_checkpoint_then_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let config = StorageConfig::durable(temp_dir.path()).checkpoint_threshold(3);

    let poll_id = {
        let db = VoteDatabase::open(config.clone()).unwrap();
        let poll = db
            .polls()
            .create_poll(NewPoll::new("Pets?", vec!["Cats".into(), "Dogs".into()]))
            .await
            .unwrap();
        for i in 0..5 {
            let outcome = db
                .coordinator()
                .cast_vote(&poll.id, "Cats", &VoterId::new(format!("v{i}")))
                .await;
            assert!(outcome.is_accepted());
        }
        poll.id
    };

    assert!(temp_dir.path().join("votetally.snapshot").exists());

    let db = VoteDatabase::open(config).unwrap();
    let results = db.results().get_results(&poll_id).await.unwrap().unwrap();
    assert_eq!(results.votes_for("Cats"), Some(5));
    assert_eq!(db.ledger().voters_in_poll(&poll_id).unwrap(), 5);
}

#[tokio::test]
async fn test_torn_wal_tail_is_ignored_on_reopen() {
    let temp_dir = TempDir::new().unwrap();

    let poll_id = {
        let db = open(&temp_dir);
        let poll = db
            .polls()
            .create_poll(NewPoll::new("Pets?", vec!["Cats".into(), "Dogs".into()]))
            .await
            .unwrap();
        db.coordinator().cast_vote(&poll.id, "Cats", &VoterId::from("v1")).await;
        poll.id
    };

    // Simulate a crash part way through the next record
    let mut wal = OpenOptions::new()
        .append(true)
        .open(temp_dir.path().join("votetally.wal"))
        .unwrap();
    wal.write_all(&200u32.to_le_bytes()).unwrap();
    wal.write_all(b"partial").unwrap();
    drop(wal);

    {
        let db = open(&temp_dir);
        let results = db.results().get_results(&poll_id).await.unwrap().unwrap();
        assert_eq!(results.total_votes, 1);
        assert!(db.coordinator().cast_vote(&poll_id, "Dogs", &VoterId::from("v2")).await.is_accepted());
    }

    let db = open(&temp_dir);
    assert_eq!(db.results().get_results(&poll_id).await.unwrap().unwrap().total_votes, 2);
}

#[tokio::test]
async fn test_none_durability_keeps_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let config = StorageConfig::durable(temp_dir.path()).durability(DurabilityMode::None);

    {
        let db = VoteDatabase::open(config.clone()).unwrap();
        assert!(!db.is_durable().await);
        db.polls()
            .create_poll(NewPoll::new("Pets?", vec!["Cats".into(), "Dogs".into()]))
            .await
            .unwrap();
    }

    let db = VoteDatabase::open(config).unwrap();
    assert_eq!(db.polls().poll_count().unwrap(), 0);
    assert!(!temp_dir.path().join("votetally.wal").exists());
}
