//! Vote transaction properties: atomicity, ledger uniqueness, rejection idempotence
//! Run with: cargo test --test vote_transaction_tests

use std::sync::Arc;
use tokio::sync::Barrier;
use votetally::{
    CountKey, LedgerInsert, LedgerKey, NewPoll, Poll, PollId, RejectReason, VoteDatabase,
    VoteOutcome, VoterId,
};

async fn pets_poll(db: &VoteDatabase) -> Poll {
    db.polls()
        .create_poll(NewPoll::new("Pets?", vec!["Cats".into(), "Dogs".into()]))
        .await
        .unwrap()
}

async fn total_votes(db: &VoteDatabase, poll_id: &PollId) -> u64 {
    db.results().get_results(poll_id).await.unwrap().unwrap().total_votes
}

#[tokio::test]
async fn test_new_poll_has_zeroed_results() {
    let db = VoteDatabase::in_memory();
    let poll = db
        .polls()
        .create_poll(NewPoll::new("Lunch?", vec!["Soup".into(), "Salad".into(), "Pasta".into()]))
        .await
        .unwrap();

    let results = db.results().get_results(&poll.id).await.unwrap().unwrap();
    assert_eq!(results.results.len(), 3);
    assert!(results.results.iter().all(|entry| entry.votes == 0));
    assert_eq!(results.total_votes, 0);
}

#[tokio::test]
async fn test_cats_and_dogs_scenario() {
    let db = VoteDatabase::in_memory();
    let poll = pets_poll(&db).await;
    let votes = db.coordinator();
    let (v1, v2) = (VoterId::from("v1"), VoterId::from("v2"));

    assert_eq!(votes.cast_vote(&poll.id, "Dogs", &v1).await, VoteOutcome::Accepted);
    let results = db.results().get_results(&poll.id).await.unwrap().unwrap();
    assert_eq!((results.votes_for("Cats"), results.votes_for("Dogs")), (Some(0), Some(1)));
    assert_eq!(results.total_votes, 1);

    assert_eq!(
        votes.cast_vote(&poll.id, "Cats", &v1).await,
        VoteOutcome::Rejected(RejectReason::Conflict)
    );
    assert_eq!(total_votes(&db, &poll.id).await, 1);

    assert_eq!(
        votes.cast_vote(&poll.id, "Fish", &v2).await,
        VoteOutcome::Rejected(RejectReason::InvalidInput)
    );
    assert_eq!(votes.cast_vote(&poll.id, "Cats", &v2).await, VoteOutcome::Accepted);

    let results = db.results().get_results(&poll.id).await.unwrap().unwrap();
    assert_eq!((results.votes_for("Cats"), results.votes_for("Dogs")), (Some(1), Some(1)));
    assert_eq!(results.total_votes, 2);
}

#[tokio::test]
async fn test_vote_then_duplicate_then_other_voter() {
    let db = VoteDatabase::in_memory();
    let poll = pets_poll(&db).await;
    let votes = db.coordinator();

    assert_eq!(
        votes.cast_vote(&poll.id, "Cats", &VoterId::from("v1")).await,
        VoteOutcome::Accepted
    );
    assert_eq!(
        votes.cast_vote(&poll.id, "Dogs", &VoterId::from("v1")).await,
        VoteOutcome::Rejected(RejectReason::Conflict)
    );
    assert_eq!(
        votes.cast_vote(&poll.id, "Dogs", &VoterId::from("v2")).await,
        VoteOutcome::Accepted
    );

    let results = db.results().get_results(&poll.id).await.unwrap().unwrap();
    assert_eq!(results.votes_for("Cats"), Some(1));
    assert_eq!(results.votes_for("Dogs"), Some(1));
    assert_eq!(results.total_votes, 2);
}

#[tokio::test]
async fn test_rejections_change_nothing() {
    let db = VoteDatabase::in_memory();
    let poll = pets_poll(&db).await;
    let votes = db.coordinator();
    let voter = VoterId::from("v1");

    assert_eq!(
        votes.cast_vote(&poll.id, "Fish", &voter).await,
        VoteOutcome::Rejected(RejectReason::InvalidInput)
    );
    assert_eq!(
        votes.cast_vote(&PollId::from("missing"), "Cats", &voter).await,
        VoteOutcome::Rejected(RejectReason::NotFound)
    );
    // Option labels match exactly
    assert_eq!(
        votes.cast_vote(&poll.id, "cats", &voter).await,
        VoteOutcome::Rejected(RejectReason::InvalidInput)
    );

    assert_eq!(total_votes(&db, &poll.id).await, 0);
    assert_eq!(db.ledger().voters_in_poll(&poll.id).unwrap(), 0);

    // The voter is still free to vote after the rejected attempts
    assert_eq!(votes.cast_vote(&poll.id, "Dogs", &voter).await, VoteOutcome::Accepted);
}

#[tokio::test]
async fn test_repeated_duplicate_is_stable() {
    let db = VoteDatabase::in_memory();
    let poll = pets_poll(&db).await;
    let voter = VoterId::from("v1");

    db.coordinator().cast_vote(&poll.id, "Cats", &voter).await;
    for _ in 0..5 {
        assert_eq!(
            db.coordinator().cast_vote(&poll.id, "Cats", &voter).await,
            VoteOutcome::Rejected(RejectReason::Conflict)
        );
    }
    assert_eq!(total_votes(&db, &poll.id).await, 1);
}

#[tokio::test]
async fn test_same_voter_in_two_polls() {
    let db = VoteDatabase::in_memory();
    let first = pets_poll(&db).await;
    let second = pets_poll(&db).await;
    let voter = VoterId::from("v1");

    assert!(db.coordinator().cast_vote(&first.id, "Cats", &voter).await.is_accepted());
    assert!(db.coordinator().cast_vote(&second.id, "Cats", &voter).await.is_accepted());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_identical_votes_accept_exactly_one() {
    let db = VoteDatabase::in_memory();
    let poll = pets_poll(&db).await;
    let num_tasks = 32;
    let barrier = Arc::new(Barrier::new(num_tasks));

    let mut handles = vec![];
    for _ in 0..num_tasks {
        let db = db.clone();
        let poll_id = poll.id.clone();
        let barrier = Arc::clone(&barrier);
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            db.coordinator().cast_vote(&poll_id, "Cats", &VoterId::from("racer")).await
        }));
    }

    let mut accepted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            VoteOutcome::Accepted => accepted += 1,
            VoteOutcome::Rejected(reason) => assert_eq!(reason, RejectReason::Conflict),
        }
    }

    assert_eq!(accepted, 1);
    let results = db.results().get_results(&poll.id).await.unwrap().unwrap();
    assert_eq!(results.votes_for("Cats"), Some(1));
    assert_eq!(results.total_votes, 1);
    assert_eq!(db.ledger().voters_in_poll(&poll.id).unwrap(), 1);
    assert_eq!(db.storage().pending_voters().unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_distinct_voters_all_count() {
    let db = VoteDatabase::in_memory();
    let poll = pets_poll(&db).await;
    let num_tasks = 64;
    let barrier = Arc::new(Barrier::new(num_tasks));

    let mut handles = vec![];
    for i in 0..num_tasks {
        let db = db.clone();
        let poll_id = poll.id.clone();
        let barrier = Arc::clone(&barrier);
        handles.push(tokio::spawn(async move {
            let option = if i % 3 == 0 { "Cats" } else { "Dogs" };
            barrier.wait().await;
            db.coordinator()
                .cast_vote(&poll_id, option, &VoterId::new(format!("voter_{i}")))
                .await
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap(), VoteOutcome::Accepted);
    }

    let results = db.results().get_results(&poll.id).await.unwrap().unwrap();
    assert_eq!(results.votes_for("Cats"), Some(22));
    assert_eq!(results.votes_for("Dogs"), Some(42));
    // Every counted vote has exactly one ledger row
    assert_eq!(results.total_votes, db.ledger().voters_in_poll(&poll.id).unwrap() as u64);
}

#[tokio::test]
async fn test_dropped_transaction_leaves_no_trace() {
    let db = VoteDatabase::in_memory();
    let poll = pets_poll(&db).await;
    let voter = VoterId::from("v1");

    {
        let mut txn = db.begin();
        db.counter()
            .increment(&mut txn, &CountKey::new(poll.id.clone(), "Cats"))
            .unwrap();
        let key = LedgerKey::new(poll.id.clone(), voter.clone());
        assert_eq!(db.ledger().record_vote(&mut txn, &key).unwrap(), LedgerInsert::Ok);
        // Dropped without commit, as when a request future is cancelled
    }

    assert_eq!(total_votes(&db, &poll.id).await, 0);
    assert_eq!(db.storage().pending_voters().unwrap(), 0);
    assert!(db.coordinator().cast_vote(&poll.id, "Cats", &voter).await.is_accepted());
}
