mod helpers;

use helpers::*;
use classbank_backend::error::StoreError;
use classbank_backend::models::*;
use chrono::Utc;
use rust_decimal::Decimal;

// ============================================================================
// Profile Repository Tests
// ============================================================================

#[tokio::test]
async fn test_profile_create_and_get() {
    let app = TestApp::new();

    let created = create_test_profile(&app, "amy", "Ms. Rivera", 3).await;

    let found = app
        .state
        .profiles
        .get("amy")
        .await
        .expect("Failed to get profile");

    assert_profiles_equal(&created, &found);
    assert_eq!(found.checking_account.balance_total, Decimal::ZERO);
    assert_eq!(found.savings_account.balance_total, Decimal::ZERO);
}

#[tokio::test]
async fn test_profile_duplicate_create_rejected() {
    let app = TestApp::new();

    create_test_profile(&app, "amy", "Ms. Rivera", 3).await;

    let duplicate = StudentProfile::new("amy", "Mr. Okafor", 5);
    let result = app.state.profiles.create(&duplicate).await;

    assert!(matches!(result, Err(StoreError::Duplicate(_))));

    // The original profile is untouched
    let found = app
        .state
        .profiles
        .get("amy")
        .await
        .expect("Failed to get profile");
    assert_eq!(found.teacher, "Ms. Rivera");
}

#[tokio::test]
async fn test_profile_get_unknown_member() {
    let app = TestApp::new();

    let missing = app.state.profiles.try_get("nobody").await;
    assert!(matches!(missing, Ok(None)));

    let err = app.state.profiles.get("nobody").await;
    assert!(matches!(err, Err(StoreError::NotFound(_))));
}

#[tokio::test]
async fn test_profile_list_all_sorted() {
    let app = TestApp::new();

    create_test_profile(&app, "zoe", "Ms. Rivera", 3).await;
    create_test_profile(&app, "amy", "Ms. Rivera", 3).await;
    create_test_profile(&app, "ben", "Mr. Okafor", 1).await;

    let all = app
        .state
        .profiles
        .list_all()
        .await
        .expect("Failed to list profiles");

    let names: Vec<&str> = all.iter().map(|p| p.member_name.as_str()).collect();
    assert_eq!(names, vec!["amy", "ben", "zoe"]);
}

#[tokio::test]
async fn test_students_of_filters_by_teacher() {
    let app = TestApp::new();

    create_test_profile(&app, "amy", "Ms. Rivera", 3).await;
    create_test_profile(&app, "ben", "Ms. Rivera", 3).await;
    create_test_profile(&app, "cal", "Mr. Okafor", 1).await;

    let roster = app
        .state
        .profiles
        .students_of("Ms. Rivera")
        .await
        .expect("Failed to list roster");

    assert_eq!(roster.len(), 2);
    assert!(roster.iter().all(|p| p.teacher == "Ms. Rivera"));
}

#[tokio::test]
async fn test_profile_update_applies_mutation() {
    let app = TestApp::new();

    create_test_profile(&app, "amy", "Ms. Rivera", 3).await;

    let now = Utc::now();
    let updated = app
        .state
        .profiles
        .update("amy", |profile| {
            profile.checking_account.append_transaction(
                Transaction::once(Decimal::from(100), "Deposit", "Deposit", now),
                now,
            );
        })
        .await
        .expect("Failed to update profile");

    assert_eq!(updated.checking_account.transactions.len(), 1);

    let reread = app
        .state
        .profiles
        .get("amy")
        .await
        .expect("Failed to get profile");
    assert_eq!(reread.checking_account.transactions.len(), 1);
}

#[tokio::test]
async fn test_concurrent_updates_both_land() {
    let app = TestApp::new();

    create_test_profile(&app, "amy", "Ms. Rivera", 3).await;

    let profiles_a = app.state.profiles.clone();
    let profiles_b = app.state.profiles.clone();
    let now = Utc::now();

    // Two writers race on the same document; retries must preserve both
    let (left, right) = tokio::join!(
        tokio::spawn(async move {
            profiles_a
                .update("amy", move |profile| {
                    profile.checking_account.append_transaction(
                        Transaction::once(Decimal::from(10), "First", "Test", now),
                        now,
                    );
                })
                .await
        }),
        tokio::spawn(async move {
            profiles_b
                .update("amy", move |profile| {
                    profile.checking_account.append_transaction(
                        Transaction::once(Decimal::from(20), "Second", "Test", now),
                        now,
                    );
                })
                .await
        }),
    );

    left.expect("First writer panicked")
        .expect("First update failed");
    right
        .expect("Second writer panicked")
        .expect("Second update failed");

    let final_doc = app
        .state
        .profiles
        .get("amy")
        .await
        .expect("Failed to get profile");
    assert_eq!(final_doc.checking_account.transactions.len(), 2);
    assert_eq!(final_doc.checking_account.computed_balance(), Decimal::from(30));
}

// ============================================================================
// Shadow Profile Tests
// ============================================================================

#[tokio::test]
async fn test_shadow_profile_independent_of_live() {
    let app = TestApp::new();

    let live = create_test_profile(&app, "amy", "Ms. Rivera", 3).await;

    app.state
        .profiles
        .create_shadow(&live.as_shadow())
        .await
        .expect("Failed to create shadow");

    let now = Utc::now();
    app.state
        .profiles
        .update_shadow("amy", move |profile| {
            profile.checking_account.append_transaction(
                Transaction::once(Decimal::from(-5), "Simulated", "Test", now),
                now,
            );
        })
        .await
        .expect("Failed to update shadow");

    // The live profile never sees simulated movements
    let live_reread = app
        .state
        .profiles
        .get("amy")
        .await
        .expect("Failed to get profile");
    assert!(live_reread.checking_account.transactions.is_empty());

    let shadow = app
        .state
        .profiles
        .try_get_shadow("amy")
        .await
        .expect("Failed to get shadow")
        .expect("Shadow should exist");
    assert_eq!(shadow.checking_account.transactions.len(), 1);
}

// ============================================================================
// Thread Repository Tests
// ============================================================================

#[tokio::test]
async fn test_thread_created_on_first_append() {
    let app = TestApp::new();

    let message = ChatMessage::new("amy", "hi ben!", Utc::now());
    let participants = vec!["amy".to_string(), "ben".to_string()];

    let thread = app
        .state
        .threads
        .append_message("amy-ben", ThreadKind::Private, &participants, &message)
        .await
        .expect("Failed to append message");

    assert_eq!(thread.thread_id, "amy-ben");
    assert_eq!(thread.thread_type, ThreadKind::Private);
    assert_eq!(thread.messages.len(), 1);
    assert_eq!(thread.participants, participants);
    assert!(thread.last_message_at.is_some());
}

#[tokio::test]
async fn test_thread_appends_preserve_order() {
    let app = TestApp::new();

    let participants = vec!["amy".to_string(), "ben".to_string()];
    for text in ["first", "second", "third"] {
        let message = ChatMessage::new("amy", text, Utc::now());
        app.state
            .threads
            .append_message("amy-ben", ThreadKind::Private, &participants, &message)
            .await
            .expect("Failed to append message");
    }

    let thread = app
        .state
        .threads
        .try_get("amy-ben")
        .await
        .expect("Failed to get thread")
        .expect("Thread should exist");

    let contents: Vec<&str> = thread
        .messages
        .iter()
        .map(|m| m.message_content.as_str())
        .collect();
    assert_eq!(contents, vec!["first", "second", "third"]);
}

#[tokio::test]
async fn test_thread_participants_grow_without_duplicates() {
    let app = TestApp::new();

    let message = ChatMessage::new("amy", "hello class", Utc::now());
    app.state
        .threads
        .append_message(
            "class-Ms. Rivera",
            ThreadKind::Class,
            &["amy".to_string(), "Ms. Rivera".to_string()],
            &message,
        )
        .await
        .expect("Failed to append message");

    // A second sender joins the participant list exactly once
    let reply = ChatMessage::new("ben", "hi amy", Utc::now());
    for _ in 0..2 {
        app.state
            .threads
            .append_message(
                "class-Ms. Rivera",
                ThreadKind::Class,
                &["ben".to_string(), "Ms. Rivera".to_string()],
                &reply,
            )
            .await
            .expect("Failed to append message");
    }

    let thread = app
        .state
        .threads
        .try_get("class-Ms. Rivera")
        .await
        .expect("Failed to get thread")
        .expect("Thread should exist");

    let ben_count = thread
        .participants
        .iter()
        .filter(|p| p.as_str() == "ben")
        .count();
    assert_eq!(ben_count, 1);
    assert_eq!(thread.messages.len(), 3);
}
