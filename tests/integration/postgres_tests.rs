//! Postgres backend tests
//!
//! These need a disposable database: set DATABASE_URL and run with
//! `cargo test --test postgres_tests -- --ignored`. Every test works on
//! fresh ids so runs can share one database.

use std::sync::Arc;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use circulation_server::{
    clock::{Clock, ManualClock},
    config::CirculationConfig,
    error::AppError,
    models::{
        borrower::Eligibility,
        loan::{LoanFilter, LoanStatus, NewLoan},
    },
    repository::Repository,
    services::Services,
};

async fn repository() -> Repository {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .expect("Failed to connect to database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");
    Repository::postgres(pool)
}

async fn borrower(repository: &Repository) -> Uuid {
    let id = Uuid::new_v4();
    repository
        .borrowers
        .create(id, Eligibility::Active, Utc::now())
        .await
        .unwrap();
    id
}

fn filter(status: Option<LoanStatus>, borrower_id: Uuid, now: DateTime<Utc>) -> LoanFilter {
    LoanFilter {
        status,
        borrower_id: Some(borrower_id),
        now,
        offset: 0,
        limit: 10,
    }
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_copy_counters_stay_within_bounds() {
    let repository = repository().await;
    let item = Uuid::new_v4();
    repository.items.create(item, 2, Utc::now()).await.unwrap();

    let err = repository.items.release(item).await.unwrap_err();
    assert!(matches!(err, AppError::ConsistencyViolation(_)));

    repository.items.reserve(item).await.unwrap();
    repository.items.reserve(item).await.unwrap();
    let err = repository.items.reserve(item).await.unwrap_err();
    assert!(matches!(err, AppError::InsufficientCopies(ref ids) if ids == &vec![item]));
    assert_eq!(repository.items.get(item).await.unwrap().available_copies, 0);

    // Growing the catalog keeps the two copies on loan
    let edited = repository.items.set_total_copies(item, 3, Utc::now()).await.unwrap();
    assert_eq!(edited.available_copies, 1);

    let err = repository.items.reserve(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_basket_upsert_appends_and_restarts_after_expiry() {
    let repository = repository().await;
    let owner = borrower(&repository).await;
    let ttl = Duration::hours(24);
    let now = Utc::now();
    let (book, dvd, map) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    let basket = repository.baskets.add_item(owner, book, now, ttl).await.unwrap();
    assert_eq!(basket.item_ids, vec![book]);

    let later = now + Duration::hours(1);
    let basket = repository.baskets.add_item(owner, dvd, later, ttl).await.unwrap();
    assert_eq!(basket.item_ids, vec![book, dvd]);

    let err = repository.baskets.add_item(owner, book, later, ttl).await.unwrap_err();
    assert!(matches!(err, AppError::AlreadyPresent(id) if id == book));

    // An expired basket is replaced, even by an item it already held
    let expired = now + Duration::hours(25);
    let basket = repository.baskets.add_item(owner, book, expired, ttl).await.unwrap();
    assert_eq!(basket.item_ids, vec![book]);

    let basket = repository.baskets.add_item(owner, map, expired, ttl).await.unwrap();
    assert_eq!(basket.item_ids, vec![book, map]);
    let basket = repository.baskets.remove_item(owner, book, expired, ttl).await.unwrap();
    assert_eq!(basket.item_ids, vec![map]);
    let err = repository.baskets.remove_item(owner, book, expired, ttl).await.unwrap_err();
    assert!(matches!(err, AppError::NotPresent(id) if id == book));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_list_filter_splits_borrowed_from_overdue() {
    let repository = repository().await;
    let owner = borrower(&repository).await;
    let now = Utc::now();

    let mut ids = Vec::new();
    for (borrowed_days_ago, returned) in [(1, false), (10, false), (12, true)] {
        let borrow_date = now - Duration::days(borrowed_days_ago);
        let loan = repository
            .loans
            .create(&NewLoan {
                borrower_id: owner,
                item_ids: vec![Uuid::new_v4()],
                borrow_date,
                due_date: borrow_date + Duration::days(7),
            })
            .await
            .unwrap();
        if returned {
            repository
                .loans
                .mark_returned(loan.id, now, 25000)
                .await
                .unwrap()
                .unwrap();
        }
        ids.push(loan.id);
    }

    let (loans, total) = repository.loans.list(&filter(None, owner, now)).await.unwrap();
    assert_eq!(total, 3);
    // Newest first
    assert_eq!(loans.iter().map(|l| l.id).collect::<Vec<_>>(), ids);

    for (status, expected) in [
        (LoanStatus::Borrowed, ids[0]),
        (LoanStatus::Overdue, ids[1]),
        (LoanStatus::Returned, ids[2]),
    ] {
        let (loans, total) = repository
            .loans
            .list(&filter(Some(status), owner, now))
            .await
            .unwrap();
        assert_eq!(total, 1, "{} loans", status);
        assert_eq!(loans[0].id, expected);
    }

    let overdue = repository.loans.overdue_for_borrower(owner, now).await.unwrap();
    assert_eq!(overdue.len(), 1);
    assert_eq!(repository.loans.count_unreturned(owner).await.unwrap(), 2);

    let page = LoanFilter {
        offset: 2,
        limit: 2,
        ..filter(None, owner, now)
    };
    let (loans, total) = repository.loans.list(&page).await.unwrap();
    assert_eq!(total, 3);
    assert_eq!(loans.len(), 1);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_loan_status_writes_are_guarded() {
    let repository = repository().await;
    let owner = borrower(&repository).await;
    let now = Utc::now();
    let loan = repository
        .loans
        .create(&NewLoan {
            borrower_id: owner,
            item_ids: vec![Uuid::new_v4()],
            borrow_date: now - Duration::days(9),
            due_date: now - Duration::days(2),
        })
        .await
        .unwrap();

    let returned = repository.loans.mark_returned(loan.id, now, 10000).await.unwrap();
    assert_eq!(returned.unwrap().status, LoanStatus::Returned);
    assert!(repository.loans.mark_returned(loan.id, now, 99999).await.unwrap().is_none());

    let restored = repository.loans.undo_return(loan.id, 0).await.unwrap().unwrap();
    assert_eq!(restored.status, LoanStatus::Borrowed);
    assert_eq!(restored.return_date, None);
    assert_eq!(restored.fine_amount, 0);
    assert!(repository.loans.mark_borrowed(loan.id).await.unwrap().is_none());

    let err = repository.loans.mark_borrowed(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_checkout_and_return_over_postgres() {
    let repository = repository().await;
    // Postgres keeps microseconds; whole seconds keep the fine arithmetic exact
    let clock = ManualClock::new(Utc::now().trunc_subsecs(0));
    let services = Services::new(
        repository.clone(),
        Arc::new(clock.clone()),
        &CirculationConfig::default(),
    );
    let owner = borrower(&repository).await;
    let item = Uuid::new_v4();
    repository.items.create(item, 1, clock.now()).await.unwrap();

    services.baskets.add(owner, item).await.unwrap();
    let loan = services.checkout.checkout(owner).await.unwrap();
    assert_eq!(repository.items.get(item).await.unwrap().available_copies, 0);
    assert!(services.baskets.view(owner).await.unwrap().items.is_empty());

    clock.advance(Duration::days(9));
    let returned = services.loans.return_loan(loan.id).await.unwrap();
    assert_eq!(returned.fine_amount, 10000);
    assert_eq!(repository.items.get(item).await.unwrap().available_copies, 1);
}
