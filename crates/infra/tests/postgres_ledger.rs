//! Ledger properties against a real Postgres.
//!
//! Each test skips itself when `DATABASE_URL` is unset. Tests create their own
//! pickup points, so they can share one database and run in parallel.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;

use pvz_core::PickupPointId;
use pvz_infra::config::DatabaseConfig;
use pvz_infra::{
    LedgerError, ListFilter, Page, PickupPointRegistry, PostgresPickupPointRegistry,
    PostgresReceptionLedger, ReceptionLedger, db,
};
use pvz_pickup_points::City;
use pvz_receptions::{LedgerViolation, ProductType, ReceptionStatus};

struct Fixture {
    pool: PgPool,
    ledger: Arc<PostgresReceptionLedger>,
    registry: PostgresPickupPointRegistry,
}

async fn fixture(lock_timeout: Duration) -> Option<Fixture> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping Postgres test");
        return None;
    };
    let config = DatabaseConfig {
        url,
        max_connections: 40,
        acquire_timeout: Duration::from_secs(10),
    };
    let pool = db::connect(&config).await.expect("connect to DATABASE_URL");
    db::migrate(&pool).await.expect("run migrations");

    Some(Fixture {
        ledger: Arc::new(PostgresReceptionLedger::new(pool.clone(), lock_timeout)),
        registry: PostgresPickupPointRegistry::new(pool.clone()),
        pool,
    })
}

impl Fixture {
    async fn pickup_point(&self) -> PickupPointId {
        self.registry.create_pickup_point(City::Moscow).await.unwrap().id
    }

    async fn in_progress_count(&self, pvz: PickupPointId) -> i64 {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM receptions WHERE pickup_point_id = $1 AND status = 'in_progress'",
        )
        .bind(pvz.as_uuid())
        .fetch_one(&self.pool)
        .await
        .unwrap()
    }

    async fn product_count(&self, pvz: PickupPointId) -> i64 {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM products p
            JOIN receptions r ON r.id = p.reception_id
            WHERE r.pickup_point_id = $1
            "#,
        )
        .bind(pvz.as_uuid())
        .fetch_one(&self.pool)
        .await
        .unwrap()
    }
}

fn violation<T: core::fmt::Debug>(res: Result<T, LedgerError>) -> LedgerViolation {
    match res {
        Err(LedgerError::Rule(v)) => v,
        other => panic!("expected a ledger violation, got {other:?}"),
    }
}

#[tokio::test]
async fn moscow_reception_with_fifty_products() {
    let Some(fx) = fixture(Duration::from_secs(2)).await else { return };
    let pvz = fx.pickup_point().await;

    let opened = fx.ledger.open_reception(pvz).await.unwrap();
    for _ in 0..50 {
        fx.ledger.append_product(pvz, ProductType::Electronics).await.unwrap();
    }
    let closed = fx.ledger.close_last_open_reception(pvz).await.unwrap();

    assert_eq!(closed.id, opened.id);
    assert_eq!(closed.status, ReceptionStatus::Closed);
    assert!(closed.closed_at.is_some());
    assert_eq!(fx.product_count(pvz).await, 50);
    assert_eq!(fx.in_progress_count(pvz).await, 0);

    let start = opened.date_time - chrono::Duration::seconds(1);
    let listing = fx
        .registry
        .list_pickup_points(ListFilter::new(Some(start), None).unwrap(), Page::new(None, Some(30)).unwrap())
        .await
        .unwrap();
    // Other tests may share the database; page through until ours shows up.
    let mut summary = listing.into_iter().find(|s| s.pickup_point.id == pvz);
    let mut page = 2;
    while summary.is_none() {
        let next = fx
            .registry
            .list_pickup_points(
                ListFilter::new(Some(start), None).unwrap(),
                Page::new(Some(page), Some(30)).unwrap(),
            )
            .await
            .unwrap();
        assert!(!next.is_empty(), "pickup point missing from listing");
        summary = next.into_iter().find(|s| s.pickup_point.id == pvz);
        page += 1;
    }
    let summary = summary.unwrap();
    assert_eq!(summary.receptions.len(), 1);
    assert_eq!(summary.receptions[0].products.len(), 50);
}

#[tokio::test]
async fn open_unknown_pickup_point() {
    let Some(fx) = fixture(Duration::from_secs(2)).await else { return };
    let pvz = PickupPointId::new();

    let err = violation(fx.ledger.open_reception(pvz).await);
    assert_eq!(err, LedgerViolation::PickupPointNotFound { pickup_point_id: pvz });
}

#[tokio::test]
async fn append_without_reception_creates_no_row() {
    let Some(fx) = fixture(Duration::from_secs(2)).await else { return };
    let pvz = fx.pickup_point().await;

    let err = violation(fx.ledger.append_product(pvz, ProductType::Clothes).await);
    assert_eq!(err, LedgerViolation::NoActiveReception { pickup_point_id: pvz });
    assert_eq!(fx.product_count(pvz).await, 0);
}

#[tokio::test]
async fn removals_are_lifo() {
    let Some(fx) = fixture(Duration::from_secs(2)).await else { return };
    let pvz = fx.pickup_point().await;
    fx.ledger.open_reception(pvz).await.unwrap();

    let mut added = Vec::new();
    for i in 0..5 {
        let t = ProductType::ALL[i % ProductType::ALL.len()];
        added.push(fx.ledger.append_product(pvz, t).await.unwrap());
    }
    assert_eq!(
        fx.ledger.last_product(pvz).await.unwrap().map(|p| p.id),
        added.last().map(|p| p.id)
    );

    while let Some(expected) = added.pop() {
        assert_eq!(fx.ledger.remove_last_product(pvz).await.unwrap().id, expected.id);
    }
    let err = violation(fx.ledger.remove_last_product(pvz).await);
    assert_eq!(err, LedgerViolation::NoProductToDelete { pickup_point_id: pvz });
}

#[tokio::test]
async fn close_twice_and_append_after_close() {
    let Some(fx) = fixture(Duration::from_secs(2)).await else { return };
    let pvz = fx.pickup_point().await;
    fx.ledger.open_reception(pvz).await.unwrap();
    fx.ledger.close_last_open_reception(pvz).await.unwrap();

    let err = violation(fx.ledger.close_last_open_reception(pvz).await);
    assert_eq!(err, LedgerViolation::NoOpenReception { pickup_point_id: pvz });

    let err = violation(fx.ledger.append_product(pvz, ProductType::Shoes).await);
    assert_eq!(err, LedgerViolation::NoActiveReception { pickup_point_id: pvz });
    assert!(fx.ledger.active_reception(pvz).await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_opens_yield_exactly_one() {
    let Some(fx) = fixture(Duration::from_secs(5)).await else { return };
    let pvz = fx.pickup_point().await;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let ledger = fx.ledger.clone();
            tokio::spawn(async move { ledger.open_reception(pvz).await })
        })
        .collect();

    let mut opened = 0;
    for h in handles {
        match h.await.unwrap() {
            Ok(_) => opened += 1,
            Err(LedgerError::Rule(LedgerViolation::ReceptionAlreadyOpen { .. })) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(opened, 1);
    assert_eq!(fx.in_progress_count(pvz).await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_closes_yield_exactly_one() {
    let Some(fx) = fixture(Duration::from_secs(5)).await else { return };
    let pvz = fx.pickup_point().await;
    fx.ledger.open_reception(pvz).await.unwrap();

    let (a, b) = tokio::join!(
        fx.ledger.close_last_open_reception(pvz),
        fx.ledger.close_last_open_reception(pvz)
    );

    let closed = [&a, &b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(closed, 1);
    for r in [a, b] {
        if let Err(e) = r {
            assert_eq!(violation::<()>(Err(e)), LedgerViolation::NoOpenReception { pickup_point_id: pvz });
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_removes_of_single_product() {
    let Some(fx) = fixture(Duration::from_secs(5)).await else { return };
    let pvz = fx.pickup_point().await;
    fx.ledger.open_reception(pvz).await.unwrap();
    fx.ledger.append_product(pvz, ProductType::Electronics).await.unwrap();

    let (a, b) = tokio::join!(
        {
            let ledger = fx.ledger.clone();
            tokio::spawn(async move { ledger.remove_last_product(pvz).await })
        },
        {
            let ledger = fx.ledger.clone();
            tokio::spawn(async move { ledger.remove_last_product(pvz).await })
        }
    );
    let results = [a.unwrap(), b.unwrap()];

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results.iter().any(|r| matches!(
        r,
        Err(LedgerError::Rule(LedgerViolation::NoProductToDelete { .. }))
    )));
    assert_eq!(fx.product_count(pvz).await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_removers_only_ever_take_the_newest() {
    let Some(fx) = fixture(Duration::from_secs(5)).await else { return };
    let pvz = fx.pickup_point().await;
    fx.ledger.open_reception(pvz).await.unwrap();
    let mut added = Vec::new();
    for _ in 0..10 {
        added.push(fx.ledger.append_product(pvz, ProductType::Shoes).await.unwrap().id);
    }

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let ledger = fx.ledger.clone();
            tokio::spawn(async move { ledger.remove_last_product(pvz).await })
        })
        .collect();

    let mut removed = std::collections::HashSet::new();
    for h in handles {
        match h.await.unwrap() {
            Ok(p) => assert!(removed.insert(p.id), "product {} removed twice", p.id),
            Err(LedgerError::Rule(LedgerViolation::NoProductToDelete { .. })) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    // Whatever was removed is exactly the newest suffix; the rest is intact.
    let kept = added.len() - removed.len();
    let newest: std::collections::HashSet<_> = added[kept..].iter().copied().collect();
    assert_eq!(removed, newest);
    assert_eq!(fx.product_count(pvz).await, kept as i64);
    assert_eq!(
        fx.ledger.last_product(pvz).await.unwrap().map(|p| p.id),
        added[..kept].last().copied()
    );
}

#[tokio::test]
async fn remover_does_not_fall_back_to_an_older_product() {
    let Some(fx) = fixture(Duration::from_secs(2)).await else { return };
    let pvz = fx.pickup_point().await;
    fx.ledger.open_reception(pvz).await.unwrap();
    let older = fx.ledger.append_product(pvz, ProductType::Clothes).await.unwrap();
    let newest = fx.ledger.append_product(pvz, ProductType::Electronics).await.unwrap();

    let mut holder = fx.pool.begin().await.unwrap();
    sqlx::query("SELECT id FROM products WHERE id = $1 FOR UPDATE")
        .bind(newest.id.as_uuid())
        .execute(&mut *holder)
        .await
        .unwrap();

    let err = violation(fx.ledger.remove_last_product(pvz).await);
    assert_eq!(err, LedgerViolation::NoProductToDelete { pickup_point_id: pvz });

    holder.rollback().await.unwrap();
    assert_eq!(fx.product_count(pvz).await, 2);
    assert_eq!(fx.ledger.remove_last_product(pvz).await.unwrap().id, newest.id);
    assert_eq!(fx.ledger.remove_last_product(pvz).await.unwrap().id, older.id);
}

#[tokio::test]
async fn lock_wait_is_bounded_and_reported_as_contention() {
    let Some(fx) = fixture(Duration::from_millis(100)).await else { return };
    let pvz = fx.pickup_point().await;
    let reception = fx.ledger.open_reception(pvz).await.unwrap();

    let mut blocker = fx.pool.begin().await.unwrap();
    sqlx::query("SELECT id FROM receptions WHERE id = $1 FOR UPDATE")
        .bind(reception.id.as_uuid())
        .execute(&mut *blocker)
        .await
        .unwrap();

    let err = fx.ledger.append_product(pvz, ProductType::Clothes).await.unwrap_err();
    assert!(err.is_transient(), "expected contention, got {err:?}");

    blocker.rollback().await.unwrap();
    fx.ledger.append_product(pvz, ProductType::Clothes).await.unwrap();
}

#[tokio::test]
async fn cancelled_operation_leaves_no_partial_write() {
    let Some(fx) = fixture(Duration::from_secs(5)).await else { return };
    let pvz = fx.pickup_point().await;
    let reception = fx.ledger.open_reception(pvz).await.unwrap();

    let mut blocker = fx.pool.begin().await.unwrap();
    sqlx::query("SELECT id FROM receptions WHERE id = $1 FOR UPDATE")
        .bind(reception.id.as_uuid())
        .execute(&mut *blocker)
        .await
        .unwrap();

    let timed_out = tokio::time::timeout(
        Duration::from_millis(200),
        fx.ledger.append_product(pvz, ProductType::Electronics),
    )
    .await;
    assert!(timed_out.is_err());

    blocker.rollback().await.unwrap();
    assert_eq!(fx.product_count(pvz).await, 0);
    assert!(fx.ledger.active_reception(pvz).await.unwrap().is_some());
}
