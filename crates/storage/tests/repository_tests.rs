//! Repository behaviour against an in-memory SQLite database.

use patient_common::{Detail, PatientError};
use storage::{PatientRepository, ReplaceSummary};
use test_utils::{area_series, detail, AOMORI, HOKKAIDO};

async fn repository() -> PatientRepository {
    let repo = PatientRepository::in_memory().await.unwrap();
    repo.ensure_schema().await.unwrap();
    repo
}

#[tokio::test]
async fn test_fetch_range_is_inclusive_and_ordered() {
    let repo = repository().await;
    let mut records = area_series(HOKKAIDO, 20230101, &[1, 2, 3, 4, 5]);
    records.reverse();
    repo.replace_all(&records).await.unwrap();

    let found = repo.fetch_range(HOKKAIDO, 20230102, 20230104).await.unwrap();
    let dates: Vec<u32> = found.iter().map(|d| d.date).collect();
    assert_eq!(dates, vec![20230102, 20230103, 20230104]);
    assert_eq!(found[0], detail(20230102, HOKKAIDO, 2));
}

#[tokio::test]
async fn test_fetch_range_matches_area_exactly() {
    let repo = repository().await;
    let mut records = area_series(HOKKAIDO, 20230101, &[1, 2]);
    records.extend(area_series(AOMORI, 20230101, &[10, 20]));
    repo.replace_all(&records).await.unwrap();

    let found = repo.fetch_range(AOMORI, 20230101, 20230131).await.unwrap();
    assert_eq!(found.len(), 2);
    assert!(found.iter().all(|d| d.area == AOMORI));

    let none = repo.fetch_range("北海", 20230101, 20230131).await.unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_fetch_range_without_matches_is_empty() {
    let repo = repository().await;
    let found = repo.fetch_range(HOKKAIDO, 20230101, 20230131).await.unwrap();
    assert!(found.is_empty());
}

#[tokio::test]
async fn test_replace_all_discards_previous_generation() {
    let repo = repository().await;
    repo.replace_all(&area_series(AOMORI, 20220101, &[1, 1, 1]))
        .await
        .unwrap();

    let summary = repo
        .replace_all(&area_series(HOKKAIDO, 20230101, &[7, 8]))
        .await
        .unwrap();

    assert_eq!(
        summary,
        ReplaceSummary {
            removed: 3,
            inserted: 2
        }
    );
    assert_eq!(repo.count().await.unwrap(), 2);
    assert!(repo
        .fetch_range(AOMORI, 20220101, 20221231)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_replace_all_with_empty_input_clears_store() {
    let repo = repository().await;
    repo.replace_all(&area_series(HOKKAIDO, 20230101, &[1, 2]))
        .await
        .unwrap();

    repo.replace_all(&[]).await.unwrap();
    assert_eq!(repo.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_failed_replace_keeps_previous_generation() {
    let repo = PatientRepository::in_memory().await.unwrap();
    // Same columns as the real schema plus a constraint a record can violate.
    sqlx::query(
        "CREATE TABLE patient_details (
            date BIGINT NOT NULL,
            area TEXT NOT NULL CHECK (area <> ''),
            value BIGINT NOT NULL,
            country TEXT NOT NULL
        )",
    )
    .execute(repo.pool())
    .await
    .unwrap();
    repo.ensure_schema().await.unwrap();

    let previous = area_series(HOKKAIDO, 20230101, &[1, 2, 3]);
    repo.replace_all(&previous).await.unwrap();

    // Valid rows first, then one the table rejects, spread across batches.
    let mut next = area_series(AOMORI, 20220101, &[5; 250]);
    next.push(Detail::new(20230101, "", 9));

    let err = repo.replace_all(&next).await.unwrap_err();
    assert!(matches!(err, PatientError::Replace { step: "insert", .. }));

    assert_eq!(repo.count().await.unwrap(), 3);
    assert_eq!(
        repo.fetch_range(HOKKAIDO, 20230101, 20230103).await.unwrap(),
        previous
    );
}

#[tokio::test]
async fn test_replace_all_spans_insert_batches() {
    let repo = repository().await;
    let values: Vec<u32> = (0..450).collect();
    let records = area_series(HOKKAIDO, 20210101, &values);

    let summary = repo.replace_all(&records).await.unwrap();
    assert_eq!(summary.inserted, 450);

    let stored = repo.fetch_range(HOKKAIDO, 0, u32::MAX).await.unwrap();
    assert_eq!(stored, records);
}

#[tokio::test]
async fn test_ping() {
    let repo = repository().await;
    repo.ping().await.unwrap();
}
