//! Fan-out/fan-in aggregation with first-error-wins cancellation.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use patient_common::Detail;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::error::AggregateError;
use crate::result::AggregateResult;

/// Outcome of a single derivation task.
enum Outcome<T> {
    Done(T),
    /// Never started: the call was already cancelled.
    Skipped,
    /// Failed; its error went to the shared slot.
    Failed,
}

/// Cancellation token and single error slot shared by one call's tasks.
#[derive(Clone)]
struct FanOut {
    cancel: CancellationToken,
    first_error: Arc<OnceLock<AggregateError>>,
}

impl FanOut {
    fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            first_error: Arc::new(OnceLock::new()),
        }
    }

    /// Record a failure and stop any derivation that has not started yet.
    /// Only the first failure is kept.
    fn fail(&self, err: AggregateError) {
        let _ = self.first_error.set(err);
        self.cancel.cancel();
    }

    /// Spawn one derivation. The cancellation check happens once, before the
    /// derivation runs; a derivation that has started always runs to the end.
    fn spawn<T, F>(
        &self,
        task: &'static str,
        records: Arc<[Detail]>,
        derive: F,
    ) -> JoinHandle<Outcome<T>>
    where
        T: Send + 'static,
        F: FnOnce(&[Detail]) -> Result<T, AggregateError> + Send + 'static,
    {
        let fan_out = self.clone();
        tokio::spawn(async move {
            if fan_out.cancel.is_cancelled() {
                debug!(task, "Aggregation cancelled, skipping derivation");
                return Outcome::Skipped;
            }
            match derive(&records) {
                Ok(value) => Outcome::Done(value),
                Err(e) => {
                    debug!(task, error = %e, "Derivation failed");
                    fan_out.fail(e);
                    Outcome::Failed
                }
            }
        })
    }

    /// Turn a panicked or aborted task into a recorded failure.
    fn settle<T>(&self, task: &'static str, joined: Result<Outcome<T>, JoinError>) -> Outcome<T> {
        match joined {
            Ok(outcome) => outcome,
            Err(e) => {
                self.fail(AggregateError::TaskFailed {
                    task,
                    message: e.to_string(),
                });
                Outcome::Failed
            }
        }
    }

    fn first_error(&self) -> AggregateError {
        self.first_error
            .get()
            .cloned()
            .unwrap_or_else(|| AggregateError::TaskFailed {
                task: "join",
                message: "cancelled without a recorded error".to_string(),
            })
    }
}

fn take<T>(task: &'static str, outcome: Outcome<T>) -> Result<T, AggregateError> {
    match outcome {
        Outcome::Done(value) => Ok(value),
        Outcome::Skipped | Outcome::Failed => Err(AggregateError::TaskFailed {
            task,
            message: "no result produced".to_string(),
        }),
    }
}

/// Aggregate one area's records into the response payload.
///
/// `records` must all belong to the same area. Empty input fails with
/// [`AggregateError::NoData`]; a blank area with [`AggregateError::EmptyArea`].
/// Either the whole payload is returned or an error, never a partial result.
pub async fn aggregate(records: Vec<Detail>) -> Result<AggregateResult, AggregateError> {
    aggregate_with(records, derive_area, derive_sum, derive_average).await
}

#[instrument(skip_all, fields(records = records.len()))]
async fn aggregate_with<FA, FS, FV>(
    records: Vec<Detail>,
    area: FA,
    sum: FS,
    average: FV,
) -> Result<AggregateResult, AggregateError>
where
    FA: FnOnce(&[Detail]) -> Result<String, AggregateError> + Send + 'static,
    FS: FnOnce(&[Detail]) -> Result<u64, AggregateError> + Send + 'static,
    FV: FnOnce(&[Detail]) -> Result<f64, AggregateError> + Send + 'static,
{
    // No failure mode, so it is computed up front rather than fanned out.
    let per_date = derive_per_date(&records);

    let records: Arc<[Detail]> = records.into();
    let fan_out = FanOut::new();

    let area_task = fan_out.spawn("area", Arc::clone(&records), area);
    let sum_task = fan_out.spawn("sum", Arc::clone(&records), sum);
    let average_task = fan_out.spawn("average", Arc::clone(&records), average);

    let (area, sum, average) = tokio::join!(area_task, sum_task, average_task);
    let area = fan_out.settle("area", area);
    let sum = fan_out.settle("sum", sum);
    let average = fan_out.settle("average", average);

    if fan_out.cancel.is_cancelled() {
        return Err(fan_out.first_error());
    }

    let result = AggregateResult {
        area: take("area", area)?,
        per_date,
        sum: take("sum", sum)?,
        average: take("average", average)?,
    };

    debug!(area = %result.area, sum = result.sum, average = result.average, "Aggregated records");
    Ok(result)
}

fn derive_per_date(records: &[Detail]) -> BTreeMap<u32, u32> {
    records.iter().map(|d| (d.date, d.value)).collect()
}

fn derive_area(records: &[Detail]) -> Result<String, AggregateError> {
    let first = records.first().ok_or(AggregateError::NoData)?;

    if records.iter().any(|d| d.area.trim().is_empty()) {
        return Err(AggregateError::EmptyArea);
    }
    if let Some(other) = records.iter().find(|d| d.area != first.area) {
        return Err(AggregateError::MixedAreas {
            expected: first.area.clone(),
            found: other.area.clone(),
        });
    }

    Ok(first.area.clone())
}

fn derive_sum(records: &[Detail]) -> Result<u64, AggregateError> {
    Ok(records.iter().map(|d| u64::from(d.value)).sum())
}

fn derive_average(records: &[Detail]) -> Result<f64, AggregateError> {
    if records.is_empty() {
        return Err(AggregateError::NoData);
    }
    let sum: u64 = records.iter().map(|d| u64::from(d.value)).sum();
    Ok(sum as f64 / records.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn hokkaido(values: &[u32]) -> Vec<Detail> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| Detail::new(20230101 + i as u32, "北海道", *v))
            .collect()
    }

    #[test]
    fn test_derive_area_checks_every_record() {
        let mut records = hokkaido(&[1, 2, 3]);
        records[2].area = String::new();
        assert_eq!(derive_area(&records), Err(AggregateError::EmptyArea));

        let mut records = hokkaido(&[1, 2]);
        records[1].area = "青森県".into();
        assert!(matches!(
            derive_area(&records),
            Err(AggregateError::MixedAreas { .. })
        ));
    }

    #[test]
    fn test_derive_average_rejects_empty() {
        assert_eq!(derive_average(&[]), Err(AggregateError::NoData));
    }

    #[test]
    fn test_derive_sum_widens() {
        let records = hokkaido(&[u32::MAX, u32::MAX]);
        assert_eq!(derive_sum(&records).unwrap(), 2 * u64::from(u32::MAX));
    }

    #[tokio::test]
    async fn test_first_failure_prevents_unstarted_tasks() {
        let started = Arc::new(AtomicUsize::new(0));
        let (s1, s2) = (Arc::clone(&started), Arc::clone(&started));

        let result = aggregate_with(
            hokkaido(&[1, 2]),
            |_: &[Detail]| Err(AggregateError::EmptyArea),
            move |records: &[Detail]| {
                s1.fetch_add(1, Ordering::SeqCst);
                derive_sum(records)
            },
            move |_: &[Detail]| {
                s2.fetch_add(1, Ordering::SeqCst);
                Err(AggregateError::NoData)
            },
        )
        .await;

        // Single-threaded runtime: the area task runs first and cancels the rest.
        assert_eq!(result, Err(AggregateError::EmptyArea));
        assert_eq!(started.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_late_failure_discards_completed_results() {
        let result = aggregate_with(
            hokkaido(&[10, 20]),
            derive_area,
            |_: &[Detail]| {
                std::thread::sleep(Duration::from_millis(50));
                Err(AggregateError::TaskFailed {
                    task: "sum",
                    message: "injected".into(),
                })
            },
            derive_average,
        )
        .await;

        assert!(matches!(
            result,
            Err(AggregateError::TaskFailed { task: "sum", .. })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_panicking_derivation_becomes_error() {
        let result = aggregate_with(
            hokkaido(&[10]),
            derive_area,
            derive_sum,
            |_: &[Detail]| -> Result<f64, AggregateError> { panic!("injected panic") },
        )
        .await;

        assert!(matches!(
            result,
            Err(AggregateError::TaskFailed { task: "average", .. })
        ));
    }

    #[tokio::test]
    async fn test_per_date_keeps_every_day() {
        let result = aggregate(hokkaido(&[5, 0, 7])).await.unwrap();
        assert_eq!(result.per_date.len(), 3);
        assert_eq!(result.per_date[&20230102], 0);
    }
}
