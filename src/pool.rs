use std::future::Future;
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::info;

use crate::error::{CrawlError, Result};

/// Run `work` over every item with at most `concurrency` in flight.
///
/// Results come back in `items` order regardless of completion order. The
/// first error aborts the remaining workers and is returned as-is.
pub async fn fan_out<I, T, W, Fut>(
    label: &str,
    items: Vec<I>,
    concurrency: usize,
    name_of: fn(&I) -> String,
    work: W,
) -> Result<Vec<T>>
where
    I: Send + 'static,
    T: Send + 'static,
    W: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    let total = items.len();
    let concurrency = concurrency.max(1);
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let work = Arc::new(work);
    let pb = progress_bar(label, total);

    // Workers send (position, result); the loop below puts them back in order
    let (tx, mut rx) = mpsc::channel::<(usize, Result<T>)>(concurrency * 2);
    let mut tasks = JoinSet::new();

    for (idx, item) in items.into_iter().enumerate() {
        let sem = Arc::clone(&semaphore);
        let work = Arc::clone(&work);
        let tx = tx.clone();
        let pb = pb.clone();

        tasks.spawn(async move {
            let Ok(_permit) = sem.acquire_owned().await else {
                return;
            };
            pb.set_message(name_of(&item));
            let result = work(item).await;
            let _ = tx.send((idx, result)).await;
        });
    }

    // Drop our copy of tx so rx closes when all spawned tasks finish
    drop(tx);

    let mut slots: Vec<Option<T>> = (0..total).map(|_| None).collect();
    while let Some((idx, result)) = rx.recv().await {
        match result {
            Ok(value) => {
                slots[idx] = Some(value);
                pb.inc(1);
            }
            Err(e) => {
                pb.abandon();
                tasks.abort_all();
                return Err(e);
            }
        }
    }
    pb.finish_and_clear();

    // A worker that panicked never reported; surface it here
    while let Some(joined) = tasks.join_next().await {
        joined.map_err(|e| CrawlError::Worker {
            reason: e.to_string(),
        })?;
    }

    let results: Vec<T> = slots.into_iter().flatten().collect();
    if results.len() != total {
        return Err(CrawlError::Worker {
            reason: format!("{}: {} of {} results missing", label, total - results.len(), total),
        });
    }

    info!("{}: {} items done", label, total);
    Ok(results)
}

fn progress_bar(label: &str, total: usize) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template("{prefix} [{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta}) {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    pb.set_style(style);
    pb.set_prefix(label.to_string());
    pb
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    fn name(n: &u64) -> String {
        n.to_string()
    }

    #[tokio::test]
    async fn results_keep_input_order() {
        // Earlier items sleep longer, so they finish last
        let items: Vec<u64> = (0..8).collect();
        let out = fan_out("test", items, 4, name, |n| async move {
            tokio::time::sleep(Duration::from_millis(40 - n * 5)).await;
            Ok::<_, CrawlError>(n * 10)
        })
        .await
        .unwrap();
        assert_eq!(out, vec![0, 10, 20, 30, 40, 50, 60, 70]);
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let live = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (l, p) = (Arc::clone(&live), Arc::clone(&peak));

        fan_out("test", (0..12).collect(), 3, name, move |_| {
            let live = Arc::clone(&l);
            let peak = Arc::clone(&p);
            async move {
                let now = live.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                live.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, CrawlError>(())
            }
        })
        .await
        .unwrap();

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(live.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn first_error_aborts() {
        let err = fan_out("test", (0..5).collect(), 1, name, |n| async move {
            if n == 2 {
                Err(CrawlError::fetch_status("https://x/2.html", 500))
            } else {
                Ok(n)
            }
        })
        .await
        .unwrap_err();
        assert!(err.to_string().contains("https://x/2.html"));
    }

    #[tokio::test]
    async fn empty_work_list() {
        let out: Vec<u64> = fan_out("test", Vec::new(), 4, name, |n| async move {
            Ok::<_, CrawlError>(n)
        })
        .await
        .unwrap();
        assert!(out.is_empty());
    }
}
