//! Bounded worker pool for `batch_generate`: each worker pulls an input,
//! runs a complete generation, and reports success or failure without
//! aborting the batch.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use alchemy_core::{GenerateOptions, GenerationResult};
use alchemy_engine::PhaseEngine;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

/// One worker's outcome for one input, tagged with its position so the
/// collector can report which inputs failed.
pub enum BatchOutcome {
    Success { index: usize, result: GenerationResult },
    Failure { index: usize, input: String, error: String },
}

pub struct BatchReport {
    pub successes: Vec<GenerationResult>,
    pub errors: Vec<(usize, String, String)>,
}

/// Progress callback invoked after every completed input with
/// `(completed, total)`; the caller turns this into `$/progress` reports.
pub async fn run_batch(
    engine: Arc<PhaseEngine>,
    inputs: Vec<String>,
    workers: usize,
    options_for: impl Fn(&str) -> GenerateOptions + Send + Sync + 'static,
    mut on_progress: impl FnMut(usize, usize) + Send + 'static,
    cancellation: CancellationToken,
) -> BatchReport {
    let total = inputs.len();
    let workers = workers.clamp(1, 20).min(total.max(1));
    let options_for = Arc::new(options_for);

    let (input_tx, input_rx) = mpsc::channel::<(usize, String)>(total.max(1));
    let input_rx = Arc::new(Mutex::new(input_rx));
    let (result_tx, mut result_rx) = mpsc::channel::<BatchOutcome>(total.max(1));

    for (index, input) in inputs.into_iter().enumerate() {
        // The channel is sized to `total`, so this never blocks.
        let _ = input_tx.send((index, input)).await;
    }
    drop(input_tx);

    let mut handles = Vec::with_capacity(workers);
    for _ in 0..workers {
        let engine = engine.clone();
        let input_rx = input_rx.clone();
        let result_tx = result_tx.clone();
        let options_for = options_for.clone();
        let cancellation = cancellation.clone();
        handles.push(tokio::spawn(async move {
            loop {
                if cancellation.is_cancelled() {
                    break;
                }
                let next = { input_rx.lock().await.recv().await };
                let Some((index, input)) = next else { break };
                let options = options_for(&input);
                let outcome = match engine.generate(&options, &cancellation).await {
                    Ok(result) => BatchOutcome::Success { index, result },
                    Err(e) => BatchOutcome::Failure { index, input, error: e.to_string() },
                };
                if result_tx.send(outcome).await.is_err() {
                    break;
                }
            }
        }));
    }
    drop(result_tx);

    let completed = Arc::new(AtomicUsize::new(0));
    let mut successes = vec![None; total];
    let mut errors = Vec::new();

    while let Some(outcome) = result_rx.recv().await {
        let n = completed.fetch_add(1, Ordering::SeqCst) + 1;
        on_progress(n, total);
        match outcome {
            BatchOutcome::Success { index, result } => successes[index] = Some(result),
            BatchOutcome::Failure { index, input, error } => errors.push((index, input, error)),
        }
    }

    for handle in handles {
        let _ = handle.await;
    }

    BatchReport { successes: successes.into_iter().flatten().collect(), errors }
}
