use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashboard_core::{
    AnalysisRecord, Persona, QuoteFeed, RefreshError, ScoreFeed, SettingsStore, Snapshot,
};
use tokio::sync::Semaphore;
use tokio::time::timeout;

/// Everything one refresh cycle needs. Cloned into the cycle task so
/// the scheduler keeps its own copy for the next run.
#[derive(Clone)]
pub(crate) struct CycleDeps {
    pub settings: SettingsStore,
    pub quotes: Arc<dyn QuoteFeed>,
    pub scores: Arc<dyn ScoreFeed>,
    pub worker_count: usize,
    pub symbol_timeout: Duration,
}

/// One full refresh: read settings, configure the feeds, analyze every
/// symbol concurrently, and assemble the snapshot. Failures become
/// error entries instead of aborting the cycle.
pub(crate) async fn run_cycle(deps: CycleDeps) -> Snapshot {
    let view = deps.settings.refresh_view().await;
    tracing::info!(
        symbols = view.symbols.len(),
        source = %view.selection.quote_source,
        backend = %view.selection.scoring_backend,
        "refresh cycle starting"
    );

    deps.quotes.configure(&view.selection, &view.api_keys).await;
    deps.scores.configure(&view.selection, &view.api_keys).await;

    let personas: Arc<[Persona]> = view.personas.into();
    let sem = Arc::new(Semaphore::new(deps.worker_count.max(1)));
    let mut handles = Vec::with_capacity(view.symbols.len());

    for symbol in view.symbols {
        let task_symbol = symbol.clone();
        handles.push((
            symbol,
            tokio::spawn({
                let quotes = deps.quotes.clone();
                let scores = deps.scores.clone();
                let personas = personas.clone();
                let sem = Arc::clone(&sem);
                let deadline = deps.symbol_timeout;
                async move {
                    let _permit = match sem.acquire().await {
                        Ok(permit) => permit,
                        Err(_) => {
                            return Err(RefreshError::unexpected(&task_symbol, "worker pool closed"))
                        }
                    };
                    match timeout(
                        deadline,
                        analyze_symbol(quotes, scores, &task_symbol, &personas),
                    )
                    .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(RefreshError::unexpected(
                            &task_symbol,
                            format!("analysis timed out after {}s", deadline.as_secs()),
                        )),
                    }
                }
            }),
        ));
    }

    let mut records = Vec::new();
    let mut errors = Vec::new();
    for (symbol, handle) in handles {
        match handle.await {
            Ok(Ok(record)) => records.push(record),
            Ok(Err(err)) => {
                tracing::warn!(symbol = %err.symbol, kind = ?err.kind, "symbol skipped: {}", err.message);
                errors.push(err);
            }
            Err(join_err) => {
                tracing::error!(symbol = %symbol, "analysis task crashed: {join_err}");
                errors.push(RefreshError::unexpected(symbol, join_err.to_string()));
            }
        }
    }

    // Stable sort: equal scores keep their configured symbol order
    records.sort_by(|a, b| {
        b.aggregate_score
            .partial_cmp(&a.aggregate_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    tracing::info!(
        analyzed = records.len(),
        failed = errors.len(),
        "refresh cycle finished"
    );

    Snapshot {
        records,
        generated_at: Some(Utc::now()),
        errors,
    }
}

async fn analyze_symbol(
    quotes: Arc<dyn QuoteFeed>,
    scores: Arc<dyn ScoreFeed>,
    symbol: &str,
    personas: &[Persona],
) -> Result<AnalysisRecord, RefreshError> {
    let quote = quotes
        .fetch(symbol)
        .await
        .map_err(|e| RefreshError::quote_fetch(symbol, e.to_string()))?;
    let scores = scores
        .score_all(&quote, personas)
        .await
        .map_err(|e| RefreshError::scoring(symbol, e.to_string()))?;
    Ok(AnalysisRecord::new(quote, scores))
}
