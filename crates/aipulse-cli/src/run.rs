//! Command implementations: pipeline startup, fallback replay, status.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use aipulse_classifier::LexiconClassifier;
use aipulse_core::{AppConfig, RawMention};
use aipulse_pipeline::{
    ChannelTransport, ConsumerConfig, Deduplicator, Delivery, EnrichmentConsumer,
};
use aipulse_warehouse::{DimensionalModelBuilder, FallbackStore, PgSink, WarehouseSink};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};

/// Start one consumer worker per partition, feed them from stdin, and drain
/// gracefully on EOF or a shutdown signal.
pub async fn run_pipeline(config: &AppConfig) -> anyhow::Result<()> {
    let builder = Arc::new(connect_builder(config).await?);
    let dedup = Arc::new(Deduplicator::new(
        config.dedup_capacity,
        Duration::from_secs(config.dedup_ttl_secs),
    ));
    let classifier = Arc::new(LexiconClassifier::new());
    let consumer_config = ConsumerConfig::from_app_config(config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut senders = Vec::with_capacity(config.partitions);
    let mut workers = Vec::with_capacity(config.partitions);

    for partition in 0..config.partitions {
        let (tx, transport) = ChannelTransport::pair(config.window_max_items * 2);
        senders.push(tx);
        let worker = EnrichmentConsumer::new(
            partition,
            transport,
            Arc::clone(&dedup),
            Arc::clone(&classifier) as Arc<dyn aipulse_classifier::Classifier>,
            Arc::clone(&builder),
            consumer_config.clone(),
        );
        let shutdown = shutdown_rx.clone();
        workers.push(tokio::spawn(async move { worker.run(shutdown).await }));
    }
    drop(shutdown_rx);

    let feeder = tokio::spawn(feed_from_stdin(senders));

    tokio::select! {
        () = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining workers");
            let _ = shutdown_tx.send(true);
        }
        result = feeder => {
            // EOF: senders dropped, workers drain on transport close.
            result??;
        }
    }

    let mut failed = 0usize;
    for worker in workers {
        if let Err(err) = worker.await? {
            tracing::error!(error = %err, "worker exited with error");
            failed += 1;
        }
    }
    anyhow::ensure!(failed == 0, "{failed} worker(s) failed; see logs");
    tracing::info!("pipeline drained cleanly");
    Ok(())
}

/// Read one JSON [`RawMention`] per stdin line and route it to the partition
/// that owns its `mention_id` (stable hash), mirroring a consumer-group
/// partition assignment. Malformed lines are logged and skipped.
async fn feed_from_stdin(senders: Vec<mpsc::Sender<Delivery>>) -> anyhow::Result<()> {
    let mut offsets = vec![0u64; senders.len()];
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let mention: RawMention = match serde_json::from_str(&line) {
            Ok(m) => m,
            Err(err) => {
                tracing::warn!(error = %err, "skipping malformed mention line");
                continue;
            }
        };
        let partition = partition_for(&mention.mention_id, senders.len());
        offsets[partition] += 1;
        let delivery = Delivery {
            offset: offsets[partition],
            mention,
        };
        if senders[partition].send(delivery).await.is_err() {
            anyhow::bail!("partition {partition} worker is gone");
        }
    }
    tracing::info!("stdin feed exhausted");
    Ok(())
}

fn partition_for(mention_id: &str, partitions: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    mention_id.hash(&mut hasher);
    usize::try_from(hasher.finish() % partitions as u64).unwrap_or(0)
}

/// Re-commit every batch in the fallback store.
pub async fn replay_fallback(config: &AppConfig) -> anyhow::Result<()> {
    let builder = connect_builder(config).await?;
    let replayed = builder.replay_fallback().await?;
    println!("replayed {replayed} fallback batch(es)");
    Ok(())
}

/// Print database health, row counts per warehouse table, and the
/// post-commit join check.
pub async fn print_status(config: &AppConfig) -> anyhow::Result<()> {
    let pool = aipulse_warehouse::connect_pool(
        &config.database_url,
        aipulse_warehouse::PoolConfig::from_app_config(config),
    )
    .await?;
    aipulse_warehouse::ping(&pool).await?;
    println!("database: ok");
    let sink = PgSink::new(pool);

    for (table, count) in sink.table_counts().await? {
        println!("{table}: {count}");
    }
    let dangling = sink.dangling_fact_count().await?;
    println!("facts with dangling foreign keys: {dangling}");
    Ok(())
}

/// Connect, migrate, and build the dimensional model builder with its key
/// maps preloaded from the warehouse.
async fn connect_builder(config: &AppConfig) -> anyhow::Result<DimensionalModelBuilder> {
    let pool = aipulse_warehouse::connect_pool(
        &config.database_url,
        aipulse_warehouse::PoolConfig::from_app_config(config),
    )
    .await?;
    let applied = aipulse_warehouse::run_migrations(&pool).await?;
    if applied > 0 {
        tracing::info!(applied, "migrations applied");
    }

    let sink = PgSink::new(pool);
    let builder = DimensionalModelBuilder::new(
        Arc::new(sink.clone()) as Arc<dyn WarehouseSink>,
        FallbackStore::new(config.fallback_dir.clone()),
        config.sink_max_retries,
        config.sink_backoff_base_ms,
    );
    // Surrogate keys are a stable bijection for the warehouse's lifetime;
    // restarts must continue allocation past every committed key.
    sink.load_existing_keys(builder.keys()).await?;
    Ok(builder)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_assignment_is_stable() {
        let first = partition_for("t3_abc123", 4);
        let second = partition_for("t3_abc123", 4);
        assert_eq!(first, second);
        assert!(first < 4);
    }

    #[test]
    fn partition_assignment_spreads_ids() {
        let partitions = 4;
        let assigned: std::collections::HashSet<usize> = (0..100)
            .map(|i| partition_for(&format!("id-{i}"), partitions))
            .collect();
        assert!(assigned.len() > 1, "hashing must not collapse to one partition");
    }
}
