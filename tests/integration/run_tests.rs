//! Whole-run scenarios through the orchestrator

use crate::support::{empty_page, fast_config, page_ids, results_page, ScriptedClient};
use shardline::crawler::{
    AbortReason, ChannelError, PageRequest, RawPage, RunOptions, RunState, ScrapeOrchestrator,
    EXIT_AUTH_FAILURE, EXIT_COMPLETED, EXIT_INTERRUPTED,
};
use shardline::records::Channel;
use shardline::shard::ShardStatus;
use shardline::storage::{FileProgressStore, ProgressStore};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn fresh() -> RunOptions {
    RunOptions {
        resume: false,
        config_hash: "test".to_string(),
        history: None,
    }
}

fn resume() -> RunOptions {
    RunOptions {
        resume: true,
        ..fresh()
    }
}

fn store(dir: &TempDir) -> Arc<FileProgressStore> {
    Arc::new(FileProgressStore::new(dir.path().join("progress.json")))
}

#[tokio::test]
async fn test_shard_ends_on_first_empty_page() {
    let dir = TempDir::new().unwrap();
    let config = fast_config(&["4"], &["F"], &["2"]);
    let client = Arc::new(ScriptedClient::new(|request, _| {
        if request.page_index < 2 {
            Ok(results_page(&page_ids(request)))
        } else {
            Ok(empty_page())
        }
    }));

    let mut orchestrator =
        ScrapeOrchestrator::new(&config, client.clone(), store(&dir), fresh()).unwrap();
    let report = orchestrator.run().await.unwrap();

    assert_eq!(report.state, RunState::Completed);
    assert_eq!(report.exit_code(), EXIT_COMPLETED);
    assert_eq!(report.exhausted(), vec!["4_F_2"]);
    assert_eq!(report.records.len(), 4);

    let pages: Vec<u32> = client.calls().iter().map(|c| c.page_index).collect();
    assert_eq!(pages, vec![0, 1, 2]);

    let stats = &report.shards[0].stats;
    assert_eq!(stats.pages_fetched, 3);
    assert_eq!(stats.job_count, 4);
    assert_eq!(stats.new_jobs, 4);

    for record in &report.records {
        assert_eq!(record.source_channel, Channel::StructuredApi);
        assert!(record.shard_memberships.contains("4_F_2"));
    }
}

#[tokio::test]
async fn test_page_ceiling_exhausts_shard() {
    let dir = TempDir::new().unwrap();
    let mut config = fast_config(&["4"], &["F"], &["2"]);
    config.scraper.max_pages_per_shard = 2;
    let client = Arc::new(ScriptedClient::new(|request, _| {
        Ok(results_page(&page_ids(request)))
    }));

    let mut orchestrator =
        ScrapeOrchestrator::new(&config, client.clone(), store(&dir), fresh()).unwrap();
    let report = orchestrator.run().await.unwrap();

    assert_eq!(report.state, RunState::Completed);
    assert_eq!(report.exhausted(), vec!["4_F_2"]);
    assert_eq!(client.calls().len(), 2);
}

#[tokio::test]
async fn test_overlapping_shards_share_one_record() {
    let dir = TempDir::new().unwrap();
    let config = fast_config(&["4"], &["F"], &["2", "3"]);
    let client = Arc::new(ScriptedClient::new(|request, _| {
        if request.page_index == 0 {
            Ok(results_page(&["777".to_string()]))
        } else {
            Ok(empty_page())
        }
    }));

    let mut orchestrator =
        ScrapeOrchestrator::new(&config, client, store(&dir), fresh()).unwrap();
    let report = orchestrator.run().await.unwrap();

    assert_eq!(report.records.len(), 1);
    let memberships: Vec<_> = report.records[0].shard_memberships.iter().cloned().collect();
    assert_eq!(memberships, vec!["4_F_2", "4_F_3"]);
    assert_eq!(report.mappings["777"], vec!["4_F_2", "4_F_3"]);

    let new_jobs: usize = report.shards.iter().map(|s| s.stats.new_jobs).sum();
    let job_count: usize = report.shards.iter().map(|s| s.stats.job_count).sum();
    assert_eq!(new_jobs, 1);
    assert_eq!(job_count, 2);
}

#[tokio::test]
async fn test_auth_failure_aborts_and_keeps_progress() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);
    // 5 experience levels x 2 job types = 10 shards
    let config = fast_config(&["1", "2", "3", "4", "5"], &["F", "C"], &["2"]);
    let client = Arc::new(ScriptedClient::new(|request, shard_position| {
        if shard_position == 2 {
            return Err(ChannelError::Auth("401 Unauthorized".to_string()));
        }
        if request.page_index == 0 {
            Ok(results_page(&page_ids(request)))
        } else {
            Ok(empty_page())
        }
    }));

    let mut orchestrator =
        ScrapeOrchestrator::new(&config, client.clone(), store.clone(), fresh()).unwrap();
    let report = orchestrator.run().await.unwrap();

    assert_eq!(report.state, RunState::Aborted(AbortReason::AuthFailure));
    assert_eq!(report.exit_code(), EXIT_AUTH_FAILURE);

    let order = client.shard_order();
    assert_eq!(order.len(), 3, "no shard is dispatched after the abort");

    let checkpoint = store.load().unwrap().unwrap();
    let completed: Vec<_> = checkpoint.completed_shard_keys.iter().cloned().collect();
    let mut expected = vec![order[0].clone(), order[1].clone()];
    expected.sort();
    assert_eq!(completed, expected);
    assert!(!checkpoint.is_completed(&order[2]));
    assert_eq!(checkpoint.collected_job_ids.len(), 4);

    // The auth failure is not retried and never falls back
    assert_eq!(client.calls_for(&order[2]).len(), 1);
    assert_eq!(report.unfinished().len(), 8);
    assert!(report.failed().is_empty());
}

#[tokio::test]
async fn test_resume_skips_completed_shards() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);
    let config = fast_config(&["1", "2", "3", "4", "5"], &["F", "C"], &["2"]);

    let first = Arc::new(ScriptedClient::new(|request, shard_position| {
        if shard_position == 2 {
            return Err(ChannelError::Auth("session expired".to_string()));
        }
        if request.page_index == 0 {
            Ok(results_page(&page_ids(request)))
        } else {
            Ok(empty_page())
        }
    }));
    let mut orchestrator =
        ScrapeOrchestrator::new(&config, first.clone(), store.clone(), fresh()).unwrap();
    orchestrator.run().await.unwrap();
    let done = first.shard_order()[..2].to_vec();

    let second = Arc::new(ScriptedClient::new(|request, _| {
        if request.page_index == 0 {
            Ok(results_page(&page_ids(request)))
        } else {
            Ok(empty_page())
        }
    }));
    let mut orchestrator =
        ScrapeOrchestrator::new(&config, second.clone(), store.clone(), resume()).unwrap();
    let report = orchestrator.run().await.unwrap();

    assert_eq!(report.state, RunState::Completed);
    assert_eq!(report.exhausted().len(), 10);
    assert_eq!(second.shard_order().len(), 8);
    for key in &done {
        assert!(second.calls_for(key).is_empty(), "{} was fetched again", key);
    }

    // Records from the first run survive through the checkpoint
    assert_eq!(report.records.len(), 20);
}

#[tokio::test]
async fn test_fresh_run_discards_checkpoint() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);
    let config = fast_config(&["4"], &["F"], &["2"]);
    let script = |request: &PageRequest, _: usize| -> Result<RawPage, ChannelError> {
        if request.page_index == 0 {
            Ok(results_page(&page_ids(request)))
        } else {
            Ok(empty_page())
        }
    };

    let first = Arc::new(ScriptedClient::new(script));
    ScrapeOrchestrator::new(&config, first, store.clone(), fresh())
        .unwrap()
        .run()
        .await
        .unwrap();

    let second = Arc::new(ScriptedClient::new(script));
    ScrapeOrchestrator::new(&config, second.clone(), store.clone(), fresh())
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(second.calls().len(), 2);
}

#[tokio::test]
async fn test_transient_shard_fails_and_run_continues() {
    let dir = TempDir::new().unwrap();
    let mut config = fast_config(&["4"], &["F"], &["2", "3"]);
    config.scraper.retry_budget = 3;
    let client = Arc::new(ScriptedClient::new(|request, _| {
        if request.shard.workplace_code == "2" {
            return Err(ChannelError::RateLimited(429));
        }
        if request.page_index == 0 {
            Ok(results_page(&page_ids(request)))
        } else {
            Ok(empty_page())
        }
    }));

    let mut orchestrator =
        ScrapeOrchestrator::new(&config, client.clone(), store(&dir), fresh()).unwrap();
    let report = orchestrator.run().await.unwrap();

    assert_eq!(report.state, RunState::Completed);
    assert_eq!(report.failed(), vec!["4_F_2"]);
    assert_eq!(report.exhausted(), vec!["4_F_3"]);
    assert_eq!(report.records.len(), 2);

    // First attempt plus three retries, all on page 0
    let calls = client.calls_for("4_F_2");
    assert_eq!(calls.len(), 4);
    assert!(calls.iter().all(|c| c.page_index == 0));

    let failed = report
        .shards
        .iter()
        .find(|s| s.shard.key() == "4_F_2")
        .unwrap();
    assert_eq!(failed.status, ShardStatus::Failed);
    assert_eq!(failed.stats.attempts, 4);
    assert_eq!(failed.stats.pages_fetched, 0);
}

#[tokio::test]
async fn test_transient_api_error_falls_back_to_rendered_page() {
    let dir = TempDir::new().unwrap();
    let mut config = fast_config(&["4"], &["F"], &["2"]);
    config.scraper.fallback_enabled = true;
    let client = Arc::new(ScriptedClient::new(|request, _| match request.channel {
        Channel::StructuredApi => Err(ChannelError::Transient("502 Bad Gateway".to_string())),
        Channel::RenderedFallback => Ok(crate::support::rendered_no_results()),
    }));

    let mut orchestrator =
        ScrapeOrchestrator::new(&config, client.clone(), store(&dir), fresh()).unwrap();
    let report = orchestrator.run().await.unwrap();

    assert_eq!(report.exhausted(), vec!["4_F_2"]);
    let channels: Vec<_> = client.calls().iter().map(|c| c.channel).collect();
    assert_eq!(
        channels,
        vec![Channel::StructuredApi, Channel::RenderedFallback]
    );
}

#[tokio::test]
async fn test_cancelled_run_is_interrupted() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);
    let config = fast_config(&["4"], &["F"], &["2", "3"]);
    let client = Arc::new(ScriptedClient::new(|request, _| {
        Ok(results_page(&page_ids(request)))
    }));

    let mut orchestrator =
        ScrapeOrchestrator::new(&config, client.clone(), store.clone(), fresh()).unwrap();
    orchestrator.cancel_token().cancel();
    let report = orchestrator.run().await.unwrap();

    assert_eq!(report.state, RunState::Aborted(AbortReason::Interrupted));
    assert_eq!(report.exit_code(), EXIT_INTERRUPTED);
    assert!(client.calls().is_empty());
    assert!(store.load().unwrap().is_some());
}

#[tokio::test]
async fn test_interrupted_shard_resumes_at_next_page() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);
    let config = fast_config(&["4"], &["F"], &["2"]);

    let token: Arc<Mutex<Option<CancellationToken>>> = Arc::new(Mutex::new(None));
    let stop = token.clone();
    let first = Arc::new(ScriptedClient::new(move |request, _| {
        if request.page_index == 1 {
            if let Some(token) = stop.lock().unwrap().as_ref() {
                token.cancel();
            }
        }
        Ok(results_page(&page_ids(request)))
    }));
    let mut orchestrator =
        ScrapeOrchestrator::new(&config, first.clone(), store.clone(), fresh()).unwrap();
    *token.lock().unwrap() = Some(orchestrator.cancel_token());
    let report = orchestrator.run().await.unwrap();

    assert_eq!(report.state, RunState::Aborted(AbortReason::Interrupted));
    let pages: Vec<u32> = first.calls().iter().map(|c| c.page_index).collect();
    assert_eq!(pages, vec![0, 1]);
    let checkpoint = store.load().unwrap().unwrap();
    assert_eq!(checkpoint.next_page("4_F_2"), 2);
    assert!(!checkpoint.is_completed("4_F_2"));

    let second = Arc::new(ScriptedClient::new(|request, _| {
        Ok(results_page(&page_ids(request)))
    }));
    let mut orchestrator =
        ScrapeOrchestrator::new(&config, second.clone(), store.clone(), resume()).unwrap();
    let report = orchestrator.run().await.unwrap();

    assert_eq!(report.state, RunState::Completed);
    assert_eq!(report.exhausted(), vec!["4_F_2"]);
    let pages: Vec<u32> = second.calls().iter().map(|c| c.page_index).collect();
    assert_eq!(pages, vec![2, 3, 4]);

    // Two jobs from each of the five pages, none fetched twice
    assert_eq!(report.records.len(), 10);
    assert_eq!(report.shards[0].stats.pages_fetched, 5);
}

#[tokio::test]
async fn test_parallel_workers_keep_shared_state_consistent() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);
    // 4 experience levels x 2 job types x 3 workplace types = 24 shards
    let mut config = fast_config(&["1", "2", "3", "4"], &["F", "C"], &["1", "2", "3"]);
    config.scraper.workers = 5;
    let client = Arc::new(ScriptedClient::new(|request, _| {
        if request.page_index == 0 {
            let mut ids = page_ids(request);
            ids.push("900".to_string());
            Ok(results_page(&ids))
        } else {
            Ok(empty_page())
        }
    }));

    let mut orchestrator =
        ScrapeOrchestrator::new(&config, client.clone(), store.clone(), fresh()).unwrap();
    let report = orchestrator.run().await.unwrap();

    assert_eq!(report.state, RunState::Completed);
    assert_eq!(report.exhausted().len(), 24);
    assert_eq!(client.shard_order().len(), 24);
    for key in client.shard_order() {
        assert_eq!(client.calls_for(&key).len(), 2, "{} fetched more than once", key);
    }

    // One shared job plus two unique jobs per shard
    assert_eq!(report.records.len(), 49);
    let shared = report.records.iter().find(|r| r.job_id == "900").unwrap();
    assert_eq!(shared.shard_memberships.len(), 24);
    assert_eq!(report.mappings["900"].len(), 24);

    let new_jobs: usize = report.shards.iter().map(|s| s.stats.new_jobs).sum();
    let job_count: usize = report.shards.iter().map(|s| s.stats.job_count).sum();
    assert_eq!(new_jobs, 49);
    assert_eq!(job_count, 72);

    let checkpoint = store.load().unwrap().unwrap();
    assert_eq!(checkpoint.completed_shard_keys.len(), 24);
    assert_eq!(checkpoint.collected_job_ids.len(), 49);
    assert_eq!(checkpoint.records.len(), 49);
}

#[tokio::test]
async fn test_corrupt_checkpoint_starts_fresh_plan() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);
    std::fs::write(dir.path().join("progress.json"), "{\"completed_shard_keys\": [").unwrap();
    assert!(store.load().is_err());

    let config = fast_config(&["4"], &["F"], &["2", "3"]);
    let client = Arc::new(ScriptedClient::new(|request, _| {
        if request.page_index == 0 {
            Ok(results_page(&page_ids(request)))
        } else {
            Ok(empty_page())
        }
    }));

    let mut orchestrator =
        ScrapeOrchestrator::new(&config, client.clone(), store.clone(), resume()).unwrap();
    let report = orchestrator.run().await.unwrap();

    assert_eq!(report.state, RunState::Completed);
    assert_eq!(report.exhausted().len(), 2);
    assert_eq!(client.calls().len(), 4);

    // The unreadable file has been replaced by a valid checkpoint
    let checkpoint = store.load().unwrap().unwrap();
    assert!(checkpoint.is_completed("4_F_2"));
    assert!(checkpoint.is_completed("4_F_3"));
}
