//! End-to-end scenarios for host rate limiting and the pending-release
//! delay queue.

mod common;

use chrono::{Duration, Utc};
use cinephage_core::{
    CinephageError, DelayProfile, DelayProfileRepository, Movie, MovieRepository,
    PendingReleaseRepository, PendingStatus, QueueRepository,
};
use cinephage_decision::profiles::best;
use cinephage_decision::{ItemContext, ScoringContext};
use cinephage_indexers::{RateLimitConfig, SearchCriteria};
use cinephage_monitoring::{GrabOutcome, MonitoringTask, PendingReleaseTask};
use common::{torrent_release, world, world_with_host_limit, StubIndexer, GB};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[tokio::test]
async fn shared_host_bucket_limits_indexers_on_subdomains() {
    // two indexers on subdomains of example.com share one host bucket
    let world = world_with_host_limit(RateLimitConfig {
        requests: 2,
        period_secs: 60,
        burst: 0,
    });
    world.orchestrator.register(Arc::new(
        StubIndexer::new(1, "alpha", "https://alpha.example.com").with_releases(Vec::new()),
    ));
    world.orchestrator.register(Arc::new(
        StubIndexer::new(2, "beta", "https://beta.example.com").with_releases(Vec::new()),
    ));

    let token = CancellationToken::new();

    // the first search takes both host slots (one per indexer)
    world
        .orchestrator
        .search(&SearchCriteria::movie(550), &best(), &token)
        .await
        .unwrap();
    assert_eq!(world.limiter.host_in_window("example.com").await, 2);

    // a second search against a different title must wait out the window;
    // cancel instead of sleeping a minute
    let orchestrator = world.orchestrator.clone();
    let search_token = token.child_token();
    let blocked = {
        let search_token = search_token.clone();
        tokio::spawn(async move {
            orchestrator
                .search(&SearchCriteria::movie(551), &best(), &search_token)
                .await
        })
    };
    tokio::time::sleep(std::time::Duration::from_millis(80)).await;
    search_token.cancel();
    let result = blocked.await.unwrap();
    assert!(matches!(result, Err(CinephageError::Cancelled { .. })));

    // never more requests inside the window than the limit allows
    assert_eq!(world.limiter.host_in_window("example.com").await, 2);
}

#[tokio::test]
async fn delayed_release_superseded_then_dispatched() {
    let world = world();

    // 60-minute torrent delay
    let delay = DelayProfile::new().with_torrent_delay(60);
    DelayProfileRepository::upsert(world.store.as_ref(), &delay)
        .await
        .unwrap();

    let movie = Movie::new(550, "Movie", "best").with_year(2024);
    MovieRepository::upsert(world.store.as_ref(), &movie)
        .await
        .unwrap();
    let item = ItemContext::Movie {
        movie: movie.clone(),
    };
    let token = CancellationToken::new();
    let scorer = world.scorer();
    let profile = best();

    // the web-dl lands in the pending queue
    let webdl = torrent_release("Movie.2024.1080p.WEB-DL.DDP5.1-GROUP", 1, "alpha", 4 * GB, 40);
    let webdl_score = scorer.score(&webdl.title, &profile, Some(webdl.size_bytes), &ScoringContext::movie());
    let outcome = world
        .grab
        .grab(&webdl, &webdl_score, &item, &profile, false, &token)
        .await
        .unwrap();
    let first = match outcome {
        GrabOutcome::Delayed(pending) => pending,
        other => panic!("expected Delayed, got {:?}", other),
    };
    assert!(world.client.added_titles().is_empty());

    // five minutes later a higher-scoring remux supersedes it
    let remux = torrent_release(
        "Movie.2024.2160p.UHD.BluRay.REMUX.TrueHD.Atmos-GROUP",
        1,
        "alpha",
        55 * GB,
        25,
    );
    let remux_score = scorer.score(&remux.title, &profile, Some(remux.size_bytes), &ScoringContext::movie());
    let outcome = world
        .grab
        .grab(&remux, &remux_score, &item, &profile, false, &token)
        .await
        .unwrap();
    let second = match outcome {
        GrabOutcome::Delayed(pending) => pending,
        other => panic!("expected Delayed, got {:?}", other),
    };

    let old = PendingReleaseRepository::get(world.store.as_ref(), first.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(old.status, PendingStatus::Superseded);
    assert_eq!(old.superseded_by, Some(second.id));

    // once the delay elapses, the processor dispatches the remux
    let mut due = second.clone();
    due.process_at = Utc::now() - Duration::minutes(1);
    PendingReleaseRepository::update(world.store.as_ref(), &due)
        .await
        .unwrap();

    let task = PendingReleaseTask::new(world.deps.clone());
    let summary = task.run(Uuid::new_v4(), &token).await.unwrap();
    assert_eq!(summary.grabbed, 1);

    let grabbed = PendingReleaseRepository::get(world.store.as_ref(), second.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(grabbed.status, PendingStatus::Grabbed);

    let queued = QueueRepository::list(world.store.as_ref(), None).await.unwrap();
    assert_eq!(queued.len(), 1);
    assert!(queued[0].title.contains("REMUX"));
    assert_eq!(world.client.added_titles().len(), 1);
}

#[tokio::test]
async fn stale_pending_rows_are_purged() {
    let world = world();
    let delay = DelayProfile::new().with_torrent_delay(60);
    DelayProfileRepository::upsert(world.store.as_ref(), &delay)
        .await
        .unwrap();

    let movie = Movie::new(550, "Movie", "best");
    MovieRepository::upsert(world.store.as_ref(), &movie)
        .await
        .unwrap();
    let item = ItemContext::Movie {
        movie: movie.clone(),
    };
    let token = CancellationToken::new();
    let scorer = world.scorer();
    let profile = best();

    let release = torrent_release("Movie.2024.1080p.WEB-DL-GROUP", 1, "alpha", 4 * GB, 10);
    let score = scorer.score(&release.title, &profile, Some(release.size_bytes), &ScoringContext::movie());
    let outcome = world
        .grab
        .grab(&release, &score, &item, &profile, false, &token)
        .await
        .unwrap();
    let pending = match outcome {
        GrabOutcome::Delayed(pending) => pending,
        other => panic!("expected Delayed, got {:?}", other),
    };

    // age the row past the 72h ceiling
    let mut stale = pending.clone();
    stale.created_at = Utc::now() - Duration::hours(80);
    PendingReleaseRepository::update(world.store.as_ref(), &stale)
        .await
        .unwrap();

    let task = PendingReleaseTask::new(world.deps.clone());
    task.run(Uuid::new_v4(), &token).await.unwrap();

    assert!(PendingReleaseRepository::get(world.store.as_ref(), pending.id)
        .await
        .unwrap()
        .is_none());
}
