//! End-to-end decision scenarios: missing-content grabs, upgrades, and the
//! cutoff, driven through the real tasks over the in-memory store.

mod common;

use cinephage_core::{
    HistoryRepository, HistoryStatus, MediaFile, Movie, MovieRepository, QueueRepository,
};
use cinephage_decision::profiles::best;
use cinephage_decision::ScoringContext;
use cinephage_monitoring::{MissingContentTask, MonitoringTask, UpgradeTask};
use common::{torrent_release, world, StubIndexer, GB};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[tokio::test]
async fn missing_movie_grabs_webdl_and_rejects_cam() {
    let world = world();
    world.orchestrator.register(Arc::new(
        StubIndexer::new(1, "alpha", "https://alpha.example.com").with_releases(vec![
            torrent_release("Movie.2024.1080p.WEB-DL.DDP5.1-GROUP", 1, "alpha", 4 * GB, 40),
            torrent_release("Movie.2024.1080p.CAM-GROUP", 1, "alpha", 3 * GB / 2, 90),
        ]),
    ));

    let movie = Movie::new(550, "Movie", "best").with_year(2024);
    world.store.upsert(&movie).await.unwrap();

    let task = MissingContentTask::new(world.deps.clone());
    let run_id = Uuid::new_v4();
    let summary = task.run(run_id, &CancellationToken::new()).await.unwrap();

    assert_eq!(summary.considered, 1);
    assert_eq!(summary.grabbed, 1);

    let queued = QueueRepository::list(world.store.as_ref(), None).await.unwrap();
    assert_eq!(queued.len(), 1);
    assert!(queued[0].title.contains("WEB-DL"));
    assert_eq!(world.client.added_titles().len(), 1);

    let rows = world.store.items_for_run(run_id).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, HistoryStatus::Grabbed);
    assert_eq!(rows[0].releases_found, 2);
}

#[tokio::test]
async fn second_run_grabs_nothing() {
    // back-to-back runs stabilize: the cooldown stops the second search
    let world = world();
    world.orchestrator.register(Arc::new(
        StubIndexer::new(1, "alpha", "https://alpha.example.com").with_releases(vec![
            torrent_release("Movie.2024.1080p.WEB-DL.DDP5.1-GROUP", 1, "alpha", 4 * GB, 40),
        ]),
    ));

    let movie = Movie::new(550, "Movie", "best").with_year(2024);
    world.store.upsert(&movie).await.unwrap();

    let task = MissingContentTask::new(world.deps.clone());
    let first = task
        .run(Uuid::new_v4(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(first.grabbed, 1);

    let second = task
        .run(Uuid::new_v4(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(second.grabbed, 0);
    assert_eq!(world.client.added_titles().len(), 1);
}

#[tokio::test]
async fn remux_upgrade_over_webdl_is_accepted() {
    let world = world();
    world.orchestrator.register(Arc::new(
        StubIndexer::new(1, "alpha", "https://alpha.example.com").with_releases(vec![
            torrent_release(
                "Movie.2024.2160p.UHD.BluRay.REMUX.TrueHD.Atmos-GROUP",
                1,
                "alpha",
                55 * GB,
                25,
            ),
        ]),
    ));

    let mut profile = best();
    profile.id = "best-upgrades".to_string();
    profile.min_score_increment = 100;
    world.profiles.upsert(profile);

    let mut movie = Movie::new(550, "Movie", "best-upgrades").with_year(2024);
    let existing_title = "Movie.2024.1080p.WEB-DL-GROUP";
    let existing_score = world
        .scorer()
        .score(
            existing_title,
            &world.profiles.get("best-upgrades").unwrap(),
            Some(4 * GB),
            &ScoringContext::movie(),
        )
        .total_score;
    movie.set_file(MediaFile::new(existing_title, 4 * GB, Some(existing_score)));
    world.store.upsert(&movie).await.unwrap();

    let task = UpgradeTask::new(world.deps.clone(), false);
    let run_id = Uuid::new_v4();
    let summary = task.run(run_id, &CancellationToken::new()).await.unwrap();

    assert_eq!(summary.grabbed, 1);
    let queued = QueueRepository::list(world.store.as_ref(), None).await.unwrap();
    assert_eq!(queued.len(), 1);
    assert!(queued[0].is_upgrade);
    assert!(queued[0].title.contains("REMUX"));

    let rows = world.store.items_for_run(run_id).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].is_upgrade);
    assert!(rows[0].new_score.unwrap() > rows[0].old_score.unwrap());
}

#[tokio::test]
async fn downgrade_is_rejected_as_quality_not_better() {
    let world = world();
    world.orchestrator.register(Arc::new(
        StubIndexer::new(1, "alpha", "https://alpha.example.com").with_releases(vec![
            torrent_release("Movie.2024.1080p.WEB-DL-GROUP", 1, "alpha", 4 * GB, 80),
        ]),
    ));

    let mut movie = Movie::new(550, "Movie", "best").with_year(2024);
    movie.set_file(MediaFile::new(
        "Movie.2024.2160p.UHD.BluRay.REMUX.TrueHD.Atmos-GROUP",
        55 * GB,
        Some(18_000),
    ));
    world.store.upsert(&movie).await.unwrap();

    let task = UpgradeTask::new(world.deps.clone(), false);
    let run_id = Uuid::new_v4();
    let summary = task.run(run_id, &CancellationToken::new()).await.unwrap();

    assert_eq!(summary.grabbed, 0);
    assert!(QueueRepository::list(world.store.as_ref(), None)
        .await
        .unwrap()
        .is_empty());

    let rows = world.store.items_for_run(run_id).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, HistoryStatus::Found);
    assert_eq!(rows[0].error_message.as_deref(), Some("QUALITY_NOT_BETTER"));
}

#[tokio::test]
async fn item_at_cutoff_is_not_searched() {
    let world = world();
    let indexer = Arc::new(
        StubIndexer::new(1, "alpha", "https://alpha.example.com").with_releases(vec![
            torrent_release("Movie.2024.2160p.BluRay.REMUX-GROUP", 1, "alpha", 50 * GB, 10),
        ]),
    );
    world.orchestrator.register(indexer.clone());

    let mut profile = best();
    profile.id = "best-cutoff".to_string();
    profile.upgrade_until_score = 15_000;
    world.profiles.upsert(profile.clone());

    // 1080p BluRay remux with lossless audio already clears the cutoff
    let existing_title = "Movie.2024.1080p.BluRay.REMUX.DTS-HD.MA.5.1-GROUP";
    let existing_score = world
        .scorer()
        .score(existing_title, &profile, Some(30 * GB), &ScoringContext::movie())
        .total_score;
    assert!(existing_score >= 15_000, "existing score {}", existing_score);

    let mut movie = Movie::new(550, "Movie", "best-cutoff").with_year(2024);
    movie.set_file(MediaFile::new(existing_title, 30 * GB, Some(existing_score)));
    world.store.upsert(&movie).await.unwrap();

    let task = UpgradeTask::new(world.deps.clone(), false);
    let run_id = Uuid::new_v4();
    let summary = task.run(run_id, &CancellationToken::new()).await.unwrap();

    assert_eq!(summary.grabbed, 0);
    // rejected before any indexer was queried
    assert_eq!(indexer.call_count(), 0);

    let rows = world.store.items_for_run(run_id).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].error_message.as_deref(), Some("ALREADY_AT_CUTOFF"));

    // cutoff idempotence: later runs behave the same
    let again = task
        .run(Uuid::new_v4(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(again.grabbed, 0);
    assert_eq!(indexer.call_count(), 0);
}
