//! Grab service: the last gate between a chosen release and the download
//! client
//!
//! Re-checks the protocol/blocklist/size specs, consults the delay profile,
//! and either dispatches to the client (under the host rate limiter) or
//! parks the release in the pending queue, superseding any lower-scoring
//! pending entry for the same content.

use chrono::Utc;
use cinephage_core::{
    AddDownload, BlockReason, BlocklistEntry, BlocklistRepository, CinephageError, ContentRef,
    DownloadClient, DownloadPayload, PendingRelease, PendingReleaseRepository, QueueItem,
    QueueRepository, Release, Result,
};
use cinephage_decision::{
    Decision, DelaySpec, EvaluationContext, ItemContext, RejectionReason, ScoringProfile,
    ScoringResult,
};
use cinephage_indexers::{base_domain, RateLimiterRegistry, SearchOrchestrator};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct GrabConfig {
    /// Category handed to the download client
    pub category: Option<String>,
    /// The client's URL; its registrable domain keys the host rate bucket
    pub client_url: String,
}

impl Default for GrabConfig {
    fn default() -> Self {
        Self {
            category: Some("cinephage".to_string()),
            client_url: "http://localhost:8080".to_string(),
        }
    }
}

/// What the grab attempt did
#[derive(Debug, Clone)]
pub enum GrabOutcome {
    /// Dispatched to the client
    Queued(QueueItem),
    /// Parked in the pending queue until its delay elapses
    Delayed(PendingRelease),
    /// Refused by a last-chance spec
    Rejected(Decision),
}

pub struct GrabService {
    queue: Arc<dyn QueueRepository>,
    pending: Arc<dyn PendingReleaseRepository>,
    blocklist: Arc<dyn BlocklistRepository>,
    delay_spec: DelaySpec,
    client: Arc<dyn DownloadClient>,
    limiter: Arc<RateLimiterRegistry>,
    client_host: String,
    category: Option<String>,
    /// Fallback for releases that carry neither a magnet nor a direct url
    orchestrator: Option<Arc<SearchOrchestrator>>,
}

impl GrabService {
    pub fn new(
        config: GrabConfig,
        queue: Arc<dyn QueueRepository>,
        pending: Arc<dyn PendingReleaseRepository>,
        blocklist: Arc<dyn BlocklistRepository>,
        delay_spec: DelaySpec,
        client: Arc<dyn DownloadClient>,
        limiter: Arc<RateLimiterRegistry>,
    ) -> Self {
        let client_host =
            base_domain(&config.client_url).unwrap_or_else(|| config.client_url.clone());
        Self {
            queue,
            pending,
            blocklist,
            delay_spec,
            client,
            limiter,
            client_host,
            category: config.category,
            orchestrator: None,
        }
    }

    /// Route payload fetches through the orchestrator when a release has no
    /// magnet or direct url of its own.
    pub fn with_orchestrator(mut self, orchestrator: Arc<SearchOrchestrator>) -> Self {
        self.orchestrator = Some(orchestrator);
        self
    }

    /// Grab a release for an item: final spec re-check, delay evaluation,
    /// then dispatch.
    pub async fn grab(
        &self,
        release: &Release,
        score: &ScoringResult,
        item: &ItemContext,
        profile: &ScoringProfile,
        is_upgrade: bool,
        token: &CancellationToken,
    ) -> Result<GrabOutcome> {
        let content = item.content_ref();
        self.grab_for_content(release, score, item, content, profile, is_upgrade, token)
            .await
    }

    /// Grab with an explicit content link. Season-pack grabs link every
    /// episode the pack covers, not just the representative one.
    #[allow(clippy::too_many_arguments)]
    pub async fn grab_for_content(
        &self,
        release: &Release,
        score: &ScoringResult,
        item: &ItemContext,
        content: ContentRef,
        profile: &ScoringProfile,
        is_upgrade: bool,
        token: &CancellationToken,
    ) -> Result<GrabOutcome> {
        if let Some(decision) = self
            .final_checks(release, score, &content, profile)
            .await?
        {
            return Ok(GrabOutcome::Rejected(decision));
        }

        let ctx = EvaluationContext::new(item.clone())
            .with_profile(profile.clone())
            .with_candidate(release.clone(), score.clone());
        let verdict = self.delay_spec.verdict(&ctx).await?;

        if verdict.should_delay {
            let process_at = verdict.process_at.unwrap_or_else(Utc::now);
            return self
                .park_pending(release, score, content, profile, is_upgrade, process_at)
                .await;
        }

        let queue_item = self.dispatch(release, content, is_upgrade, token).await?;
        Ok(GrabOutcome::Queued(queue_item))
    }

    /// Final protocol/blocklist/size/ban checks before anything is
    /// dispatched or parked.
    async fn final_checks(
        &self,
        release: &Release,
        score: &ScoringResult,
        content: &ContentRef,
        profile: &ScoringProfile,
    ) -> Result<Option<Decision>> {
        if !profile.allows_protocol(release.protocol) {
            return Ok(Some(Decision::reject_with(
                RejectionReason::ProtocolNotAllowed,
                release.protocol.to_string(),
            )));
        }
        if score.is_banned {
            return Ok(Some(Decision::reject_with(
                RejectionReason::BelowMinScore,
                format!("banned: {}", score.banned_reasons.join(", ")),
            )));
        }
        if score.size_rejected {
            return Ok(Some(Decision::reject_with(
                RejectionReason::SizeRejected,
                score
                    .size_rejection_reason
                    .clone()
                    .unwrap_or_else(|| "size outside the profile window".to_string()),
            )));
        }
        if self.blocklist.is_blocked(release, content).await? {
            return Ok(Some(Decision::reject(RejectionReason::Blocklisted)));
        }
        Ok(None)
    }

    /// Insert a pending row, superseding an existing lower-scoring one
    async fn park_pending(
        &self,
        release: &Release,
        score: &ScoringResult,
        content: ContentRef,
        profile: &ScoringProfile,
        is_upgrade: bool,
        process_at: chrono::DateTime<Utc>,
    ) -> Result<GrabOutcome> {
        let new_row = PendingRelease::new(
            release.clone(),
            content.clone(),
            profile.id.clone(),
            score.total_score,
            process_at,
        )
        .with_upgrade(is_upgrade);

        if let Some(mut existing) = self.pending.find_pending_for_content(&content).await? {
            if existing.score >= score.total_score {
                debug!(
                    title = %release.title,
                    existing_score = existing.score,
                    candidate_score = score.total_score,
                    "pending release already queued with an equal or better score"
                );
                return Ok(GrabOutcome::Rejected(Decision::reject_with(
                    RejectionReason::QualityNotBetter,
                    "a pending release with an equal or better score exists",
                )));
            }
            existing.mark_superseded(new_row.id);
            self.pending.update(&existing).await?;
            info!(
                old = %existing.release.title,
                new = %release.title,
                "pending release superseded by a better score"
            );
        }

        self.pending.insert(&new_row).await?;
        info!(
            title = %release.title,
            process_at = %new_row.process_at,
            "release delayed into the pending queue"
        );
        Ok(GrabOutcome::Delayed(new_row))
    }

    /// Hand the release to the download client and create the queue row.
    /// Used directly by the pending processor, which must not re-delay.
    pub async fn dispatch(
        &self,
        release: &Release,
        content: ContentRef,
        is_upgrade: bool,
        token: &CancellationToken,
    ) -> Result<QueueItem> {
        let payload = match payload_for(release) {
            Ok(payload) => payload,
            Err(err) => match &self.orchestrator {
                Some(orchestrator) => orchestrator.download(release).await?,
                None => return Err(err),
            },
        };

        self.limiter.acquire_host(&self.client_host, token).await?;

        let added = self
            .client
            .add(AddDownload {
                payload,
                category: self.category.clone(),
                title: release.title.clone(),
            })
            .await?;

        let info_hash = added.info_hash.clone().or_else(|| release.info_hash.clone());
        let mut queue_item = QueueItem::new(
            self.client.id(),
            release.title.clone(),
            content,
            release.protocol,
            release.indexer_id,
            release.size_bytes,
        )
        .with_download_id(added.download_id)
        .with_upgrade(is_upgrade);
        queue_item.info_hash = info_hash;

        self.queue.insert(&queue_item).await?;
        info!(
            title = %release.title,
            client = self.client.name(),
            queue_id = %queue_item.id,
            "release dispatched to download client"
        );
        Ok(queue_item)
    }

    /// Blocklist a release that failed to download or import
    pub async fn blocklist_failure(
        &self,
        release: &Release,
        content: ContentRef,
        reason: BlockReason,
        message: impl Into<String>,
        ttl: chrono::Duration,
    ) -> Result<()> {
        let entry = BlocklistEntry::new(release, content, reason)
            .with_message(message)
            .with_expiry(Utc::now() + ttl);
        warn!(title = %release.title, reason = %reason, "release blocklisted");
        self.blocklist.insert(&entry).await
    }
}

fn payload_for(release: &Release) -> Result<DownloadPayload> {
    if let Some(magnet) = &release.magnet_url {
        return Ok(DownloadPayload::Magnet {
            uri: magnet.clone(),
        });
    }
    if let Some(url) = &release.download_url {
        return Ok(DownloadPayload::Url { url: url.clone() });
    }
    Err(CinephageError::ValidationError {
        field: "release".to_string(),
        message: format!("release '{}' has no download url or magnet", release.title),
    })
}
