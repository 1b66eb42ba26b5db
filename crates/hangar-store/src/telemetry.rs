use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use hangar_core::ids::{SampleId, SessionId};
use hangar_core::time::{utc_flexible, utc_flexible_opt};

use crate::error::StoreError;
use crate::store::Store;

/// One timestamped numeric channel reading. Append-only: samples are never
/// updated or deleted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Sample {
    pub id: SampleId,
    pub session_id: SessionId,
    #[serde(with = "utc_flexible")]
    pub timestamp: DateTime<Utc>,
    pub channel: String,
    pub value: f64,
    pub unit: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SampleDraft {
    #[serde(with = "utc_flexible")]
    pub timestamp: DateTime<Utc>,
    pub channel: String,
    pub value: f64,
    #[serde(default)]
    pub unit: Option<String>,
}

/// Query filters; results are descending by timestamp, truncated to `limit`.
#[derive(Clone, Debug, Deserialize)]
pub struct TelemetryQuery {
    pub channel: Option<String>,
    #[serde(default, with = "utc_flexible_opt")]
    pub from: Option<DateTime<Utc>>,
    #[serde(default, with = "utc_flexible_opt")]
    pub to: Option<DateTime<Utc>>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    1000
}

impl Default for TelemetryQuery {
    fn default() -> Self {
        Self {
            channel: None,
            from: None,
            to: None,
            limit: default_limit(),
        }
    }
}

pub struct TelemetryRepo {
    store: Store,
}

impl TelemetryRepo {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    #[instrument(skip(self, draft), fields(session_id = %session_id))]
    pub fn create(&self, session_id: &SessionId, draft: SampleDraft) -> Result<Sample, StoreError> {
        self.store.require_session(session_id)?;
        let sample = build_sample(session_id, draft);
        self.store.inner.telemetry.write().push(sample.clone());
        Ok(sample)
    }

    /// Batch append. The session check happens once up front; individual
    /// appends cannot fail, so no rollback is needed.
    #[instrument(skip(self, drafts), fields(session_id = %session_id, count = drafts.len()))]
    pub fn create_batch(
        &self,
        session_id: &SessionId,
        drafts: Vec<SampleDraft>,
    ) -> Result<usize, StoreError> {
        self.store.require_session(session_id)?;
        let mut telemetry = self.store.inner.telemetry.write();
        let count = drafts.len();
        for draft in drafts {
            telemetry.push(build_sample(session_id, draft));
        }
        Ok(count)
    }

    /// Query samples descending by timestamp; exact ties are broken by
    /// latest insertion first.
    pub fn query(
        &self,
        session_id: &SessionId,
        query: &TelemetryQuery,
    ) -> Result<Vec<Sample>, StoreError> {
        self.store.require_session(session_id)?;

        let telemetry = self.store.inner.telemetry.read();
        let mut matched: Vec<(usize, Sample)> = telemetry
            .iter()
            .enumerate()
            .filter(|(_, s)| s.session_id == *session_id)
            .filter(|(_, s)| {
                query
                    .channel
                    .as_ref()
                    .map_or(true, |c| s.channel == *c)
            })
            .filter(|(_, s)| query.from.map_or(true, |from| s.timestamp >= from))
            .filter(|(_, s)| query.to.map_or(true, |to| s.timestamp <= to))
            .map(|(i, s)| (i, s.clone()))
            .collect();
        drop(telemetry);

        matched.sort_by(|(ia, a), (ib, b)| b.timestamp.cmp(&a.timestamp).then_with(|| ib.cmp(ia)));
        matched.truncate(query.limit);
        Ok(matched.into_iter().map(|(_, s)| s).collect())
    }

    /// The maximum-timestamp sample for a channel; if two samples tie
    /// exactly, the most recently inserted one wins.
    pub fn latest(&self, session_id: &SessionId, channel: &str) -> Result<Sample, StoreError> {
        self.store.require_session(session_id)?;

        self.store
            .inner
            .telemetry
            .read()
            .iter()
            .enumerate()
            .filter(|(_, s)| s.session_id == *session_id && s.channel == channel)
            .max_by(|(ia, a), (ib, b)| a.timestamp.cmp(&b.timestamp).then_with(|| ia.cmp(ib)))
            .map(|(_, s)| s.clone())
            .ok_or_else(|| StoreError::NotFound(format!("no telemetry for channel {channel}")))
    }

    /// Distinct channel names in the session, lexicographically sorted.
    pub fn channels(&self, session_id: &SessionId) -> Result<Vec<String>, StoreError> {
        self.store.require_session(session_id)?;

        let channels: BTreeSet<String> = self
            .store
            .inner
            .telemetry
            .read()
            .iter()
            .filter(|s| s.session_id == *session_id)
            .map(|s| s.channel.clone())
            .collect();
        Ok(channels.into_iter().collect())
    }
}

fn build_sample(session_id: &SessionId, draft: SampleDraft) -> Sample {
    Sample {
        id: SampleId::new(),
        session_id: session_id.clone(),
        timestamp: draft.timestamp,
        channel: draft.channel,
        value: draft.value,
        unit: draft.unit,
    }
}
