use signal_types::{Signal, SignalPack, SignalType};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

/// Append-only per-channel signal history plus a permanent dedup set of
/// seen ids. Unlike the station's `broadcasted` cache (§3, 30 s eviction),
/// the recorder never forgets an id — it is the archival tier, and a
/// signal recorded once must never be recorded twice even across a long
/// replay (recorder/recorderserver.go's `doRecord`).
pub struct SignalCache {
    channel_signals: RwLock<HashMap<String, Vec<Signal>>>,
    seen_ids: RwLock<HashSet<String>>,
}

impl SignalCache {
    pub fn new() -> Self {
        Self {
            channel_signals: RwLock::new(HashMap::new()),
            seen_ids: RwLock::new(HashSet::new()),
        }
    }

    /// Appends `pack.signal` to its channel's history, skipping `BLANK`
    /// signals and anything already recorded.
    pub async fn record(&self, pack: &SignalPack) {
        if matches!(pack.signal.kind, SignalType::Blank) {
            return;
        }
        {
            let mut seen = self.seen_ids.write().await;
            if !seen.insert(pack.signal.id.clone()) {
                return;
            }
        }
        let mut channels = self.channel_signals.write().await;
        channels.entry(pack.cid.clone()).or_default().push(pack.signal.clone());
    }

    pub async fn fetch(&self, cid: &str, lastfrom: &str) -> Vec<Signal> {
        let channels = self.channel_signals.read().await;
        match channels.get(cid) {
            Some(history) => crate::fetch::slice_from(history, lastfrom),
            None => Vec::new(),
        }
    }
}

impl Default for SignalCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pack(cid: &str, id: &str, text: &str) -> SignalPack {
        SignalPack::originate(Signal::new(id, "pid", SignalType::Signal, text), cid, 0)
    }

    #[tokio::test]
    async fn duplicate_signal_id_is_recorded_once() {
        let cache = SignalCache::new();
        cache.record(&pack("X", "id1", "hi")).await;
        cache.record(&pack("X", "id1", "hi")).await;
        assert_eq!(cache.fetch("X", "").await.len(), 1);
    }

    #[tokio::test]
    async fn blank_signals_are_never_recorded() {
        let cache = SignalCache::new();
        let mut blank = pack("X", "id1", "");
        blank.signal.kind = SignalType::Blank;
        cache.record(&blank).await;
        assert!(cache.fetch("X", "").await.is_empty());
    }

    #[tokio::test]
    async fn fetch_on_unknown_channel_is_empty() {
        let cache = SignalCache::new();
        assert!(cache.fetch("nope", "").await.is_empty());
    }
}
