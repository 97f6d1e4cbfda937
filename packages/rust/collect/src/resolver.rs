//! Cross-source entity resolution.
//!
//! Mentions are grouped by exact `(entity_type, canonical_form)`. A group with
//! two or more mentions becomes a [`CanonicalEntity`]; singletons are dropped.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, warn};

use conductor_shared::{CanonicalEntity, EntityMention};

type EntityKey = (String, String);

#[derive(Debug)]
struct Sighting {
    mention: EntityMention,
    /// Position of the mention's source in the plan; unknown sources rank last.
    source_rank: usize,
    seq: u64,
}

#[derive(Debug, Default)]
struct ResolverState {
    groups: HashMap<EntityKey, Vec<Sighting>>,
    next_seq: u64,
    mentions: usize,
}

/// Accumulates mentions from concurrently running sources for one plan run.
#[derive(Debug, Default)]
pub struct EntityResolver {
    /// First position of each source in the plan.
    source_rank: HashMap<String, usize>,
    unknown_rank: usize,
    state: Mutex<ResolverState>,
}

impl EntityResolver {
    /// A resolver that breaks ties by arrival order only.
    pub fn new() -> Self {
        Self::default()
    }

    /// A resolver that breaks ties by the position of each mention's source in
    /// `source_order`, then by arrival. Makes resolution independent of which
    /// source task happened to finish first.
    pub fn with_source_order(source_order: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut source_rank = HashMap::new();
        let mut unknown_rank = 0;
        for (position, source_id) in source_order.into_iter().enumerate() {
            source_rank.entry(source_id.into()).or_insert(position);
            unknown_rank = position + 1;
        }
        Self {
            source_rank,
            unknown_rank,
            state: Mutex::default(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ResolverState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn rank_of(&self, source_id: &str) -> usize {
        self.source_rank
            .get(source_id)
            .copied()
            .unwrap_or(self.unknown_rank)
    }

    /// Add one mention. Mentions with a confidence outside `[0, 1]` are ignored.
    pub fn register(&self, mention: EntityMention) {
        if !(0.0..=1.0).contains(&mention.confidence) {
            warn!(
                source_id = %mention.source_id,
                record_id = %mention.record_id,
                confidence = mention.confidence,
                "ignoring entity mention with invalid confidence"
            );
            return;
        }

        let source_rank = self.rank_of(&mention.source_id);
        let key = (mention.entity_type.clone(), mention.canonical_form.clone());

        let mut state = self.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        state.mentions += 1;
        state.groups.entry(key).or_default().push(Sighting {
            mention,
            source_rank,
            seq,
        });
    }

    pub fn register_all(&self, mentions: impl IntoIterator<Item = EntityMention>) {
        for mention in mentions {
            self.register(mention);
        }
    }

    /// Mentions accepted so far.
    pub fn mention_count(&self) -> usize {
        self.lock().mentions
    }

    /// Distinct `(entity_type, canonical_form)` keys seen so far.
    pub fn key_count(&self) -> usize {
        self.lock().groups.len()
    }

    /// Resolve every key with at least two mentions.
    ///
    /// The representative is the highest-confidence mention, ties going to
    /// the earliest sighting. `contributing_sources` lists each source once,
    /// in sighting order. Output is ordered by each key's first sighting.
    pub fn resolve(&self) -> Vec<CanonicalEntity> {
        let state = self.lock();

        let mut resolved: Vec<((usize, u64), CanonicalEntity)> = state
            .groups
            .values()
            .filter(|sightings| sightings.len() >= 2)
            .map(|sightings| {
                let mut ordered: Vec<&Sighting> = sightings.iter().collect();
                ordered.sort_by_key(|s| (s.source_rank, s.seq));

                let mut representative = ordered[0];
                for &sighting in &ordered[1..] {
                    if sighting.mention.confidence > representative.mention.confidence {
                        representative = sighting;
                    }
                }

                let mut contributing_sources: Vec<String> = Vec::new();
                for sighting in &ordered {
                    if !contributing_sources.contains(&sighting.mention.source_id) {
                        contributing_sources.push(sighting.mention.source_id.clone());
                    }
                }

                let first = (ordered[0].source_rank, ordered[0].seq);
                let entity = CanonicalEntity {
                    entity_type: representative.mention.entity_type.clone(),
                    canonical_form: representative.mention.canonical_form.clone(),
                    confidence: representative.mention.confidence,
                    contributing_sources,
                    mention_count: ordered.len(),
                };
                (first, entity)
            })
            .collect();

        resolved.sort_by_key(|(first, _)| *first);

        debug!(
            keys = state.groups.len(),
            mentions = state.mentions,
            canonical = resolved.len(),
            "resolved entities"
        );
        resolved.into_iter().map(|(_, entity)| entity).collect()
    }
}
