//! Culture model: activities, skills, knowledges and discoveries of a group
//!
//! Values are plain numbers. Skills live in [0, 1]; knowledges use a scale
//! where 100 equals 1.0 of scaled value.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

pub const SKILL_TIME_CONSTANT: f64 = 500.0;
pub const KNOWLEDGE_TIME_CONSTANT: f64 = 2500.0;
pub const MAX_KNOWLEDGE_VALUE: f64 = 10000.0;
pub const BASE_KNOWLEDGE_VALUE: f64 = 100.0;
pub const MIN_KNOWLEDGE_TRANSFER_VALUE: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityId {
    Foraging,
    Farming,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeId {
    SocialOrganization,
    Agriculture,
    Shipbuilding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryId {
    Tribalism,
    BoatMaking,
    PlantCultivation,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub value: f64,
    pub target: f64,
}

impl Skill {
    fn new(value: f64) -> Self {
        Self {
            value,
            target: value,
        }
    }

    pub fn adaptation_level(&self) -> f64 {
        (1.0 - (self.target - self.value).abs()).clamp(0.0, 1.0)
    }

    fn approach(&mut self, target: f64, time_span: f64) {
        self.target = target;
        let factor = time_span / (time_span + SKILL_TIME_CONSTANT);
        self.value = (self.value + (target - self.value) * factor).clamp(0.0, 1.0);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Knowledge {
    pub value: f64,
    pub limit: f64,
}

impl Knowledge {
    fn new(value: f64) -> Self {
        Self {
            value,
            limit: value.max(BASE_KNOWLEDGE_VALUE),
        }
    }

    pub fn scaled_value(&self) -> f64 {
        self.value * 0.01
    }

    pub fn progress_level(&self) -> f64 {
        if self.limit <= 0.0 {
            return 1.0;
        }
        (self.value / self.limit).clamp(0.0, 1.0)
    }
}

/// What the culture update needs to know about the group's surroundings.
#[derive(Debug, Clone, Default)]
pub struct CultureEnvironment {
    pub population: f64,
    pub biome_presences: BTreeMap<String, f64>,
    pub ocean_presence: f64,
    pub arability: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Culture {
    activities: BTreeMap<ActivityId, f64>,
    biome_skills: BTreeMap<String, Skill>,
    seafaring: Option<Skill>,
    knowledges: BTreeMap<KnowledgeId, Knowledge>,
    discoveries: BTreeSet<DiscoveryId>,
    discoveries_to_find: BTreeSet<DiscoveryId>,
}

impl Culture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn activity_contribution(&self, activity: ActivityId) -> f64 {
        self.activities.get(&activity).copied().unwrap_or(0.0)
    }

    pub fn add_activity(&mut self, activity: ActivityId, contribution: f64) {
        self.activities.entry(activity).or_insert(contribution);
    }

    pub fn biome_skill(&self, biome: &str) -> Option<f64> {
        self.biome_skills.get(biome).map(|s| s.value)
    }

    pub fn add_biome_skill(&mut self, biome: &str, value: f64) {
        self.biome_skills
            .entry(biome.to_string())
            .or_insert_with(|| Skill::new(value));
    }

    pub fn seafaring(&self) -> Option<f64> {
        self.seafaring.map(|s| s.value)
    }

    pub fn add_seafaring(&mut self) {
        if self.seafaring.is_none() {
            self.seafaring = Some(Skill::new(0.0));
        }
    }

    pub fn knowledge(&self, id: KnowledgeId) -> Option<&Knowledge> {
        self.knowledges.get(&id)
    }

    pub fn knowledge_value(&self, id: KnowledgeId) -> f64 {
        self.knowledges.get(&id).map(|k| k.value).unwrap_or(0.0)
    }

    pub fn knowledges(&self) -> impl Iterator<Item = (KnowledgeId, &Knowledge)> {
        self.knowledges.iter().map(|(id, k)| (*id, k))
    }

    pub fn add_knowledge(&mut self, id: KnowledgeId, value: f64) {
        self.knowledges
            .entry(id)
            .or_insert_with(|| Knowledge::new(value));
    }

    pub fn set_knowledge_value(&mut self, id: KnowledgeId, value: f64) {
        if let Some(knowledge) = self.knowledges.get_mut(&id) {
            knowledge.value = value.clamp(0.0, MAX_KNOWLEDGE_VALUE);
        }
    }

    pub fn has_discovery(&self, id: DiscoveryId) -> bool {
        self.discoveries.contains(&id)
    }

    pub fn has_discovery_or_pending(&self, id: DiscoveryId) -> bool {
        self.discoveries.contains(&id) || self.discoveries_to_find.contains(&id)
    }

    pub fn add_discovery_to_find(&mut self, id: DiscoveryId) {
        if !self.discoveries.contains(&id) {
            self.discoveries_to_find.insert(id);
        }
    }

    pub fn discoveries(&self) -> impl Iterator<Item = DiscoveryId> + '_ {
        self.discoveries.iter().copied()
    }

    /// Advances skills and knowledges by `time_span` years. `jitter` is a
    /// uniform draw in [0, 1) that scales knowledge growth.
    pub fn update(&mut self, env: &CultureEnvironment, time_span: f64, jitter: f64) {
        for (biome, skill) in self.biome_skills.iter_mut() {
            let target = env.biome_presences.get(biome).copied().unwrap_or(0.0);
            skill.approach(target, time_span);
        }
        if let Some(seafaring) = self.seafaring.as_mut() {
            seafaring.approach(env.ocean_presence, time_span);
        }

        let factor = time_span / (time_span + KNOWLEDGE_TIME_CONSTANT) * (0.5 + 0.5 * jitter);
        for (id, knowledge) in self.knowledges.iter_mut() {
            let limit = match id {
                KnowledgeId::SocialOrganization => {
                    BASE_KNOWLEDGE_VALUE + 10.0 * env.population.max(0.0).sqrt()
                }
                KnowledgeId::Agriculture => BASE_KNOWLEDGE_VALUE + 1900.0 * env.arability,
                KnowledgeId::Shipbuilding => BASE_KNOWLEDGE_VALUE + 1900.0 * env.ocean_presence,
            }
            .min(MAX_KNOWLEDGE_VALUE);
            knowledge.limit = limit;
            knowledge.value = (knowledge.value + (limit - knowledge.value) * factor)
                .clamp(0.0, MAX_KNOWLEDGE_VALUE);
        }
    }

    /// Consolidates pending discoveries and rebalances activity contributions.
    /// Returns the discoveries that were made this step.
    pub fn post_update(&mut self, arability: f64) -> Vec<DiscoveryId> {
        let found: Vec<DiscoveryId> = std::mem::take(&mut self.discoveries_to_find)
            .into_iter()
            .collect();
        for discovery in &found {
            self.discoveries.insert(*discovery);
            match discovery {
                DiscoveryId::BoatMaking => {
                    self.add_knowledge(KnowledgeId::Shipbuilding, BASE_KNOWLEDGE_VALUE)
                }
                DiscoveryId::PlantCultivation => {
                    self.add_knowledge(KnowledgeId::Agriculture, BASE_KNOWLEDGE_VALUE);
                    self.add_activity(ActivityId::Farming, 0.0);
                }
                DiscoveryId::Tribalism => {}
            }
        }

        if self.activities.contains_key(&ActivityId::Farming) {
            let agriculture = self
                .knowledge(KnowledgeId::Agriculture)
                .map(|k| k.scaled_value())
                .unwrap_or(0.0);
            let farming_weight = agriculture.max(0.0).sqrt() * arability;
            let total = 1.0 + farming_weight;
            self.activities.insert(ActivityId::Foraging, 1.0 / total);
            self.activities.insert(ActivityId::Farming, farming_weight / total);
        }

        found
    }

    /// Blends `other` into this culture, `percent` being the share of `other`.
    pub fn merge(&mut self, other: &Culture, percent: f64) {
        let keep = 1.0 - percent;

        merge_maps(
            &mut self.activities,
            &other.activities,
            percent,
            |v| *v,
            |v, w| *v = w,
        );
        let total: f64 = self.activities.values().sum();
        if total > 0.0 {
            for value in self.activities.values_mut() {
                *value /= total;
            }
        }

        merge_maps(
            &mut self.biome_skills,
            &other.biome_skills,
            percent,
            |s| s.value,
            |s, v| s.value = v,
        );
        self.seafaring = match (self.seafaring, other.seafaring) {
            (Some(mut own), Some(incoming)) => {
                own.value = own.value * keep + incoming.value * percent;
                Some(own)
            }
            (Some(mut own), None) => {
                own.value *= keep;
                Some(own)
            }
            (None, Some(mut incoming)) => {
                incoming.value *= percent;
                Some(incoming)
            }
            (None, None) => None,
        };
        merge_maps(
            &mut self.knowledges,
            &other.knowledges,
            percent,
            |k| k.value,
            |k, v| k.value = v,
        );

        self.discoveries.extend(other.discoveries.iter().copied());
        for pending in &other.discoveries_to_find {
            self.add_discovery_to_find(*pending);
        }
    }

    /// Pulls every skill and knowledge this culture shares with the polity
    /// culture toward the polity's value.
    pub fn apply_polity_influence(&mut self, polity: &Culture, influence: f64, time_span: f64) {
        let factor = influence * time_span / (time_span + SKILL_TIME_CONSTANT);
        for (biome, skill) in self.biome_skills.iter_mut() {
            if let Some(target) = polity.biome_skill(biome) {
                skill.value = (skill.value + (target - skill.value) * factor).clamp(0.0, 1.0);
            }
        }
        if let (Some(own), Some(target)) = (self.seafaring.as_mut(), polity.seafaring()) {
            own.value = (own.value + (target - own.value) * factor).clamp(0.0, 1.0);
        }
        for (id, knowledge) in self.knowledges.iter_mut() {
            let target = polity.knowledge_value(*id);
            if polity.knowledge(*id).is_some() {
                knowledge.value = (knowledge.value + (target - knowledge.value) * factor)
                    .clamp(0.0, MAX_KNOWLEDGE_VALUE);
            }
        }
    }

    pub fn minimum_skill_adaptation_level(&self) -> f64 {
        self.biome_skills
            .values()
            .chain(self.seafaring.iter())
            .map(Skill::adaptation_level)
            .fold(1.0, f64::min)
    }

    pub fn minimum_knowledge_progress_level(&self) -> f64 {
        self.knowledges
            .values()
            .map(Knowledge::progress_level)
            .fold(1.0, f64::min)
    }

    /// Weighted mean of several cultures. Discoveries are the union.
    pub fn weighted_average<'a>(members: impl IntoIterator<Item = (&'a Culture, f64)>) -> Culture {
        let mut result = Culture::new();
        let mut accumulated = 0.0;
        for (culture, weight) in members {
            if weight <= 0.0 {
                continue;
            }
            accumulated += weight;
            result.merge(culture, weight / accumulated);
        }
        result
    }
}

fn merge_maps<K: Ord + Clone, V: Clone>(
    own: &mut BTreeMap<K, V>,
    incoming: &BTreeMap<K, V>,
    percent: f64,
    get: impl Fn(&V) -> f64,
    set: impl Fn(&mut V, f64),
) {
    let keep = 1.0 - percent;
    for (key, value) in own.iter_mut() {
        let merged = match incoming.get(key) {
            Some(other) => get(value) * keep + get(other) * percent,
            None => get(value) * keep,
        };
        set(value, merged);
    }
    for (key, other) in incoming {
        if own.contains_key(key) {
            continue;
        }
        let mut value = other.clone();
        set(&mut value, get(other) * percent);
        own.insert(key.clone(), value);
    }
}
