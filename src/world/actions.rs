//! Cross-group effects computed during the update pass and applied after
//! migration, so every group reads its neighbours' pre-tick state.

use serde::{Deserialize, Serialize};

use super::World;
use crate::{
    culture::{KnowledgeId, KNOWLEDGE_TIME_CONSTANT},
    group::GroupId,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum GroupAction {
    /// Moves a group's knowledge halfway toward `value` over `time_span`.
    KnowledgeTransfer {
        group: GroupId,
        knowledge: KnowledgeId,
        value: f64,
        time_span: f64,
    },
}

impl World {
    pub(crate) fn apply_group_action(&mut self, action: &GroupAction) {
        match *action {
            GroupAction::KnowledgeTransfer {
                group,
                knowledge,
                value,
                time_span,
            } => {
                let Some(group) = self.groups.get_mut(&group) else {
                    return;
                };
                if group.destroyed {
                    return;
                }
                let own = group.culture.knowledge_value(knowledge);
                if value <= own {
                    return;
                }
                let time_factor = time_span / (time_span + KNOWLEDGE_TIME_CONSTANT);
                let updated = own + (value - own) * 0.5 * time_factor;
                group.culture.set_knowledge_value(knowledge, updated);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{terrain::CellPos, world::tests::grassland_world};

    #[test]
    fn knowledge_transfer_moves_halfway_scaled_by_time() {
        let mut world = grassland_world(8, 4);
        let id = world
            .spawn_initial_group(CellPos::new(2, 1), 1000)
            .expect("spawn");
        let before = world
            .group(id)
            .map(|g| g.culture.knowledge_value(KnowledgeId::SocialOrganization))
            .unwrap_or_default();

        world.apply_group_action(&GroupAction::KnowledgeTransfer {
            group: id,
            knowledge: KnowledgeId::SocialOrganization,
            value: before + 400.0,
            time_span: KNOWLEDGE_TIME_CONSTANT,
        });

        let after = world
            .group(id)
            .map(|g| g.culture.knowledge_value(KnowledgeId::SocialOrganization))
            .unwrap_or_default();
        assert!((after - (before + 100.0)).abs() < 1e-9);
    }

    #[test]
    fn transfers_to_missing_groups_are_ignored() {
        let mut world = grassland_world(8, 4);
        world.apply_group_action(&GroupAction::KnowledgeTransfer {
            group: GroupId::new(7),
            knowledge: KnowledgeId::Agriculture,
            value: 500.0,
            time_span: 10.0,
        });
        assert_eq!(world.group_count(), 0);
    }
}
