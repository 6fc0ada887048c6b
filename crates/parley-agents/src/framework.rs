//! A directed attack graph over arguments.
//!
//! The graph stores both directions of every edge so that "who attacks this
//! argument" and "what does this argument attack" are single lookups.
//! Argument [`MOTION`] is the opening claim to right of way.

use std::collections::{BTreeMap, BTreeSet};

use parley_types::{AgentProperties, ArgumentId};

use crate::argument::Argument;
use crate::error::AgentError;

/// The opening argument of every negotiation.
pub const MOTION: ArgumentId = ArgumentId::new(0);

/// Arguments plus the attack relation between them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgumentationFramework {
    arguments: BTreeMap<ArgumentId, Argument>,
    /// Attacker to the arguments it attacks.
    attacks: BTreeMap<ArgumentId, BTreeSet<ArgumentId>>,
    /// Attacked argument to its attackers.
    attacked_by: BTreeMap<ArgumentId, BTreeSet<ArgumentId>>,
}

impl ArgumentationFramework {
    /// An empty framework.
    pub const fn new() -> Self {
        Self {
            arguments: BTreeMap::new(),
            attacks: BTreeMap::new(),
            attacked_by: BTreeMap::new(),
        }
    }

    /// Register an argument.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::DuplicateArgument`] if the id is taken.
    pub fn add_argument(&mut self, argument: Argument) -> Result<(), AgentError> {
        if self.arguments.contains_key(&argument.id) {
            return Err(AgentError::DuplicateArgument(argument.id));
        }
        self.arguments.insert(argument.id, argument);
        Ok(())
    }

    /// Record that `attacker` attacks `attacked`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::UnknownArgument`] if either side is not
    /// registered.
    pub fn add_attack(&mut self, attacker: ArgumentId, attacked: ArgumentId) -> Result<(), AgentError> {
        for id in [attacker, attacked] {
            if !self.arguments.contains_key(&id) {
                return Err(AgentError::UnknownArgument(id));
            }
        }
        self.attacks.entry(attacker).or_default().insert(attacked);
        self.attacked_by.entry(attacked).or_default().insert(attacker);
        Ok(())
    }

    /// Look up an argument.
    pub fn argument(&self, id: ArgumentId) -> Option<&Argument> {
        self.arguments.get(&id)
    }

    /// Every registered argument, by id.
    pub fn arguments(&self) -> impl Iterator<Item = &Argument> {
        self.arguments.values()
    }

    /// Number of registered arguments.
    pub fn len(&self) -> usize {
        self.arguments.len()
    }

    /// Whether no arguments are registered.
    pub fn is_empty(&self) -> bool {
        self.arguments.is_empty()
    }

    /// The arguments that attack `id`, in ascending order.
    pub fn arguments_that_attack(&self, id: ArgumentId) -> impl Iterator<Item = ArgumentId> + '_ {
        self.attacked_by.get(&id).into_iter().flatten().copied()
    }

    /// The arguments `id` attacks, in ascending order.
    pub fn attacked_by(&self, id: ArgumentId) -> impl Iterator<Item = ArgumentId> + '_ {
        self.attacks.get(&id).into_iter().flatten().copied()
    }

    /// Whether `attacker` attacks `attacked`.
    pub fn attacks(&self, attacker: ArgumentId, attacked: ArgumentId) -> bool {
        self.attacks
            .get(&attacker)
            .is_some_and(|targets| targets.contains(&attacked))
    }

    /// Attackers of `against` that `claimant` can put forward against
    /// `opponent` and has not used yet this round.
    pub fn live_rebuttals(
        &self,
        against: ArgumentId,
        claimant: AgentProperties,
        opponent: AgentProperties,
        used: &BTreeSet<ArgumentId>,
    ) -> Vec<ArgumentId> {
        self.arguments_that_attack(against)
            .filter(|id| !used.contains(id))
            .filter(|id| {
                self.argument(*id)
                    .is_some_and(|a| a.is_applicable(claimant, opponent))
            })
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use parley_types::TaskStatus;

    use super::*;
    use crate::argument::ArgumentKind;

    fn make_framework() -> ArgumentationFramework {
        let mut framework = ArgumentationFramework::new();
        for (id, kind) in [
            (0, ArgumentKind::Motion),
            (1, ArgumentKind::HigherMilitaryRank),
            (2, ArgumentKind::TaskedWhileOtherAtEase),
        ] {
            framework
                .add_argument(Argument::new(ArgumentId::new(id), kind, "{0}"))
                .unwrap();
        }
        for (from, to) in [(1, 0), (2, 0), (2, 1)] {
            framework
                .add_attack(ArgumentId::new(from), ArgumentId::new(to))
                .unwrap();
        }
        framework
    }

    #[test]
    fn attack_lookups_both_ways() {
        let framework = make_framework();
        let attackers: Vec<_> = framework.arguments_that_attack(MOTION).collect();
        assert_eq!(attackers, vec![ArgumentId::new(1), ArgumentId::new(2)]);
        let targets: Vec<_> = framework.attacked_by(ArgumentId::new(2)).collect();
        assert_eq!(targets, vec![MOTION, ArgumentId::new(1)]);
        assert!(framework.attacks(ArgumentId::new(2), ArgumentId::new(1)));
        assert!(!framework.attacks(ArgumentId::new(1), ArgumentId::new(2)));
        assert_eq!(framework.arguments_that_attack(ArgumentId::new(2)).count(), 0);
    }

    #[test]
    fn unknown_and_duplicate_ids_are_rejected() {
        let mut framework = make_framework();
        assert_eq!(
            framework.add_attack(ArgumentId::new(7), MOTION),
            Err(AgentError::UnknownArgument(ArgumentId::new(7)))
        );
        let again = Argument::new(MOTION, ArgumentKind::Motion, "");
        assert_eq!(
            framework.add_argument(again),
            Err(AgentError::DuplicateArgument(MOTION))
        );
    }

    #[test]
    fn live_rebuttals_filter_used_and_inapplicable() {
        let framework = make_framework();
        let senior_idle = AgentProperties {
            military_rank: 5,
            ..AgentProperties::default()
        };
        let junior_tasked = AgentProperties {
            military_rank: 1,
            task_status: TaskStatus::Tasked,
            ..AgentProperties::default()
        };
        let none = BTreeSet::new();

        assert_eq!(
            framework.live_rebuttals(MOTION, senior_idle, junior_tasked, &none),
            vec![ArgumentId::new(1)]
        );
        assert_eq!(
            framework.live_rebuttals(ArgumentId::new(1), junior_tasked, senior_idle, &none),
            vec![ArgumentId::new(2)]
        );
        let used = BTreeSet::from([ArgumentId::new(2)]);
        assert!(
            framework
                .live_rebuttals(ArgumentId::new(1), junior_tasked, senior_idle, &used)
                .is_empty()
        );
    }
}
