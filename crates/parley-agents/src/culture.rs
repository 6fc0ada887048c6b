//! Argument catalogs and property distributions.
//!
//! A culture fixes which arguments exist, which attack which, and how
//! agent properties are drawn at random. Three catalogs ship:
//!
//! | Culture  | Arguments | Properties used                             |
//! |----------|-----------|---------------------------------------------|
//! | `easy`   | 0..=2     | military rank, task status                  |
//! | `medium` | 0..=4     | + task importance, Special Ops              |
//! | `hard`   | 0..=9     | + corporate rank, department                |
//!
//! Templates are written for the hint renderer: `{0}` and `{1}` are
//! replaced with `"your"` / `"their"`.

use parley_types::{AgentProperties, ArgumentId, Department, TaskStatus};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::argument::{Argument, ArgumentKind};
use crate::error::AgentError;
use crate::framework::ArgumentationFramework;

/// Highest rank or importance drawn at random.
const MAX_RANK: u8 = 6;

/// Which catalog to load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CultureKind {
    /// Rank and task status only.
    Easy,
    /// Adds task importance and Special Ops.
    #[default]
    Medium,
    /// Adds corporate rank and departments.
    Hard,
}

/// `(id, rule, template)` rows of a catalog.
type Catalog = &'static [(u32, ArgumentKind, &'static str)];

/// `(attacker, attacked)` rows of a catalog.
type Attacks = &'static [(u32, u32)];

const EASY_ARGUMENTS: Catalog = &[
    (0, ArgumentKind::Motion, "{0} route has right of way"),
    (1, ArgumentKind::HigherMilitaryRank, "{0} military rank is higher than {1}s"),
    (2, ArgumentKind::TaskedWhileOtherAtEase, "{0} status is Tasked and {1} status is At Ease"),
];

const EASY_ATTACKS: Attacks = &[(1, 0), (2, 0), (2, 1)];

const MEDIUM_ARGUMENTS: Catalog = &[
    (0, ArgumentKind::Motion, "{0} route has right of way"),
    (1, ArgumentKind::HigherMilitaryRank, "{0} military rank is higher than {1}s"),
    (2, ArgumentKind::TaskedWhileOtherAtEase, "{0} status is Tasked and {1} status is At Ease"),
    (3, ArgumentKind::MoreImportantTask, "{0} task is more important than {1}s"),
    (
        4,
        ArgumentKind::SpecialOpsRankBonus,
        "{0} rank is 3 levels higher because of Special Ops status",
    ),
];

const MEDIUM_ATTACKS: Attacks = &[
    (1, 0),
    (2, 0),
    (2, 1),
    (2, 3),
    (3, 1),
    (3, 0),
    (4, 3),
    (4, 1),
    (4, 0),
];

const HARD_ARGUMENTS: Catalog = &[
    (0, ArgumentKind::Motion, "{0} route has right of way"),
    (1, ArgumentKind::HigherMilitaryRank, "{0} military rank is higher than {1}s"),
    (2, ArgumentKind::TaskedWhileOtherAtEase, "{0} status is Tasked and {1} status is At Ease"),
    (3, ArgumentKind::TaskedWithMoreImportantTask, "{0} task is more important than {1}s"),
    (
        4,
        ArgumentKind::CombinedRankHigher,
        "{0} combined rank is higher than {1} rank and task importance",
    ),
    (5, ArgumentKind::AdminCorporateBonus, "{0} department is Admin (corporate rank + 2)"),
    (
        6,
        ArgumentKind::SpecialOpsCombinedBonus,
        "{0} combined rank is 3 levels higher because of Special Ops status",
    ),
    (
        7,
        ArgumentKind::SameDepartment,
        "corporate ranks don't matter because both of you are from the same department",
    ),
    (
        8,
        ArgumentKind::SpecialOpsExempt,
        "this rule does not apply because of {0} Special Ops status",
    ),
    (
        9,
        ArgumentKind::OpponentIsAdmin,
        "{1} Special Ops benefits don't apply because {1} department is Admin",
    ),
];

const HARD_ATTACKS: Attacks = &[
    (1, 0),
    (2, 0),
    (3, 0),
    (4, 0),
    (5, 0),
    (6, 0),
    (2, 1),
    (2, 3),
    (3, 1),
    (4, 3),
    (4, 1),
    (5, 4),
    (6, 4),
    (7, 4),
    (7, 5),
    (8, 2),
    (9, 8),
    (9, 6),
    (4, 9),
    (1, 7),
    (2, 7),
    (3, 7),
    (6, 7),
    (5, 9),
    (2, 5),
    (2, 4),
];

/// A loaded culture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Culture {
    kind: CultureKind,
    framework: ArgumentationFramework,
}

impl Culture {
    /// Build the framework for `kind`.
    pub fn new(kind: CultureKind) -> Result<Self, AgentError> {
        let (arguments, attacks) = match kind {
            CultureKind::Easy => (EASY_ARGUMENTS, EASY_ATTACKS),
            CultureKind::Medium => (MEDIUM_ARGUMENTS, MEDIUM_ATTACKS),
            CultureKind::Hard => (HARD_ARGUMENTS, HARD_ATTACKS),
        };
        let mut framework = ArgumentationFramework::new();
        for &(id, rule, template) in arguments {
            framework.add_argument(Argument::new(ArgumentId::new(id), rule, template))?;
        }
        for &(attacker, attacked) in attacks {
            framework.add_attack(ArgumentId::new(attacker), ArgumentId::new(attacked))?;
        }
        Ok(Self { kind, framework })
    }

    /// Which catalog this is.
    pub const fn kind(&self) -> CultureKind {
        self.kind
    }

    /// The argumentation framework.
    pub const fn framework(&self) -> &ArgumentationFramework {
        &self.framework
    }

    /// Draw properties for a new agent.
    ///
    /// Easy and medium draw a military rank in `1..=6` and make the agent
    /// tasked four times out of five; medium adds a task importance no
    /// lower than the rank and Special Ops one time in three. Hard keeps
    /// all of that and adds a corporate rank and a uniform department.
    pub fn random_properties(&self, rng: &mut impl Rng) -> AgentProperties {
        let military_rank = rng.random_range(1..=MAX_RANK);
        let task_status = if rng.random_range(0..5_u8) == 0 {
            TaskStatus::AtEase
        } else {
            TaskStatus::Tasked
        };
        let mut properties = AgentProperties {
            military_rank,
            task_status,
            ..AgentProperties::default()
        };
        if self.kind == CultureKind::Easy {
            return properties;
        }

        properties.task_importance = rng.random_range(military_rank..=MAX_RANK);
        properties.special_ops = rng.random_range(0..3_u8) == 0;
        if self.kind == CultureKind::Hard {
            properties.corporate_rank = rng.random_range(1..=MAX_RANK);
            let idx = rng.random_range(0..Department::ALL.len());
            properties.department = Department::ALL.get(idx).copied().unwrap_or_default();
        }
        properties
    }
}
