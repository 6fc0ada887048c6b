//! Arguments and the conditions under which they hold.
//!
//! Every argument has an [`ArgumentKind`] that decides, from the claimant's
//! and the opponent's [`AgentProperties`], whether the claimant can put it
//! forward. Rank arithmetic is done in `u16` so that bonuses never wrap.

use parley_types::{AgentProperties, ArgumentId, Department};
use serde::{Deserialize, Serialize};

/// Corporate rank bonus for the Admin department.
const ADMIN_BONUS: u16 = 2;

/// Rank bonus granted by Special Ops membership.
const SPECIAL_OPS_BONUS: u16 = 3;

/// The rule behind an argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArgumentKind {
    /// The opening claim to right of way. Always applicable.
    Motion,
    /// Higher military rank.
    HigherMilitaryRank,
    /// Claimant is tasked while the opponent is at ease.
    TaskedWhileOtherAtEase,
    /// Task importance above both the opponent's rank and task importance.
    MoreImportantTask,
    /// As [`Self::MoreImportantTask`], and the claimant must be tasked.
    TaskedWithMoreImportantTask,
    /// Special Ops claimant against a non-Special Ops opponent, with three
    /// extra levels of effective rank.
    SpecialOpsRankBonus,
    /// Combined rank above the opponent's task importance and combined rank.
    CombinedRankHigher,
    /// Admin claimant whose combined rank plus two outranks the opponent.
    AdminCorporateBonus,
    /// Special Ops claimant whose combined rank plus three outranks the
    /// opponent, whose own Special Ops bonus counts unless they are Admin.
    SpecialOpsCombinedBonus,
    /// Both agents belong to the same department.
    SameDepartment,
    /// Claimant is Special Ops.
    SpecialOpsExempt,
    /// Opponent belongs to Admin.
    OpponentIsAdmin,
}

impl ArgumentKind {
    /// Whether `claimant` can put this argument forward against `opponent`.
    pub fn applies(self, claimant: AgentProperties, opponent: AgentProperties) -> bool {
        match self {
            Self::Motion => true,
            Self::HigherMilitaryRank => claimant.military_rank > opponent.military_rank,
            Self::TaskedWhileOtherAtEase => claimant.is_tasked() && !opponent.is_tasked(),
            Self::MoreImportantTask => {
                claimant.task_importance > opponent.military_rank
                    && claimant.task_importance > opponent.task_importance
            }
            Self::TaskedWithMoreImportantTask => {
                claimant.is_tasked() && Self::MoreImportantTask.applies(claimant, opponent)
            }
            Self::SpecialOpsRankBonus => {
                claimant.special_ops
                    && !opponent.special_ops
                    && claimant.effective_rank().saturating_add(SPECIAL_OPS_BONUS)
                        > opponent.effective_rank()
            }
            Self::CombinedRankHigher => outranks(claimant.combined_rank(), opponent),
            Self::AdminCorporateBonus => {
                claimant.department == Department::Admin
                    && outranks(claimant.combined_rank().saturating_add(ADMIN_BONUS), opponent)
            }
            Self::SpecialOpsCombinedBonus => {
                let theirs = if opponent.special_ops && opponent.department != Department::Admin {
                    opponent.combined_rank().saturating_add(SPECIAL_OPS_BONUS)
                } else {
                    opponent.combined_rank()
                };
                let mine = claimant.combined_rank().saturating_add(SPECIAL_OPS_BONUS);
                claimant.special_ops
                    && mine > u16::from(opponent.task_importance)
                    && mine > theirs
            }
            Self::SameDepartment => claimant.department == opponent.department,
            Self::SpecialOpsExempt => claimant.special_ops,
            Self::OpponentIsAdmin => opponent.department == Department::Admin,
        }
    }
}

/// `rank` beats both the opponent's task importance and combined rank.
fn outranks(rank: u16, opponent: AgentProperties) -> bool {
    rank > u16::from(opponent.task_importance) && rank > opponent.combined_rank()
}

/// A registered argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argument {
    /// Identifier within its framework.
    pub id: ArgumentId,
    /// The rule it states.
    pub kind: ArgumentKind,
    /// Natural-language template; `{0}` and `{1}` stand for the two
    /// parties' possessives.
    pub template: String,
}

impl Argument {
    /// Build an argument.
    pub fn new(id: ArgumentId, kind: ArgumentKind, template: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            template: template.into(),
        }
    }

    /// Whether `claimant` can use this argument against `opponent`.
    pub fn is_applicable(&self, claimant: AgentProperties, opponent: AgentProperties) -> bool {
        self.kind.applies(claimant, opponent)
    }

    /// Fill the template.
    pub fn render(&self, first: &str, second: &str) -> String {
        self.template.replace("{0}", first).replace("{1}", second)
    }
}

#[cfg(test)]
mod tests {
    use parley_types::TaskStatus;

    use super::*;

    fn make_props(rank: u8, tasked: bool, importance: u8) -> AgentProperties {
        AgentProperties {
            military_rank: rank,
            task_status: if tasked {
                TaskStatus::Tasked
            } else {
                TaskStatus::AtEase
            },
            task_importance: importance,
            ..AgentProperties::default()
        }
    }

    #[test]
    fn rank_and_task_status() {
        let senior = make_props(5, false, 0);
        let junior = make_props(2, true, 3);
        assert!(ArgumentKind::HigherMilitaryRank.applies(senior, junior));
        assert!(!ArgumentKind::HigherMilitaryRank.applies(junior, senior));
        assert!(ArgumentKind::TaskedWhileOtherAtEase.applies(junior, senior));
        assert!(!ArgumentKind::TaskedWhileOtherAtEase.applies(senior, junior));
        assert!(ArgumentKind::Motion.applies(junior, senior));
    }

    #[test]
    fn task_importance_must_beat_rank_and_importance() {
        let claimant = make_props(1, true, 5);
        assert!(ArgumentKind::MoreImportantTask.applies(claimant, make_props(4, true, 4)));
        assert!(!ArgumentKind::MoreImportantTask.applies(claimant, make_props(5, false, 0)));

        let idle = make_props(1, false, 5);
        assert!(ArgumentKind::MoreImportantTask.applies(idle, make_props(4, true, 4)));
        assert!(!ArgumentKind::TaskedWithMoreImportantTask.applies(idle, make_props(4, true, 4)));
    }

    #[test]
    fn special_ops_bonus_needs_an_ordinary_opponent() {
        let mut claimant = make_props(2, false, 0);
        claimant.special_ops = true;
        let opponent = make_props(4, false, 0);
        assert!(ArgumentKind::SpecialOpsRankBonus.applies(claimant, opponent));

        let mut elite = opponent;
        elite.special_ops = true;
        assert!(!ArgumentKind::SpecialOpsRankBonus.applies(claimant, elite));
    }

    #[test]
    fn admin_bonus_and_department_rules() {
        let mut admin = make_props(3, false, 0);
        admin.department = Department::Admin;
        admin.corporate_rank = 1;
        let mut navy = make_props(4, false, 0);
        navy.department = Department::Navy;
        navy.corporate_rank = 1;

        // 3 + 1 + 2 = 6 against 4 + 1 = 5.
        assert!(ArgumentKind::AdminCorporateBonus.applies(admin, navy));
        assert!(!ArgumentKind::CombinedRankHigher.applies(admin, navy));
        assert!(ArgumentKind::OpponentIsAdmin.applies(navy, admin));
        assert!(!ArgumentKind::SameDepartment.applies(navy, admin));
    }

    #[test]
    fn opponent_special_ops_counts_unless_admin() {
        let mut claimant = make_props(3, false, 0);
        claimant.special_ops = true;
        claimant.department = Department::Army;
        let mut opponent = make_props(3, false, 0);
        opponent.special_ops = true;
        opponent.department = Department::Navy;
        assert!(!ArgumentKind::SpecialOpsCombinedBonus.applies(claimant, opponent));

        opponent.department = Department::Admin;
        assert!(ArgumentKind::SpecialOpsCombinedBonus.applies(claimant, opponent));
    }

    #[test]
    fn render_fills_both_placeholders() {
        let argument = Argument::new(
            ArgumentId::new(1),
            ArgumentKind::HigherMilitaryRank,
            "{0} military rank is higher than {1}s",
        );
        assert_eq!(
            argument.render("your", "their"),
            "your military rank is higher than theirs"
        );
    }
}
