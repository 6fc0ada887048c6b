//! The receive side of the negotiation protocol.
//!
//! Conversations are pairwise and message driven:
//!
//! ```text
//! A -- ask(waypoints) ------------------> B
//! A <------------------ inform(waypoints) -- B
//! A -- argue(0) when B's path clashes ---> B      (or inform(obstacles))
//! A <------------------------ argue(r1) -- B      while rebuttals remain
//!   ...
//! A <----------------------- concede(..) -- B     B now yields to A
//! ```
//!
//! [`Agent::receive_locution`] applies one incoming message and returns the
//! replies to send back to the sender, plus an explanation when the message
//! was a concession. Malformed messages are logged and ignored.

use std::collections::BTreeMap;

use parley_types::{
    ActType, AgentId, AgentProperties, ArgumentId, CellValue, ContentType, Coord, Locution,
    Payload, SpaceTime,
};
use parley_world::conflict::governing_conflict;
use rand::Rng;
use tracing::{debug, info};

use crate::agent::Agent;
use crate::explanation::concession_hint;
use crate::framework::{ArgumentationFramework, MOTION};

/// What the receiver knows about the sender of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Counterpart {
    /// Sender id.
    pub id: AgentId,
    /// Sender attributes, used as the opponent in argument predicates.
    pub properties: AgentProperties,
    /// Whether the sender is driven from outside.
    pub externally_controlled: bool,
}

/// An explanation produced when an agent concedes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hint {
    /// The autonomous agent the explanation is about.
    pub about: AgentId,
    /// Rendered text.
    pub text: String,
}

/// The outcome of handling one locution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    /// Messages to send back to the sender, in order.
    pub replies: Vec<Locution>,
    /// Explanation, set only when the message was a concession.
    pub hint: Option<Hint>,
}

impl Response {
    fn reply(locution: Locution) -> Self {
        Self {
            replies: vec![locution],
            hint: None,
        }
    }
}

impl Agent {
    /// Handle a locution from `sender`.
    pub fn receive_locution(
        &mut self,
        sender: Counterpart,
        locution: &Locution,
        framework: &ArgumentationFramework,
        rng: &mut impl Rng,
    ) -> Response {
        if !locution.is_well_formed() {
            debug!(
                time_step = self.time_step,
                agent_id = %self.id,
                from = %sender.id,
                ?locution,
                "Malformed locution ignored"
            );
            return Response::default();
        }
        debug!(
            time_step = self.time_step,
            agent_id = %self.id,
            from = %sender.id,
            act = ?locution.act,
            content = ?locution.content,
            "Locution received"
        );

        match (locution.act, locution.content, &locution.payload) {
            (ActType::Ask, ContentType::Waypoints, _) => self.on_ask_waypoints(),
            (ActType::Inform, ContentType::Waypoints, _) => {
                self.on_inform_waypoints(sender.id, locution.waypoints())
            }
            (ActType::Inform, ContentType::ObstacleList, _) => {
                self.on_obstacles(locution.obstacles());
                Response::default()
            }
            (ActType::Inform, ContentType::AgentSighting, &Payload::Sighting { agent, pos }) => {
                self.on_sighting(agent, pos);
                Response::default()
            }
            (ActType::Argue, ContentType::ArgumentId, &Payload::Argument { id, .. }) => {
                self.on_argue(sender, id, framework, rng)
            }
            (ActType::Concede, ContentType::MultipleArgumentIds, _) => {
                self.on_concede(sender, locution.arguments(), framework, rng)
            }
            _ => Response::default(),
        }
    }

    fn on_ask_waypoints(&self) -> Response {
        let waypoints = self
            .next_waypoints()
            .map(|turns| {
                turns
                    .into_iter()
                    .take(self.planning.max_waypoints_per_locution)
                    .collect()
            })
            .unwrap_or_default();
        Response::reply(Locution::inform_waypoints(waypoints))
    }

    fn on_inform_waypoints(&mut self, sender: AgentId, waypoints: &[SpaceTime]) -> Response {
        self.informed_waypoints.insert(sender, waypoints.to_vec());
        let Some(their_pos) = self.agents_in_range().get(&sender).copied() else {
            return Response::default();
        };
        if waypoints.is_empty() {
            return Response::default();
        }
        let origin = SpaceTime::new(their_pos, self.time_step);

        let mut start = origin;
        for waypoint in waypoints {
            let blocked = self.straight_line_obstructions(start, waypoint.pos);
            if !blocked.is_empty() {
                debug!(
                    time_step = self.time_step,
                    agent_id = %self.id,
                    to = %sender,
                    cells = blocked.len(),
                    "Reporting obstacles on informed route"
                );
                return Response::reply(Locution::inform_obstacles(blocked));
            }
            start = *waypoint;
        }

        let estimate = self.estimated_path(origin, waypoints);
        let conflict = self.plan.as_deref().and_then(|plan| {
            governing_conflict(
                plan,
                &estimate,
                self.time_step,
                self.planning.conflict_window,
                self.planning.swap_prefix,
            )
        });
        self.estimated_plans.insert(sender, estimate);

        let Some(conflict) = conflict else {
            return Response::default();
        };
        if self.session.has_negotiated_with(sender) {
            return Response::default();
        }
        let conceding = self.session.is_conceding_to(sender);
        self.session.mark_negotiated(sender);
        self.session.open_conflict(conflict.state);
        debug!(
            time_step = self.time_step,
            agent_id = %self.id,
            with = %sender,
            state = %conflict.state,
            kind = ?conflict.kind,
            "Conflict detected"
        );

        if conceding {
            self.reroute_yielding();
            return Response::default();
        }
        Response::reply(Locution::argue(MOTION, Some(conflict.state)))
    }

    fn on_obstacles(&mut self, cells: &[SpaceTime]) {
        let reported: BTreeMap<Coord, CellValue> = cells
            .iter()
            .map(|state| (state.pos, CellValue::TemporaryObstacle))
            .collect();
        self.update_world_knowledge(&reported, self.time_step, true);
    }

    fn on_sighting(&mut self, agent: AgentId, pos: Coord) {
        let sighting = BTreeMap::from([(pos, CellValue::Agent(agent))]);
        self.update_world_knowledge(&sighting, self.time_step, true);
    }

    fn on_argue(
        &mut self,
        sender: Counterpart,
        theirs: ArgumentId,
        framework: &ArgumentationFramework,
        rng: &mut impl Rng,
    ) -> Response {
        if framework.argument(theirs).is_none() {
            debug!(
                time_step = self.time_step,
                agent_id = %self.id,
                from = %sender.id,
                argument = %theirs,
                "Unknown argument ignored"
            );
            return Response::default();
        }
        self.session.mark_negotiated(sender.id);

        let rebuttals = framework.live_rebuttals(
            theirs,
            self.properties,
            sender.properties,
            self.session.arguments_used(),
        );
        if !rebuttals.is_empty() {
            let idx = rng.random_range(0..rebuttals.len());
            if let Some(&choice) = rebuttals.get(idx) {
                self.session.use_argument(choice);
                debug!(
                    time_step = self.time_step,
                    agent_id = %self.id,
                    to = %sender.id,
                    against = %theirs,
                    argument = %choice,
                    "Rebutting"
                );
                return Response::reply(Locution::argue(choice, None));
            }
        }

        self.session.concede_to(sender.id);
        info!(
            time_step = self.time_step,
            agent_id = %self.id,
            to = %sender.id,
            "Conceding right of way"
        );
        let mut replies = Vec::new();
        if !self.estimated_plans.contains_key(&sender.id) {
            replies.push(Locution::ask_waypoints());
        }
        self.reroute_yielding();
        let failed: Vec<ArgumentId> = self.session.arguments_used().iter().copied().collect();
        replies.push(Locution::concede(failed));
        Response {
            replies,
            hint: None,
        }
    }

    fn on_concede(
        &self,
        sender: Counterpart,
        failed: &[ArgumentId],
        framework: &ArgumentationFramework,
        rng: &mut impl Rng,
    ) -> Response {
        let (winner, loser) = if self.externally_controlled {
            ("your", "their")
        } else {
            ("their", "your")
        };
        let about = if sender.externally_controlled {
            self.id
        } else {
            sender.id
        };
        let victorious: Vec<ArgumentId> = self.session.arguments_used().iter().copied().collect();
        let text = concession_hint(framework, &victorious, failed, winner, loser, rng);
        debug!(
            time_step = self.time_step,
            agent_id = %self.id,
            from = %sender.id,
            %text,
            "Concession received"
        );
        Response {
            replies: Vec::new(),
            hint: Some(Hint { about, text }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use parley_types::{ObstacleKind, TaskStatus};
    use parley_world::Grid;
    use parley_world::conflict::{ConflictKind, first_vertex_conflict, illegal_swap};
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;
    use crate::config::PlanningConfig;
    use crate::culture::{Culture, CultureKind};

    fn at(x: u32, y: u32, t: u64) -> SpaceTime {
        SpaceTime::new(Coord::new(x, y), t)
    }

    fn make_corridor() -> Grid {
        // 7x2: row 0 is wall except a pocket at (1, 0).
        let mut grid = Grid::new(7, 2).unwrap();
        for x in [0, 2, 3, 4, 5, 6] {
            grid.add_obstacle(Coord::new(x, 0), ObstacleKind::Permanent)
                .unwrap();
        }
        grid.add_agent(AgentId::new(1), Coord::new(0, 1)).unwrap();
        grid.add_agent(AgentId::new(2), Coord::new(6, 1)).unwrap();
        grid
    }

    fn make_agent(id: u32, goal: Coord, world: &Grid, properties: AgentProperties) -> Agent {
        let planning = PlanningConfig {
            visibility_radius: 10,
            ..PlanningConfig::default()
        };
        let mut agent = Agent::new(AgentId::new(id), world.width(), world.height(), planning).unwrap();
        agent.set_properties(properties);
        agent.set_goal(Some(goal));
        let view: BTreeMap<Coord, CellValue> = world.cells().collect();
        agent.update_world_knowledge(&view, 0, false);
        agent
    }

    fn counterpart(agent: &Agent) -> Counterpart {
        Counterpart {
            id: agent.id(),
            properties: agent.properties(),
            externally_controlled: agent.is_externally_controlled(),
        }
    }

    fn senior() -> AgentProperties {
        AgentProperties {
            military_rank: 5,
            task_status: TaskStatus::Tasked,
            ..AgentProperties::default()
        }
    }

    fn junior() -> AgentProperties {
        AgentProperties {
            military_rank: 1,
            ..AgentProperties::default()
        }
    }

    /// Deliver messages back and forth until both sides fall silent.
    fn converse(
        a: &mut Agent,
        b: &mut Agent,
        opening: Locution,
        framework: &ArgumentationFramework,
        rng: &mut SmallRng,
    ) -> Vec<Hint> {
        let mut hints = Vec::new();
        let mut pending = vec![(a.id(), opening)];
        for _ in 0..50 {
            let Some((from, locution)) = pending.pop() else {
                break;
            };
            let (sender, receiver) = if from == a.id() {
                (&*a, &mut *b)
            } else {
                (&*b, &mut *a)
            };
            let who = counterpart(sender);
            let response = receiver.receive_locution(who, &locution, framework, rng);
            hints.extend(response.hint);
            for reply in response.replies.into_iter().rev() {
                pending.push((receiver.id(), reply));
            }
        }
        assert!(pending.is_empty(), "conversation did not terminate");
        hints
    }

    #[test]
    fn ask_returns_capped_waypoints() {
        let world = make_corridor();
        let mut a = make_agent(1, Coord::new(6, 1), &world, junior());
        let b = make_agent(2, Coord::new(0, 1), &world, senior());
        let framework = Culture::new(CultureKind::Easy).unwrap().framework().clone();
        let mut rng = SmallRng::seed_from_u64(3);

        let response = a.receive_locution(counterpart(&b), &Locution::ask_waypoints(), &framework, &mut rng);
        assert_eq!(response.replies.len(), 1);
        let reply = response.replies.first().unwrap();
        assert_eq!(reply.act, ActType::Inform);
        assert!(reply.waypoints().len() <= 2);
        assert_eq!(reply.waypoints().last().map(|s| s.pos), Some(Coord::new(6, 1)));
    }

    #[test]
    fn clashing_inform_opens_a_dispute_once() {
        let world = make_corridor();
        let mut a = make_agent(1, Coord::new(6, 1), &world, junior());
        let b = make_agent(2, Coord::new(0, 1), &world, senior());
        let framework = Culture::new(CultureKind::Easy).unwrap().framework().clone();
        let mut rng = SmallRng::seed_from_u64(3);

        let inform = Locution::inform_waypoints(b.next_waypoints().unwrap());
        let response = a.receive_locution(counterpart(&b), &inform, &framework, &mut rng);
        assert_eq!(response.replies.len(), 1);
        let reply = response.replies.first().unwrap();
        assert_eq!(reply.act, ActType::Argue);
        assert!(matches!(reply.payload, Payload::Argument { id, conflict: Some(_) } if id == MOTION));
        assert!(a.session().current_conflict().is_some());
        assert!(a.estimated_plan(b.id()).is_some());

        let again = a.receive_locution(counterpart(&b), &inform, &framework, &mut rng);
        assert!(again.replies.is_empty());
    }

    /// 4x1: agent 1 at (1, 0) heading for (2, 0), agent 2 standing on it.
    fn make_passing_lane() -> Grid {
        let mut grid = Grid::new(4, 1).unwrap();
        grid.add_agent(AgentId::new(1), Coord::new(1, 0)).unwrap();
        grid.add_agent(AgentId::new(2), Coord::new(2, 0)).unwrap();
        grid
    }

    /// Agent 2 steps west through agent 1 and then comes back to (2, 0).
    fn doubling_back() -> Locution {
        Locution::inform_waypoints(vec![at(1, 0, 1), at(2, 0, 3)])
    }

    #[test]
    fn swap_before_vertex_clash_governs_the_dispute() {
        let world = make_passing_lane();
        let mut a = make_agent(1, Coord::new(2, 0), &world, junior());
        let b = Counterpart {
            id: AgentId::new(2),
            properties: senior(),
            externally_controlled: false,
        };
        let framework = Culture::new(CultureKind::Easy).unwrap().framework().clone();
        let mut rng = SmallRng::seed_from_u64(3);
        assert_eq!(a.plan().unwrap(), [at(1, 0, 0), at(2, 0, 1)].as_slice());

        let response = a.receive_locution(b, &doubling_back(), &framework, &mut rng);
        assert_eq!(
            response.replies,
            vec![Locution::argue(MOTION, Some(at(1, 0, 0)))]
        );
        assert_eq!(a.session().current_conflict(), Some(at(1, 0, 0)));

        let theirs = a.estimated_plan(b.id).unwrap().to_vec();
        let mine = a.plan().unwrap();
        assert_eq!(first_vertex_conflict(mine, &theirs, 0, 4), Some(at(2, 0, 2)));
        let governing = governing_conflict(mine, &theirs, 0, 4, 4).unwrap();
        assert_eq!(governing.kind, ConflictKind::Swap);
        assert_eq!(governing.state, at(1, 0, 0));
    }

    #[test]
    fn conceding_agent_reroutes_once_per_round() {
        let world = make_passing_lane();
        let mut a = make_agent(1, Coord::new(2, 0), &world, junior());
        let b = Counterpart {
            id: AgentId::new(2),
            properties: senior(),
            externally_controlled: false,
        };
        let framework = Culture::new(CultureKind::Easy).unwrap().framework().clone();
        let mut rng = SmallRng::seed_from_u64(3);
        let before = a.plan().map(<[SpaceTime]>::to_vec);

        // Conceding marks the winner as negotiated with for this round.
        a.session.concede_to(b.id);
        let response = a.receive_locution(b, &doubling_back(), &framework, &mut rng);
        assert!(response.replies.is_empty());
        assert_eq!(a.plan().map(<[SpaceTime]>::to_vec), before);
        assert_eq!(a.session().current_conflict(), None);

        a.session.advance_to(1);
        let response = a.receive_locution(b, &doubling_back(), &framework, &mut rng);
        assert!(response.replies.is_empty());
        assert!(a.session().has_negotiated_with(b.id));
        assert_ne!(a.plan().map(<[SpaceTime]>::to_vec), before);
    }

    #[test]
    fn weaker_agent_concedes_and_yields() {
        let world = make_corridor();
        let mut a = make_agent(1, Coord::new(6, 1), &world, junior());
        let mut b = make_agent(2, Coord::new(0, 1), &world, senior());
        let framework = Culture::new(CultureKind::Easy).unwrap().framework().clone();
        let mut rng = SmallRng::seed_from_u64(11);

        // b learns a's route and disputes it.
        let inform = Locution::inform_waypoints(a.next_waypoints().unwrap());
        let response = b.receive_locution(counterpart(&a), &inform, &framework, &mut rng);
        let opening = response.replies.into_iter().next().unwrap();
        assert_eq!(opening.act, ActType::Argue);

        // Hand the opening argue to a and let the dialogue run.
        let hints = converse(&mut b, &mut a, opening, &framework, &mut rng);

        assert!(a.session().is_conceding_to(b.id()));
        assert!(!b.session().is_conceding_to(a.id()));
        assert_eq!(hints.len(), 1);
        assert_eq!(hints.first().map(|h| h.about), Some(a.id()));

        let theirs = a.estimated_plan(b.id()).unwrap().to_vec();
        let mine = a.plan().unwrap();
        assert_eq!(first_vertex_conflict(mine, &theirs, 0, u64::MAX), None);
        assert_eq!(illegal_swap(mine, &theirs, usize::MAX), None);
    }

    #[test]
    fn reported_obstacle_blocks_future_plans() {
        let mut world = Grid::new(5, 3).unwrap();
        world.add_agent(AgentId::new(1), Coord::new(0, 1)).unwrap();
        let mut a = make_agent(1, Coord::new(4, 1), &world, junior());
        let reporter = Counterpart {
            id: AgentId::new(2),
            properties: junior(),
            externally_controlled: false,
        };
        let framework = Culture::new(CultureKind::Easy).unwrap().framework().clone();
        let mut rng = SmallRng::seed_from_u64(5);

        let blocked = Coord::new(2, 1);
        let report = Locution::inform_obstacles(vec![SpaceTime::new(blocked, 0)]);
        let response = a.receive_locution(reporter, &report, &framework, &mut rng);
        assert!(response.replies.is_empty());
        assert!(a.plan().unwrap().iter().all(|s| s.pos != blocked));
        assert_eq!(a.known().get(blocked), Some(CellValue::TemporaryObstacle));

        // Still avoided once time moves on and the cell is out of sight.
        let view = BTreeMap::from([(Coord::new(0, 1), CellValue::Agent(AgentId::new(1)))]);
        a.update_world_knowledge(&view, 1, false);
        assert!(a.plan().unwrap().iter().all(|s| s.pos != blocked));
    }

    #[test]
    fn informed_route_through_known_obstacle_is_reported() {
        let mut world = Grid::new(6, 2).unwrap();
        world.add_agent(AgentId::new(1), Coord::new(0, 0)).unwrap();
        world.add_agent(AgentId::new(2), Coord::new(0, 1)).unwrap();
        world
            .add_obstacle(Coord::new(3, 1), ObstacleKind::Temporary)
            .unwrap();
        let mut a = make_agent(1, Coord::new(5, 0), &world, junior());
        let sender = Counterpart {
            id: AgentId::new(2),
            properties: junior(),
            externally_controlled: false,
        };
        let framework = Culture::new(CultureKind::Easy).unwrap().framework().clone();
        let mut rng = SmallRng::seed_from_u64(5);

        let inform = Locution::inform_waypoints(vec![at(5, 1, 5)]);
        let response = a.receive_locution(sender, &inform, &framework, &mut rng);
        assert_eq!(
            response.replies,
            vec![Locution::inform_obstacles(vec![at(3, 1, 3)])]
        );
        assert_eq!(a.informed_waypoints(sender.id), Some([at(5, 1, 5)].as_slice()));
    }

    #[test]
    fn malformed_and_unknown_messages_are_no_ops() {
        let world = make_corridor();
        let mut a = make_agent(1, Coord::new(6, 1), &world, junior());
        let b = make_agent(2, Coord::new(0, 1), &world, senior());
        let framework = Culture::new(CultureKind::Easy).unwrap().framework().clone();
        let mut rng = SmallRng::seed_from_u64(3);
        let before = a.session().clone();

        let malformed = Locution {
            act: ActType::Argue,
            content: ContentType::ArgumentId,
            payload: Payload::Waypoints(Vec::new()),
        };
        assert_eq!(
            a.receive_locution(counterpart(&b), &malformed, &framework, &mut rng),
            Response::default()
        );
        let unknown = Locution::argue(ArgumentId::new(42), None);
        assert_eq!(
            a.receive_locution(counterpart(&b), &unknown, &framework, &mut rng),
            Response::default()
        );
        assert_eq!(a.session(), &before);
    }

    #[test]
    fn sighting_updates_the_model() {
        let world = make_corridor();
        let mut a = make_agent(1, Coord::new(6, 1), &world, junior());
        let b = make_agent(2, Coord::new(0, 1), &world, senior());
        let framework = Culture::new(CultureKind::Easy).unwrap().framework().clone();
        let mut rng = SmallRng::seed_from_u64(3);

        let sighting = Locution::inform_sighting(AgentId::new(7), Coord::new(1, 0));
        a.receive_locution(counterpart(&b), &sighting, &framework, &mut rng);
        assert_eq!(a.model().find_agent(AgentId::new(7)), Some(Coord::new(1, 0)));
    }
}
