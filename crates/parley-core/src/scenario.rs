//! World seed files.
//!
//! A scenario is a plain-text grid followed by optional goal and property
//! blocks:
//!
//! ```text
//! 3 2
//! 1 0
//! -1 0
//! 0 2
//! GOALS
//! 1 2 1
//! 2 0 0
//! END
//! PROPERTIES
//! 1 rank=3 tasked=true importance=4
//! END
//! ```
//!
//! The first line is `<width> <height>`. Each of the next `width` lines is
//! one column `x` and holds `height` integers for rows `y = 0..height`:
//! `0` empty, `-1` permanent obstacle, `-2` temporary obstacle, positive
//! values are agent ids. Property keys are `rank`, `tasked`, `importance`,
//! `corporate`, `special_ops` and `department`.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use parley_types::{AgentId, AgentProperties, CellValue, Coord, Department, TaskStatus};
use rand::Rng;

/// Errors raised while reading a scenario.
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    /// Failed to read the file.
    #[error("failed to read scenario file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// The dimensions line is missing or malformed.
    #[error("line 1: expected `<width> <height>`")]
    Dimensions,

    /// A token is not a valid number or cell value.
    #[error("line {line}: invalid value `{token}`")]
    InvalidValue {
        /// One-based line number.
        line: usize,
        /// The offending token.
        token: String,
    },

    /// A grid line has the wrong number of cells.
    #[error("line {line}: expected {expected} cells, found {found}")]
    ColumnLength {
        /// One-based line number.
        line: usize,
        /// The grid height.
        expected: usize,
        /// Cells on the line.
        found: usize,
    },

    /// The file ended before every column was read.
    #[error("expected {expected} grid lines, found {found}")]
    MissingColumns {
        /// The grid width.
        expected: usize,
        /// Lines read.
        found: usize,
    },

    /// The same agent id appears in two cells.
    #[error("agent {0} placed twice")]
    DuplicateAgent(AgentId),

    /// A line that is not part of any known block.
    #[error("line {line}: unexpected `{text}`")]
    Unexpected {
        /// One-based line number.
        line: usize,
        /// The line content.
        text: String,
    },

    /// A goal line is not `<agent> <x> <y>`.
    #[error("line {line}: expected `<agent> <x> <y>`")]
    MalformedGoal {
        /// One-based line number.
        line: usize,
    },

    /// A property key is not recognised.
    #[error("line {line}: unknown property `{key}`")]
    UnknownProperty {
        /// One-based line number.
        line: usize,
        /// The key.
        key: String,
    },

    /// A block was not closed with `END`.
    #[error("{0} block is missing END")]
    Unterminated(&'static str),

    /// Random generation could not find enough empty cells.
    #[error("not enough empty cells for {requested} items")]
    Crowded {
        /// Items requested.
        requested: usize,
    },
}

/// A parsed world seed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scenario {
    /// Number of columns.
    pub width: u32,
    /// Number of rows.
    pub height: u32,
    /// Every non-empty cell.
    pub cells: BTreeMap<Coord, CellValue>,
    /// Goal per agent.
    pub goals: BTreeMap<AgentId, Coord>,
    /// Explicit properties per agent. Agents without an entry draw theirs
    /// from the culture.
    pub properties: BTreeMap<AgentId, AgentProperties>,
}

type Lines<'a> = std::iter::Peekable<std::iter::Enumerate<std::str::Lines<'a>>>;

fn parse_number<T: std::str::FromStr>(line: usize, token: &str) -> Result<T, ScenarioError> {
    token.parse().map_err(|_| ScenarioError::InvalidValue {
        line,
        token: token.to_owned(),
    })
}

/// Next non-blank line with its one-based number.
fn next_line<'a>(lines: &mut Lines<'a>) -> Option<(usize, &'a str)> {
    lines
        .by_ref()
        .map(|(i, text)| (i.saturating_add(1), text.trim()))
        .find(|(_, text)| !text.is_empty())
}

impl Scenario {
    /// Read a scenario file.
    pub fn from_file(path: &Path) -> Result<Self, ScenarioError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse scenario text.
    pub fn parse(text: &str) -> Result<Self, ScenarioError> {
        let mut lines: Lines<'_> = text.lines().enumerate().peekable();
        let (width, height) = next_line(&mut lines)
            .and_then(|(_, dims)| {
                let mut parts = dims.split_whitespace();
                let width = parts.next()?.parse::<u32>().ok()?;
                let height = parts.next()?.parse::<u32>().ok()?;
                parts.next().is_none().then_some((width, height))
            })
            .filter(|&(w, h)| w > 0 && h > 0)
            .ok_or(ScenarioError::Dimensions)?;

        let mut scenario = Self {
            width,
            height,
            ..Self::default()
        };
        let expected_height = usize::try_from(height).map_err(|_| ScenarioError::Dimensions)?;
        let expected_width = usize::try_from(width).map_err(|_| ScenarioError::Dimensions)?;

        for x in 0..width {
            let Some((line, text)) = next_line(&mut lines) else {
                return Err(ScenarioError::MissingColumns {
                    expected: expected_width,
                    found: usize::try_from(x).unwrap_or(usize::MAX),
                });
            };
            let tokens: Vec<&str> = text.split_whitespace().collect();
            if tokens.len() != expected_height {
                return Err(ScenarioError::ColumnLength {
                    line,
                    expected: expected_height,
                    found: tokens.len(),
                });
            }
            for (y, token) in (0..height).zip(tokens) {
                let raw: i64 = parse_number(line, token)?;
                let value = CellValue::from_raw(raw).ok_or_else(|| ScenarioError::InvalidValue {
                    line,
                    token: token.to_owned(),
                })?;
                if let Some(id) = value.agent()
                    && scenario.cells.values().any(|v| v.agent() == Some(id))
                {
                    return Err(ScenarioError::DuplicateAgent(id));
                }
                if !value.is_empty() {
                    scenario.cells.insert(Coord::new(x, y), value);
                }
            }
        }

        while let Some((line, header)) = next_line(&mut lines) {
            match header {
                "GOALS" => scenario.parse_goals(&mut lines)?,
                "PROPERTIES" => scenario.parse_properties(&mut lines)?,
                _ => {
                    return Err(ScenarioError::Unexpected {
                        line,
                        text: header.to_owned(),
                    });
                }
            }
        }
        Ok(scenario)
    }

    fn parse_goals(&mut self, lines: &mut Lines<'_>) -> Result<(), ScenarioError> {
        loop {
            let (line, text) = next_line(lines).ok_or(ScenarioError::Unterminated("GOALS"))?;
            if text == "END" {
                return Ok(());
            }
            let tokens: Vec<&str> = text.split_whitespace().collect();
            let [agent, x, y] = tokens.as_slice() else {
                return Err(ScenarioError::MalformedGoal { line });
            };
            let agent = AgentId::new(parse_number(line, agent)?);
            let goal = Coord::new(parse_number(line, x)?, parse_number(line, y)?);
            self.goals.insert(agent, goal);
        }
    }

    fn parse_properties(&mut self, lines: &mut Lines<'_>) -> Result<(), ScenarioError> {
        loop {
            let (line, text) =
                next_line(lines).ok_or(ScenarioError::Unterminated("PROPERTIES"))?;
            if text == "END" {
                return Ok(());
            }
            let mut tokens = text.split_whitespace();
            let agent = tokens
                .next()
                .ok_or_else(|| ScenarioError::Unexpected {
                    line,
                    text: text.to_owned(),
                })
                .and_then(|token| parse_number(line, token))
                .map(AgentId::new)?;
            let mut props = AgentProperties::default();
            for pair in tokens {
                let (key, value) = pair.split_once('=').ok_or_else(|| ScenarioError::InvalidValue {
                    line,
                    token: pair.to_owned(),
                })?;
                match key {
                    "rank" => props.military_rank = parse_number(line, value)?,
                    "tasked" => {
                        props.task_status = if parse_number(line, value)? {
                            TaskStatus::Tasked
                        } else {
                            TaskStatus::AtEase
                        };
                    }
                    "importance" => props.task_importance = parse_number(line, value)?,
                    "corporate" => props.corporate_rank = parse_number(line, value)?,
                    "special_ops" => props.special_ops = parse_number(line, value)?,
                    "department" => {
                        props.department =
                            Department::from_name(value).ok_or_else(|| ScenarioError::InvalidValue {
                                line,
                                token: value.to_owned(),
                            })?;
                    }
                    _ => {
                        return Err(ScenarioError::UnknownProperty {
                            line,
                            key: key.to_owned(),
                        });
                    }
                }
            }
            self.properties.insert(agent, props);
        }
    }

    /// Render back to the text format.
    pub fn to_text(&self) -> String {
        let mut out = format!("{} {}\n", self.width, self.height);
        for x in 0..self.width {
            let column: Vec<String> = (0..self.height)
                .map(|y| {
                    self.cells
                        .get(&Coord::new(x, y))
                        .copied()
                        .unwrap_or_default()
                        .to_raw()
                        .to_string()
                })
                .collect();
            out.push_str(&column.join(" "));
            out.push('\n');
        }
        out.push_str("GOALS\n");
        for (agent, goal) in &self.goals {
            let _ = writeln!(out, "{agent} {} {}", goal.x, goal.y);
        }
        out.push_str("END\n");
        if !self.properties.is_empty() {
            out.push_str("PROPERTIES\n");
            for (agent, p) in &self.properties {
                let _ = writeln!(
                    out,
                    "{agent} rank={} tasked={} importance={} corporate={} special_ops={} department={}",
                    p.military_rank,
                    p.is_tasked(),
                    p.task_importance,
                    p.corporate_rank,
                    p.special_ops,
                    p.department.name(),
                );
            }
            out.push_str("END\n");
        }
        out
    }

    /// Scatter `obstacles` permanent obstacles and `agents` agents (ids
    /// `1..=agents`) over an empty grid, each agent with a random empty
    /// goal cell.
    pub fn random(
        width: u32,
        height: u32,
        obstacles: usize,
        agents: u32,
        rng: &mut impl Rng,
    ) -> Result<Self, ScenarioError> {
        if width == 0 || height == 0 {
            return Err(ScenarioError::Dimensions);
        }
        let mut free: Vec<Coord> = (0..width)
            .flat_map(|x| (0..height).map(move |y| Coord::new(x, y)))
            .collect();
        let agent_count = usize::try_from(agents).unwrap_or(usize::MAX);
        let requested = obstacles.saturating_add(agent_count.saturating_mul(2));
        if requested > free.len() {
            return Err(ScenarioError::Crowded { requested });
        }

        let mut scenario = Self {
            width,
            height,
            ..Self::default()
        };
        for _ in 0..obstacles {
            let cell = take_random(&mut free, rng).ok_or(ScenarioError::Crowded { requested })?;
            scenario.cells.insert(cell, CellValue::PermanentObstacle);
        }
        for raw in 1..=agents {
            let id = AgentId::new(raw);
            let start = take_random(&mut free, rng).ok_or(ScenarioError::Crowded { requested })?;
            let goal = take_random(&mut free, rng).ok_or(ScenarioError::Crowded { requested })?;
            scenario.cells.insert(start, CellValue::Agent(id));
            scenario.goals.insert(id, goal);
        }
        Ok(scenario)
    }
}

/// Remove and return a random element.
fn take_random(free: &mut Vec<Coord>, rng: &mut impl Rng) -> Option<Coord> {
    if free.is_empty() {
        return None;
    }
    let idx = rng.random_range(0..free.len());
    Some(free.swap_remove(idx))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;

    const SAMPLE: &str = "3 2
1 0
-1 0
0 2
GOALS
1 2 1
2 0 0
END
PROPERTIES
1 rank=3 tasked=true importance=4 department=navy
END
";

    #[test]
    fn parses_columns_goals_and_properties() {
        let scenario = Scenario::parse(SAMPLE).unwrap();
        assert_eq!((scenario.width, scenario.height), (3, 2));
        assert_eq!(
            scenario.cells.get(&Coord::new(0, 0)),
            Some(&CellValue::Agent(AgentId::new(1)))
        );
        assert_eq!(
            scenario.cells.get(&Coord::new(1, 0)),
            Some(&CellValue::PermanentObstacle)
        );
        assert_eq!(
            scenario.cells.get(&Coord::new(2, 1)),
            Some(&CellValue::Agent(AgentId::new(2)))
        );
        assert_eq!(scenario.cells.len(), 3);
        assert_eq!(scenario.goals.get(&AgentId::new(1)), Some(&Coord::new(2, 1)));
        let props = scenario.properties.get(&AgentId::new(1)).unwrap();
        assert_eq!(props.military_rank, 3);
        assert!(props.is_tasked());
        assert_eq!(props.department, Department::Navy);
    }

    #[test]
    fn text_round_trips() {
        let scenario = Scenario::parse(SAMPLE).unwrap();
        let again = Scenario::parse(&scenario.to_text()).unwrap();
        assert_eq!(again, scenario);
    }

    #[test]
    fn goals_block_is_optional() {
        let scenario = Scenario::parse("2 1\n0\n-2\n").unwrap();
        assert!(scenario.goals.is_empty());
        assert_eq!(
            scenario.cells.get(&Coord::new(1, 0)),
            Some(&CellValue::TemporaryObstacle)
        );
    }

    #[test]
    fn malformed_files_are_rejected() {
        assert!(matches!(Scenario::parse(""), Err(ScenarioError::Dimensions)));
        assert!(matches!(
            Scenario::parse("2 2\n0 0\n0\n"),
            Err(ScenarioError::ColumnLength { line: 3, .. })
        ));
        assert!(matches!(
            Scenario::parse("2 1\n0\n"),
            Err(ScenarioError::MissingColumns { expected: 2, found: 1 })
        ));
        assert!(matches!(
            Scenario::parse("1 2\n1 1\n"),
            Err(ScenarioError::DuplicateAgent(_))
        ));
        assert!(matches!(
            Scenario::parse("1 1\n0\nGOALS\n1 0 0\n"),
            Err(ScenarioError::Unterminated("GOALS"))
        ));
        assert!(matches!(
            Scenario::parse("1 1\n1\nPROPERTIES\n1 charm=9\nEND\n"),
            Err(ScenarioError::UnknownProperty { .. })
        ));
        assert!(matches!(
            Scenario::parse("1 1\nx\n"),
            Err(ScenarioError::InvalidValue { .. })
        ));
    }

    #[test]
    fn random_scenarios_fit_the_grid() {
        let mut rng = SmallRng::seed_from_u64(17);
        let scenario = Scenario::random(6, 5, 8, 3, &mut rng).unwrap();
        assert_eq!(scenario.cells.len(), 11);
        assert_eq!(scenario.goals.len(), 3);
        for goal in scenario.goals.values() {
            assert!(!scenario.cells.contains_key(goal));
        }
        assert!(matches!(
            Scenario::random(2, 2, 3, 1, &mut rng),
            Err(ScenarioError::Crowded { .. })
        ));
    }
}
