//! Explanations of why an agent gave way.
//!
//! The loser's strongest failed argument is rendered from the loser's side
//! and paired with a winning argument that attacks it, e.g. "Although your
//! military rank is higher than theirs, their status is Tasked and your
//! status is At Ease."

use parley_types::ArgumentId;
use rand::Rng;

use crate::framework::ArgumentationFramework;

/// Openers for an explanation that concedes a point first.
const CONJUNCTIONS: [&str; 2] = ["Although", "Even though"];

/// Build the explanation shown when an agent concedes.
///
/// `victorious` are the winner's arguments this round, `failed` the
/// loser's. `winner` and `loser` are the possessives substituted into the
/// templates (`"your"` / `"their"`).
pub fn concession_hint(
    framework: &ArgumentationFramework,
    victorious: &[ArgumentId],
    failed: &[ArgumentId],
    winner: &str,
    loser: &str,
    rng: &mut impl Rng,
) -> String {
    let render = |id: ArgumentId, first: &str, second: &str| {
        framework
            .argument(id)
            .map(|argument| argument.render(first, second))
    };

    if let Some(strongest) = failed.iter().copied().max()
        && let Some(failed_text) = render(strongest, loser, winner)
    {
        let idx = rng.random_range(0..CONJUNCTIONS.len());
        let conjunction = CONJUNCTIONS.get(idx).copied().unwrap_or("Although");
        let rebuttal = victorious
            .iter()
            .copied()
            .find(|&id| framework.attacks(id, strongest))
            .or_else(|| victorious.first().copied())
            .and_then(|id| render(id, winner, loser));
        return match rebuttal {
            Some(rebuttal) => format!("{conjunction} {failed_text}, {rebuttal}."),
            None => format!("{conjunction} {failed_text}, {winner} right of way stands."),
        };
    }

    if let Some(text) = victorious
        .first()
        .and_then(|&id| render(id, winner, loser))
    {
        return format!("{}.", capitalize(&text));
    }
    format!("There are no arguments that challenge {winner} right of way.")
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}
