use std::collections::HashSet;

use rand::{seq::SliceRandom, Rng};
use serde::Serialize;

use crate::{
    core::player::{Monkey, Player},
    error::{Error, Result},
};

/// The monkey a player was handed for a round
#[derive(PartialEq, Eq, Debug, Clone, Serialize)]
pub struct Assignment {
    pub player_tag: String,
    pub assigned_monkey: Monkey,
    pub got_preference: bool,
}

/// Outcome of one roll of the distribution, in roster order
#[derive(PartialEq, Eq, Debug, Clone, Serialize)]
pub struct Distribution {
    pub assignments: Vec<Assignment>,
    pub preferences_honored: usize,
    pub message: String,
}

/// Hands every player in `roster` a distinct monkey.
///
/// Uncontested preferences are granted first. A monkey wanted by several
/// players goes to one of them at random. Whatever is left over is shuffled
/// and dealt to the remaining players in roster order.
pub fn distribute_monkeys<R: Rng>(roster: &[Player], rng: &mut R) -> Result<Distribution> {
    if roster.len() > Monkey::ALL.len() {
        return Err(Error::validation(format!(
            "Cannot distribute {} monkeys between {} players",
            Monkey::ALL.len(),
            roster.len()
        )));
    }

    let mut seen = HashSet::new();
    if let Some(dup) = roster.iter().find(|p| !seen.insert(p.player_tag.as_str())) {
        return Err(Error::validation(format!(
            "Player {} is listed more than once",
            dup.player_tag
        )));
    }

    // Indexed by roster position
    let mut assigned: Vec<Option<Monkey>> = vec![None; roster.len()];
    let mut available: Vec<Monkey> = Monkey::ALL.to_vec();

    let contenders_for = |monkey: Monkey| -> Vec<usize> {
        roster
            .iter()
            .enumerate()
            .filter(|(_, p)| p.monkey_preference == monkey)
            .map(|(i, _)| i)
            .collect()
    };

    for monkey in Monkey::ALL {
        if let [only] = contenders_for(monkey).as_slice() {
            assigned[*only] = Some(monkey);
            available.retain(|m| *m != monkey);
        }
    }

    for monkey in Monkey::ALL {
        let contenders = contenders_for(monkey);
        if contenders.len() < 2 || !available.contains(&monkey) {
            continue;
        }

        let lucky = contenders[rng.gen_range(0..contenders.len())];
        log::debug!("{} wins the draw for {}", roster[lucky].player_tag, monkey);
        assigned[lucky] = Some(monkey);
        available.retain(|m| *m != monkey);
    }

    available.shuffle(rng);
    let mut leftovers = available.into_iter();
    for slot in assigned.iter_mut().filter(|a| a.is_none()) {
        *slot = leftovers.next();
    }

    let assignments: Vec<Assignment> = roster
        .iter()
        .zip(assigned)
        .map(|(player, monkey)| {
            // Roster size is checked above, so a monkey is always left
            let monkey = monkey.unwrap_or(player.monkey_preference);
            Assignment {
                player_tag: player.player_tag.clone(),
                assigned_monkey: monkey,
                got_preference: monkey == player.monkey_preference,
            }
        })
        .collect();

    let preferences_honored = assignments.iter().filter(|a| a.got_preference).count();
    let message = if preferences_honored == roster.len() {
        "Everyone got their preferred monkey!".to_string()
    } else {
        format!(
            "{} player{} got their preferred monkey!",
            preferences_honored,
            if preferences_honored == 1 { "" } else { "s" }
        )
    };

    Ok(Distribution {
        assignments,
        preferences_honored,
        message,
    })
}
