//! Ending engagements: points, eliminations and angel acquisition

use super::Game;
use crate::action::Action;
use crate::creature::CreatureKind;
use crate::error::{illegal_recruit, invariant, out_of_turn, GameError, Result};
use crate::legion::MAX_HEIGHT;

/// How an engagement ended
#[derive(Clone, Debug)]
pub(crate) struct Outcome {
    pub winner: Option<String>,
    pub losers: Vec<String>,
    /// Points for the winner's owner
    pub points: u32,
    /// Dead creatures leave the game; fled ones return to the bank
    pub to_graveyard: bool,
    pub time_loss: bool,
}

impl Game {
    /// Close the current engagement: remove the losers, score, eliminate
    /// players without a titan and offer angels to the winner
    pub(crate) fn conclude(&mut self, out: &mut Vec<Action>, outcome: Outcome) -> Result<()> {
        let Some(engagement) = self.engagement.clone() else {
            return invariant("no engagement to conclude");
        };
        let owner_of = |game: &Game, marker: &str| -> Result<String> {
            game.legion(marker)
                .map(|l| l.owner.clone())
                .ok_or_else(|| GameError::InvariantViolation(format!("no legion {marker}")))
        };
        let attacker_player = owner_of(self, &engagement.attacker)?;
        let defender_player = owner_of(self, &engagement.defender)?;
        let winner_player = match &outcome.winner {
            Some(marker) => Some(owner_of(self, marker)?),
            None => None,
        };
        let mut losers = Vec::with_capacity(outcome.losers.len());
        for marker in &outcome.losers {
            losers.push((owner_of(self, marker)?, marker.clone()));
        }
        let score_before = winner_player
            .as_deref()
            .and_then(|p| self.player(p))
            .map_or(0, |p| p.score);

        self.emit(
            out,
            Action::BattleOver {
                hex: engagement.hex,
                winner: outcome.winner.clone(),
                losers: outcome.losers.clone(),
                time_loss: outcome.time_loss,
            },
        )?;
        for (player, marker) in &losers {
            self.emit(
                out,
                Action::RemoveLegion {
                    player: player.clone(),
                    marker: marker.clone(),
                    to_graveyard: outcome.to_graveyard,
                },
            )?;
        }
        if let (Some(player), true) = (&winner_player, outcome.points > 0) {
            self.emit(
                out,
                Action::ScorePoints {
                    player: player.clone(),
                    points: outcome.points,
                },
            )?;
        }

        // Anyone who lost their titan, or their last legion, is out
        let mut deaths = Vec::new();
        for (player, _) in &losers {
            let dead = self.player(player).is_some_and(|p| !p.dead && !p.has_titan());
            if dead && !deaths.iter().any(|(d, _)| d == player) {
                let slayer = if *player == attacker_player {
                    defender_player.clone()
                } else {
                    attacker_player.clone()
                };
                deaths.push((player.clone(), Some(slayer)));
            }
        }
        if !deaths.is_empty() {
            self.eliminate(out, deaths)?;
        }
        if self.over {
            return Ok(());
        }

        if let (Some(player), Some(marker)) = (&winner_player, &outcome.winner) {
            self.offer_angels(out, player, marker, score_before)?;
        }

        let active_dead = self.active_player().map_or(true, |p| p.dead);
        if active_dead {
            let (next, turn) = self
                .next_player_and_turn()
                .ok_or_else(|| GameError::InvariantViolation("no living player".into()))?;
            self.emit(out, Action::StartSplitPhase { player: next, turn })?;
        }
        Ok(())
    }

    /// Remove players from the game. Each slayer still alive scores half
    /// the victim's remaining legions and takes its markers.
    pub(crate) fn eliminate(&mut self, out: &mut Vec<Action>, deaths: Vec<(String, Option<String>)>) -> Result<()> {
        let dying = |name: &str| deaths.iter().any(|(d, _)| d == name);
        for (name, slayer) in &deaths {
            let Some(victim) = self.player(name) else {
                return invariant(format!("no player {name}"));
            };
            let points = victim.legion_points() / 2;
            let markers: Vec<String> = victim.legions.keys().cloned().collect();
            for marker in markers {
                self.emit(
                    out,
                    Action::RemoveLegion {
                        player: name.clone(),
                        marker,
                        to_graveyard: false,
                    },
                )?;
            }
            let Some(slayer) = slayer.as_ref().filter(|s| !dying(s)) else {
                continue;
            };
            if points > 0 {
                self.emit(
                    out,
                    Action::ScorePoints {
                        player: slayer.clone(),
                        points,
                    },
                )?;
            }
            self.emit(
                out,
                Action::CaptureMarkers {
                    player: slayer.clone(),
                    from: name.clone(),
                },
            )?;
        }
        self.emit(out, Action::EliminatePlayers { deaths })?;
        if self.over {
            let winner = match self.finish_order.first() {
                Some(group) if group.len() == 1 && self.player(&group[0]).is_some_and(|p| !p.dead) => {
                    Some(group[0].clone())
                }
                _ => None,
            };
            self.emit(out, Action::GameOver { winner })?;
        }
        Ok(())
    }

    /// Offer one angel for every threshold the winner's score crossed
    fn offer_angels(&mut self, out: &mut Vec<Action>, player: &str, marker: &str, score_before: u32) -> Result<()> {
        let (Some(owner), Some(legion)) = (self.player(player), self.legion(marker)) else {
            return Ok(());
        };
        let crossed = |every: u32| (owner.score / every.max(1)).saturating_sub(score_before / every.max(1));
        let room = MAX_HEIGHT.saturating_sub(legion.height()) as u32;
        let archangel_supply = self.pool.num_left(CreatureKind::ARCHANGEL) as u32;
        let angel_supply = self.pool.num_left(CreatureKind::ANGEL) as u32;

        let archangels = crossed(self.config.archangel_every).min(archangel_supply);
        let angels = crossed(self.config.angel_every)
            .min(room)
            .min(archangels + angel_supply);
        let archangels = archangels.min(angels);
        if angels == 0 {
            return Ok(());
        }
        self.emit(
            out,
            Action::AcquisitionOffered {
                player: player.to_string(),
                marker: marker.to_string(),
                angels: angels as u8,
                archangels: archangels as u8,
            },
        )
    }

    pub(crate) fn acquire_angels(
        &mut self,
        player: &str,
        marker: &str,
        angels: Vec<CreatureKind>,
        out: &mut Vec<Action>,
    ) -> Result<()> {
        let Some(offer) = self.acquisition.clone().filter(|a| a.player == player && a.marker == marker) else {
            return out_of_turn(format!("{marker} has no angels to acquire"));
        };
        let archangels = angels.iter().filter(|&&k| k == CreatureKind::ARCHANGEL).count();
        let plain = angels.iter().filter(|&&k| k == CreatureKind::ANGEL).count();
        if archangels + plain != angels.len() {
            return illegal_recruit("only Angels and Archangels can be acquired");
        }
        if angels.len() > offer.angels as usize || archangels > offer.archangels as usize {
            return illegal_recruit(format!(
                "offer is {} angels of which {} may be archangels",
                offer.angels, offer.archangels
            ));
        }
        if (self.pool.num_left(CreatureKind::ARCHANGEL) as usize) < archangels
            || (self.pool.num_left(CreatureKind::ANGEL) as usize) < plain
        {
            return illegal_recruit("not enough angels left");
        }
        let height = self.owned_legion(player, marker)?.height();
        if height + angels.len() > MAX_HEIGHT {
            return invariant(format!("{marker} has no room for {} angels", angels.len()));
        }
        self.emit(
            out,
            Action::AcquireAngels {
                player: player.to_string(),
                marker: marker.to_string(),
                angels,
            },
        )
    }

    pub(crate) fn do_not_acquire_angels(&mut self, player: &str, marker: &str, out: &mut Vec<Action>) -> Result<()> {
        if !self
            .acquisition
            .as_ref()
            .is_some_and(|a| a.player == player && a.marker == marker)
        {
            return out_of_turn(format!("{marker} has no angels to acquire"));
        }
        self.emit(
            out,
            Action::DoNotAcquireAngels {
                player: player.to_string(),
                marker: marker.to_string(),
            },
        )
    }
}
