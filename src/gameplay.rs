use serde::Serialize;

use crate::physics_core::ContactSide;

/// Cents added to the coin sound per pickup.
pub const COIN_PITCH_STEP: f32 = 100.0;
/// Cents per second the coin pitch falls back towards zero.
pub const COIN_PITCH_DECAY: f32 = 100.0;

/// Something the player touched during a physics step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Contact {
    Coin,
    /// Spike or any other `danger` tile.
    Danger,
    /// Enemy contact; the side is the one of the player's body that touched it.
    Enemy(ContactSide),
    Portal,
    Apple,
    /// Player's head bumped a prize box from below.
    PrizeHeadbutt,
    FellOut,
    /// Player walked past the last column of a level with no portal.
    ReachedEnd,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(tag = "reaction", rename_all = "snake_case")]
pub enum Reaction {
    /// `detune` is the pitch shift (in cents) the pickup sound plays at.
    CollectCoin { coins: u32, detune: f32 },
    Die,
    StompEnemy,
    CompleteLevel,
    EatApple,
    ReleaseApple,
    Nothing,
}

/// Per-attempt gameplay bookkeeping that doesn't belong to any one entity.
#[derive(Clone, Debug, Default)]
pub struct Attempt {
    pub coins: u32,
    pub coin_pitch: f32,
    pub apple_alive: bool,
    pub finished: bool,
}

impl Attempt {
    pub fn with_coins(coins: u32) -> Self {
        Self {
            coins,
            ..Self::default()
        }
    }

    /// Decide what a contact does. Once the attempt has ended (death or
    /// completion) further contacts in the same step are ignored.
    pub fn react(&mut self, contact: Contact) -> Reaction {
        if self.finished {
            return Reaction::Nothing;
        }
        match contact {
            Contact::Coin => {
                let detune = self.coin_pitch;
                self.coin_pitch += COIN_PITCH_STEP;
                self.coins = self.coins.saturating_add(1);
                Reaction::CollectCoin {
                    coins: self.coins,
                    detune,
                }
            }
            Contact::Danger | Contact::FellOut => {
                self.finished = true;
                Reaction::Die
            }
            Contact::Enemy(ContactSide::Bottom) => Reaction::StompEnemy,
            Contact::Enemy(_) => {
                self.finished = true;
                Reaction::Die
            }
            Contact::Portal | Contact::ReachedEnd => {
                self.finished = true;
                Reaction::CompleteLevel
            }
            Contact::Apple => {
                self.apple_alive = false;
                Reaction::EatApple
            }
            Contact::PrizeHeadbutt => {
                if self.apple_alive {
                    Reaction::Nothing
                } else {
                    self.apple_alive = true;
                    Reaction::ReleaseApple
                }
            }
        }
    }

    /// Apple fell out of the world or was otherwise removed without being eaten.
    pub fn apple_lost(&mut self) {
        self.apple_alive = false;
    }

    pub fn tick(&mut self, dt: f32) {
        if self.coin_pitch > 0.0 {
            self.coin_pitch = (self.coin_pitch - COIN_PITCH_DECAY * dt).max(0.0);
        }
    }
}

/// Playback speed that shifts a sound by `cents`.
pub fn detune_to_speed(cents: f32) -> f32 {
    2f32.powf(cents / 1200.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coin_pitch_ramps_then_decays_to_zero() {
        let mut attempt = Attempt::default();
        assert_eq!(
            attempt.react(Contact::Coin),
            Reaction::CollectCoin {
                coins: 1,
                detune: 0.0
            }
        );
        assert_eq!(
            attempt.react(Contact::Coin),
            Reaction::CollectCoin {
                coins: 2,
                detune: 100.0
            }
        );
        attempt.tick(0.5);
        assert!((attempt.coin_pitch - 150.0).abs() < 1e-3);
        for _ in 0..300 {
            attempt.tick(1.0 / 60.0);
        }
        assert_eq!(attempt.coin_pitch, 0.0);
        assert_eq!(attempt.coins, 2);
    }

    #[test]
    fn stomp_kills_enemy_but_side_hit_kills_player() {
        let mut attempt = Attempt::default();
        assert_eq!(
            attempt.react(Contact::Enemy(ContactSide::Bottom)),
            Reaction::StompEnemy
        );
        assert!(!attempt.finished);
        assert_eq!(
            attempt.react(Contact::Enemy(ContactSide::Left)),
            Reaction::Die
        );
        assert!(attempt.finished);
        assert_eq!(attempt.react(Contact::Portal), Reaction::Nothing);
    }

    #[test]
    fn only_one_apple_at_a_time() {
        let mut attempt = Attempt::default();
        assert_eq!(attempt.react(Contact::PrizeHeadbutt), Reaction::ReleaseApple);
        assert_eq!(attempt.react(Contact::PrizeHeadbutt), Reaction::Nothing);
        assert_eq!(attempt.react(Contact::Apple), Reaction::EatApple);
        assert_eq!(attempt.react(Contact::PrizeHeadbutt), Reaction::ReleaseApple);
        attempt.apple_lost();
        assert_eq!(attempt.react(Contact::PrizeHeadbutt), Reaction::ReleaseApple);
    }

    #[test]
    fn portal_and_level_end_complete() {
        let mut a = Attempt::with_coins(4);
        assert_eq!(a.react(Contact::Portal), Reaction::CompleteLevel);
        assert_eq!(a.coins, 4);
        let mut b = Attempt::default();
        assert_eq!(b.react(Contact::ReachedEnd), Reaction::CompleteLevel);
        let mut c = Attempt::default();
        assert_eq!(c.react(Contact::FellOut), Reaction::Die);
    }

    #[test]
    fn detune_speed_doubles_per_octave() {
        assert!((detune_to_speed(0.0) - 1.0).abs() < 1e-6);
        assert!((detune_to_speed(1200.0) - 2.0).abs() < 1e-5);
        assert!((detune_to_speed(100.0) - 1.059_463).abs() < 1e-4);
    }
}
