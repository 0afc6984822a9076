//! Player vitals under hazard exposure.
//!
//! One pure update per tick from `(in_fire, smoke_level, dt)`:
//! - Fire burns 10 health per second.
//! - Smoke erodes visibility (floor 0.1) and speed (floor 0.3) in proportion
//!   to its density, and above 0.7 adds damage ramping to ~1/s at full smoke.
//! - Clean air lets visibility and speed recover toward 1.0.
//!
//! Health never regenerates, and `alive` flips to false exactly once, when
//! health reaches zero.

use crate::constants::vitals;
use crate::layout::Vec3;
use serde::{Deserialize, Serialize};

/// Snapshot of the player's condition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerVitals {
    /// Health in [0, 100].
    pub health: f32,
    /// Visibility in [0.1, 1].
    pub visibility: f32,
    /// Movement speed multiplier in [0.3, 1].
    pub speed_multiplier: f32,
    pub alive: bool,
    pub total_damage: f32,
    pub time_in_fire: f32,
    pub time_in_smoke: f32,
}

impl Default for PlayerVitals {
    fn default() -> Self {
        Self {
            health: vitals::MAX_HEALTH,
            visibility: 1.0,
            speed_multiplier: 1.0,
            alive: true,
            total_damage: 0.0,
            time_in_fire: 0.0,
            time_in_smoke: 0.0,
        }
    }
}

/// Reject non-positive and non-finite tick deltas. Callers apply their own
/// upper bound.
pub fn sanitize_delta(dt: f32) -> Option<f32> {
    if !dt.is_finite() || dt <= 0.0 {
        None
    } else {
        Some(dt)
    }
}

/// Damage per second from breathing smoke of the given density.
pub fn smoke_damage_rate(smoke_level: f32) -> f32 {
    if smoke_level <= vitals::SMOKE_DAMAGE_THRESHOLD {
        return 0.0;
    }
    let span = 1.0 - vitals::SMOKE_DAMAGE_THRESHOLD;
    let ramp = (smoke_level - vitals::SMOKE_DAMAGE_THRESHOLD) / span;
    vitals::MAX_SMOKE_DAMAGE_PER_SEC * ramp.min(1.0)
}

/// Owns the player's vitals and last known position.
#[derive(Debug, Clone)]
pub struct PlayerStateManager {
    vitals: PlayerVitals,
    position: Vec3,
}

impl PlayerStateManager {
    pub fn new(position: Vec3) -> Self {
        Self {
            vitals: PlayerVitals::default(),
            position,
        }
    }

    pub fn vitals(&self) -> &PlayerVitals {
        &self.vitals
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn is_alive(&self) -> bool {
        self.vitals.alive
    }

    /// Advance vitals by one exposure step. Returns the damage applied.
    pub fn update(&mut self, in_fire: bool, smoke_level: f32, delta_time: f32) -> f32 {
        let Some(dt) = sanitize_delta(delta_time) else {
            if delta_time != 0.0 {
                log::warn!("Ignoring anomalous vitals delta {}", delta_time);
            }
            return 0.0;
        };
        if !self.vitals.alive {
            return 0.0;
        }
        let smoke = if smoke_level.is_nan() {
            0.0
        } else {
            smoke_level.clamp(0.0, 1.0)
        };
        let v = &mut self.vitals;

        let mut damage = 0.0;
        if in_fire {
            damage += vitals::FIRE_DAMAGE_PER_SEC * dt;
            v.time_in_fire += dt;
        }

        if smoke > 0.0 {
            v.time_in_smoke += dt;
            let vis_loss = smoke * vitals::VISIBILITY_DECAY_RATE * dt;
            let speed_loss = smoke * vitals::SPEED_DECAY_RATE * dt;
            v.visibility = (v.visibility - vis_loss).max(vitals::MIN_VISIBILITY);
            v.speed_multiplier = (v.speed_multiplier - speed_loss).max(vitals::MIN_SPEED);
            damage += smoke_damage_rate(smoke) * dt;
        } else {
            v.visibility = (v.visibility + vitals::RECOVERY_RATE * dt).min(1.0);
            v.speed_multiplier = (v.speed_multiplier + vitals::RECOVERY_RATE * dt).min(1.0);
        }

        let applied = damage.min(v.health);
        v.health -= applied;
        v.total_damage += applied;
        if v.health <= 0.0 {
            v.health = 0.0;
            v.alive = false;
            log::info!(
                "Player died after {:.1}s in fire, {:.1}s in smoke",
                v.time_in_fire,
                v.time_in_smoke
            );
        }
        applied
    }

    /// Restore full vitals at a new position.
    pub fn reset(&mut self, position: Vec3) {
        self.vitals = PlayerVitals::default();
        self.position = position;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player() -> PlayerStateManager {
        PlayerStateManager::new(Vec3::default())
    }

    #[test]
    fn test_fire_damage_rate() {
        let mut p = player();
        let dealt = p.update(true, 0.0, 1.0);
        assert!((dealt - 10.0).abs() < 1e-5);
        assert!((p.vitals().health - 90.0).abs() < 1e-5);
        assert!((p.vitals().time_in_fire - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_death_exactly_once() {
        let mut p = player();
        for _ in 0..5 {
            p.update(true, 0.0, 2.0);
        }
        assert_eq!(p.vitals().health, 0.0);
        assert!(!p.is_alive());
        assert!((p.vitals().total_damage - 100.0).abs() < 1e-4);
        // Further exposure changes nothing.
        assert_eq!(p.update(true, 1.0, 1.0), 0.0);
        assert_eq!(p.vitals().health, 0.0);
    }

    #[test]
    fn test_health_clamped_at_zero() {
        let mut p = player();
        for _ in 0..3 {
            p.update(true, 1.0, 5.0);
        }
        assert_eq!(p.vitals().health, 0.0);
        assert!(!p.is_alive());
    }

    #[test]
    fn test_light_smoke_no_damage() {
        let mut p = player();
        p.update(false, 0.5, 1.0);
        assert_eq!(p.vitals().health, vitals::MAX_HEALTH);
        assert!(p.vitals().visibility < 1.0);
        assert!(p.vitals().speed_multiplier < 1.0);
        assert!((p.vitals().time_in_smoke - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_smoke_damage_ramp() {
        assert_eq!(smoke_damage_rate(0.7), 0.0);
        assert!((smoke_damage_rate(1.0) - 1.0).abs() < 1e-5);
        let mid = smoke_damage_rate(0.85);
        assert!(mid > 0.4 && mid < 0.6);
    }

    #[test]
    fn test_floors_respected() {
        let mut p = player();
        for _ in 0..20 {
            p.update(false, 1.0, 1.0);
        }
        assert!((p.vitals().visibility - vitals::MIN_VISIBILITY).abs() < 1e-6);
        assert!((p.vitals().speed_multiplier - vitals::MIN_SPEED).abs() < 1e-6);
    }

    #[test]
    fn test_recovery_in_clean_air() {
        let mut p = player();
        p.update(false, 1.0, 1.0);
        let vis = p.vitals().visibility;
        p.update(false, 0.0, 1.0);
        assert!(p.vitals().visibility > vis);
        for _ in 0..20 {
            p.update(false, 0.0, 1.0);
        }
        assert_eq!(p.vitals().visibility, 1.0);
        assert_eq!(p.vitals().speed_multiplier, 1.0);
    }

    #[test]
    fn test_anomalous_delta_skipped() {
        let mut p = player();
        assert_eq!(p.update(true, 0.0, -1.0), 0.0);
        assert_eq!(p.update(true, 0.0, f32::NAN), 0.0);
        assert_eq!(p.update(true, 0.0, 0.0), 0.0);
        assert_eq!(p.vitals().health, vitals::MAX_HEALTH);
    }

    #[test]
    fn test_long_delta_not_clamped() {
        assert_eq!(sanitize_delta(12.5), Some(12.5));
        let mut p = player();
        let dealt = p.update(true, 0.0, 8.0);
        assert!((dealt - vitals::FIRE_DAMAGE_PER_SEC * 8.0).abs() < 1e-4);
    }

    #[test]
    fn test_reset_restores() {
        let mut p = player();
        p.update(true, 0.9, 3.0);
        p.reset(Vec3::new(1.0, 2.0, 0.0));
        assert_eq!(*p.vitals(), PlayerVitals::default());
        assert_eq!(p.position(), Vec3::new(1.0, 2.0, 0.0));
    }
}
