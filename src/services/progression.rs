//! Experience and leveling
//!
//! The level curve is `level = floor(sqrt(xp / 100)) + 1`. Level-up
//! achievements (`level_<n>`) are unlocked for every level crossed, and
//! the first unlock in a call pays a flat XP bonus. The bonus can push
//! the user over another threshold, which unlocks further achievements
//! but never a second bonus.

use bson::doc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::db::schemas::{UserDoc, USER_COLLECTION};
use crate::db::MongoClient;
use crate::types::{LumenError, Result};

/// Flat XP bonus paid when a call unlocks at least one achievement
pub const ACHIEVEMENT_BONUS_XP: i64 = 100;

/// Largest XP amount a single award may carry
pub const MAX_AWARD_AMOUNT: i64 = 1_000_000;

/// Attempts before giving up on a contended XP update
const CAS_MAX_ATTEMPTS: u32 = 5;

/// Level implied by an XP total, always >= 1
pub fn level_for_xp(xp: i64) -> i64 {
    let xp = xp.max(0);
    ((xp as f64 / 100.0).sqrt().floor() as i64) + 1
}

/// Outcome of an experience award
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AwardResult {
    pub xp: i64,
    pub level: i64,
    pub leveled_up: bool,
    pub new_achievements: Vec<String>,
}

/// Compute the full effect of awarding `amount` XP to a user whose
/// current state is (`xp`, `level`, `achievements`). Pure and total:
/// `amount` is clamped to `[0, MAX_AWARD_AMOUNT]` and additions
/// saturate, so no input can wrap XP negative.
pub fn plan_award(xp: i64, level: i64, achievements: &[String], amount: i64) -> AwardResult {
    let amount = amount.clamp(0, MAX_AWARD_AMOUNT);
    let mut new_xp = xp.saturating_add(amount);
    let mut new_level = level_for_xp(new_xp);
    let mut unlocked = Vec::new();

    // Every level crossed gets its achievement, lowest first
    for n in (level + 1)..=new_level {
        let name = format!("level_{}", n);
        if !achievements.contains(&name) {
            unlocked.push(name);
        }
    }

    // One bonus per call, then a single re-check for levels the bonus
    // itself crossed. No cascading bonuses.
    if !unlocked.is_empty() {
        new_xp = new_xp.saturating_add(ACHIEVEMENT_BONUS_XP);
        let rechecked = level_for_xp(new_xp);
        for n in (new_level + 1)..=rechecked {
            let name = format!("level_{}", n);
            if !achievements.contains(&name) {
                unlocked.push(name);
            }
        }
        new_level = rechecked;
    }

    AwardResult {
        xp: new_xp,
        level: new_level,
        leveled_up: new_level > level,
        new_achievements: unlocked,
    }
}

/// Awards XP and maintains the cached level and achievement list
#[derive(Clone)]
pub struct ProgressionService {
    mongo: MongoClient,
}

impl ProgressionService {
    pub fn new(mongo: MongoClient) -> Self {
        Self { mongo }
    }

    /// Award `amount` XP to a user.
    ///
    /// The write is conditioned on the XP value read in the same attempt,
    /// so concurrent awards retry instead of clobbering each other.
    pub async fn award_experience(
        &self,
        user_id: &str,
        amount: i64,
        reason: &str,
    ) -> Result<AwardResult> {
        if amount < 0 {
            return Err(LumenError::invalid_input(
                "experience amount must be non-negative",
            ));
        }
        if amount > MAX_AWARD_AMOUNT {
            return Err(LumenError::invalid_input(format!(
                "experience amount must not exceed {}",
                MAX_AWARD_AMOUNT
            )));
        }

        let users = self
            .mongo
            .collection::<UserDoc>(USER_COLLECTION)
            .await?;

        for attempt in 1..=CAS_MAX_ATTEMPTS {
            let user = users
                .find_one(doc! { "id": user_id })
                .await?
                .ok_or_else(|| LumenError::not_found(format!("user {}", user_id)))?;

            let plan = plan_award(
                user.experience_points,
                user.level,
                &user.achievements,
                amount,
            );

            let mut update = doc! {
                "$set": {
                    "experience_points": plan.xp,
                    "level": plan.level,
                    "metadata.updated_at": bson::DateTime::now(),
                }
            };
            if !plan.new_achievements.is_empty() {
                update.insert(
                    "$addToSet",
                    doc! { "achievements": { "$each": plan.new_achievements.clone() } },
                );
            }

            // Conditioned on the XP we just read; matched_count tells us
            // whether we won the race (modified_count is 0 for a no-op
            // $set, e.g. amount == 0).
            let result = users
                .update_one(
                    doc! { "id": user_id, "experience_points": user.experience_points },
                    update,
                )
                .await?;

            if result.matched_count > 0 {
                if plan.leveled_up {
                    info!(
                        user_id,
                        level = plan.level,
                        achievements = ?plan.new_achievements,
                        reason,
                        "user leveled up"
                    );
                } else {
                    debug!(user_id, amount, reason, "experience awarded");
                }
                return Ok(plan);
            }

            warn!(user_id, attempt, "concurrent experience update, retrying");
        }

        Err(LumenError::conflict(format!(
            "experience update for user {} kept losing races",
            user_id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_curve_known_points() {
        assert_eq!(level_for_xp(0), 1);
        assert_eq!(level_for_xp(99), 1);
        assert_eq!(level_for_xp(100), 2);
        assert_eq!(level_for_xp(350), 2);
        assert_eq!(level_for_xp(400), 3);
        assert_eq!(level_for_xp(900), 4);
        assert_eq!(level_for_xp(-5), 1);
    }

    #[test]
    fn level_curve_monotone() {
        let mut prev = 0;
        for xp in 0..5_000 {
            let level = level_for_xp(xp);
            assert!(level >= prev, "level decreased at xp={}", xp);
            prev = level;
        }
    }

    #[test]
    fn award_250_from_zero_unlocks_level_2_with_bonus() {
        let plan = plan_award(0, 1, &[], 250);
        assert_eq!(plan.xp, 350);
        assert_eq!(plan.level, 2);
        assert!(plan.leveled_up);
        assert_eq!(plan.new_achievements, vec!["level_2".to_string()]);
    }

    #[test]
    fn no_level_up_means_no_bonus() {
        let plan = plan_award(0, 1, &[], 50);
        assert_eq!(plan.xp, 50);
        assert_eq!(plan.level, 1);
        assert!(!plan.leveled_up);
        assert!(plan.new_achievements.is_empty());
    }

    #[test]
    fn multi_level_jump_unlocks_every_intermediate_level() {
        // 0 -> 1600 XP crosses levels 2..=5, bonus lands at 1700 (still 5)
        let plan = plan_award(0, 1, &[], 1600);
        assert_eq!(
            plan.new_achievements,
            vec!["level_2", "level_3", "level_4", "level_5"]
        );
        assert_eq!(plan.xp, 1700);
        assert_eq!(plan.level, 5);
    }

    #[test]
    fn bonus_only_paid_when_something_unlocks() {
        // 340 + 50 = 390 stays on level 2, so no bonus either
        let plan = plan_award(340, 2, &["level_2".to_string()], 50);
        assert!(plan.new_achievements.is_empty());
        assert_eq!(plan.xp, 390);

        // 350 + 50 = 400 crosses level 3; bonus -> 500, still level 3
        let plan = plan_award(350, 2, &["level_2".to_string()], 50);
        assert_eq!(plan.new_achievements, vec!["level_3".to_string()]);
        assert_eq!(plan.xp, 500);
        assert_eq!(plan.level, 3);
    }

    #[test]
    fn bonus_crossed_level_is_unlocked_by_the_recheck() {
        // 50 + 300 = 350 crosses level 2; the bonus lands at 450, which
        // crosses level 3 too. The re-check unlocks it without paying a
        // second bonus.
        let plan = plan_award(50, 1, &[], 300);
        assert_eq!(
            plan.new_achievements,
            vec!["level_2".to_string(), "level_3".to_string()]
        );
        assert_eq!(plan.xp, 450);
        assert_eq!(plan.level, 3);
    }

    #[test]
    fn already_held_achievements_are_not_re_unlocked() {
        let held = vec!["level_2".to_string(), "level_3".to_string()];
        let plan = plan_award(0, 1, &held, 400);
        // Crosses 2 and 3 but both are held, so no unlock and no bonus
        assert!(plan.new_achievements.is_empty());
        assert_eq!(plan.xp, 400);
        assert_eq!(plan.level, 3);
    }

    #[test]
    fn oversized_award_is_clamped_not_wrapped() {
        // i64::MAX must not overflow the addition; it is clamped to the
        // per-award cap, and XP stays positive.
        let plan = plan_award(100, 1, &[], i64::MAX);
        assert_eq!(plan.xp, 100 + MAX_AWARD_AMOUNT + ACHIEVEMENT_BONUS_XP);
        assert!(plan.xp > 0);
        assert!(plan.leveled_up);

        // Negative amounts are treated as zero (the service rejects them
        // before this point)
        let plan = plan_award(50, 1, &[], -20);
        assert_eq!(plan.xp, 50);
        assert!(!plan.leveled_up);
    }

    #[test]
    fn award_result_serializes_camel_case() {
        let plan = plan_award(0, 1, &[], 250);
        let json = serde_json::to_value(&plan).unwrap();
        assert_eq!(json["xp"], 350);
        assert_eq!(json["leveledUp"], true);
        assert_eq!(json["newAchievements"][0], "level_2");
    }
}
