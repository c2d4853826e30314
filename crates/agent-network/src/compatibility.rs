//! Pair compatibility scoring
//!
//! A deterministic score for how well two agents should work as a debate
//! pair, computed from their profiles. Agents without a profile only get
//! the base score.

use std::collections::HashSet;

use promptlink_common::{AgentDescriptor, AgentProfile, CompatibilityLevel, CompatibilityReport};

const BASE_SCORE: u32 = 25;
const BEST_PAIR_BONUS: u32 = 30;
const PERSONALITY_BONUS: u32 = 20;
const SINGLE_OVERLAP_BONUS: u32 = 25;
const NO_OVERLAP_BONUS: u32 = 15;
const MAX_SCORE: u32 = 100;
const RECOMMENDED_SCORE: u32 = 70;

pub fn compatibility(a: &AgentDescriptor, b: &AgentDescriptor) -> CompatibilityReport {
    let mut score = BASE_SCORE;
    let mut factors = Vec::new();

    if let (Some(pa), Some(pb)) = (&a.profile, &b.profile) {
        let (bonus, reasons) = profile_bonus(&a.id, pa, &b.id, pb);
        score += bonus;
        factors.extend(reasons.into_iter().map(str::to_string));
    }

    let score = score.min(MAX_SCORE);
    CompatibilityReport {
        agent_a: a.id.clone(),
        agent_b: b.id.clone(),
        score: score as u8,
        level: CompatibilityLevel::from_score(score),
        factors,
        recommended: score >= RECOMMENDED_SCORE,
    }
}

fn profile_bonus(
    id_a: &str,
    a: &AgentProfile,
    id_b: &str,
    b: &AgentProfile,
) -> (u32, Vec<&'static str>) {
    let mut bonus = 0;
    let mut reasons = Vec::new();

    // Either side vouching for the other counts
    if a.best_pairs.iter().any(|id| id == id_b) || b.best_pairs.iter().any(|id| id == id_a) {
        bonus += BEST_PAIR_BONUS;
        reasons.push("Proven successful pairing");
    }

    if let (Some(pa), Some(pb)) = (&a.personality, &b.personality) {
        if !pa.eq_ignore_ascii_case(pb) {
            bonus += PERSONALITY_BONUS;
            reasons.push("Complementary personalities");
        }
    }

    let strengths_a: HashSet<&str> = a.strengths.iter().map(String::as_str).collect();
    let common = b
        .strengths
        .iter()
        .map(String::as_str)
        .collect::<HashSet<_>>()
        .intersection(&strengths_a)
        .count();
    if common == 1 {
        bonus += SINGLE_OVERLAP_BONUS;
        reasons.push("Balanced skill overlap");
    } else if common == 0 {
        bonus += NO_OVERLAP_BONUS;
        reasons.push("Diverse skill sets");
    }

    (bonus, reasons)
}
