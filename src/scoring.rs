//! Risk classification engine.
//!
//! Maps an (impact, likelihood) pair to a qualitative band:
//!
//! | score = impact x likelihood | band     |
//! |-----------------------------|----------|
//! | 1 ..= 4                     | LOW      |
//! | 5 ..= 8                     | MEDIUM   |
//! | 9 ..= 12                    | HIGH     |
//! | 13 ..= 20                   | CRITICAL |
//!
//! Impact scores LOW..CRITICAL as 1..4, likelihood scores RARE..CERTAIN as 1..5.
//! The band is a pure function of its inputs and is recomputed on every read;
//! it is never persisted.

use grc_types::{Impact, Likelihood, RiskLevel, RiskScore};

use crate::error::Result;

pub fn impact_score(impact: Impact) -> u8 {
    match impact {
        Impact::Low => 1,
        Impact::Medium => 2,
        Impact::High => 3,
        Impact::Critical => 4,
    }
}

pub fn likelihood_score(likelihood: Likelihood) -> u8 {
    match likelihood {
        Likelihood::Rare => 1,
        Likelihood::Unlikely => 2,
        Likelihood::Possible => 3,
        Likelihood::Likely => 4,
        Likelihood::Certain => 5,
    }
}

/// Band for a composite score. Bounds are inclusive upper bounds.
pub fn band(score: u8) -> RiskLevel {
    match score {
        0..=4 => RiskLevel::Low,
        5..=8 => RiskLevel::Medium,
        9..=12 => RiskLevel::High,
        _ => RiskLevel::Critical,
    }
}

pub fn assess(impact: Impact, likelihood: Likelihood) -> RiskScore {
    let score = impact_score(impact) * likelihood_score(likelihood);
    RiskScore {
        impact,
        likelihood,
        score,
        level: band(score),
    }
}

pub fn classify(impact: Impact, likelihood: Likelihood) -> RiskLevel {
    assess(impact, likelihood).level
}

/// Classify from raw codes. Fails with `InvalidEnumValue` when either code is
/// outside its closed set; there is no fallback band.
pub fn classify_codes(impact: &str, likelihood: &str) -> Result<RiskLevel> {
    let impact = Impact::parse(impact)?;
    let likelihood = Likelihood::parse(likelihood)?;
    Ok(classify(impact, likelihood))
}

/// The full 4 x 5 matrix, impact-major.
pub fn matrix() -> Vec<RiskScore> {
    Impact::ALL
        .iter()
        .flat_map(|&impact| {
            Likelihood::ALL
                .iter()
                .map(move |&likelihood| assess(impact, likelihood))
        })
        .collect()
}
