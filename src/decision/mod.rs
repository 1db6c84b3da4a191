//! Action decision engine
//!
//! Chooses exactly one action per cycle from the classified state and the
//! candidate lists. The priority chain is an explicit ordered tier list,
//! evaluated top to bottom, first applicable tier wins; tier order encodes
//! domain priority, not geometry. The engine never inspects pixels, which
//! keeps it testable with synthetic candidate sets.

use serde::{Deserialize, Serialize};

use crate::config::{DecisionSettings, FallbackPolicy, PrimaryRegion};
use crate::device::ScreenScaler;
use crate::vision::{Candidate, CandidateSet, ScreenState};
use crate::Action;

/// One action decision with its audit trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub action: Action,
    /// 1-based rank of the tier that fired
    pub tier: u8,
    pub rationale: String,
}

/// The priority tiers, in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    WaitWhileLoading,
    PrimaryRegionTemplate,
    PrivilegedColor,
    BestTemplate,
    LargestBlob,
    Fallback,
}

const TIERS: [Tier; 6] = [
    Tier::WaitWhileLoading,
    Tier::PrimaryRegionTemplate,
    Tier::PrivilegedColor,
    Tier::BestTemplate,
    Tier::LargestBlob,
    Tier::Fallback,
];

/// Priority-chain decision engine
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    settings: DecisionSettings,
}

impl DecisionEngine {
    pub fn new(settings: DecisionSettings) -> Self {
        Self { settings }
    }

    /// Decide the single action for this cycle
    pub fn decide(
        &self,
        state: ScreenState,
        frame_size: (u32, u32),
        candidates: &CandidateSet,
    ) -> Decision {
        for (index, tier) in TIERS.iter().enumerate() {
            if let Some((action, rationale)) = self.try_tier(*tier, state, frame_size, candidates)
            {
                return Decision {
                    action,
                    tier: (index + 1) as u8,
                    rationale,
                };
            }
        }

        // The fallback tier always applies; this is unreachable in practice
        Decision {
            action: Action::Wait,
            tier: TIERS.len() as u8,
            rationale: "no tier applied".to_string(),
        }
    }

    fn try_tier(
        &self,
        tier: Tier,
        state: ScreenState,
        frame_size: (u32, u32),
        candidates: &CandidateSet,
    ) -> Option<(Action, String)> {
        match tier {
            Tier::WaitWhileLoading => {
                if state == ScreenState::Loading {
                    Some((Action::Wait, "loading screen, input is ignored".to_string()))
                } else {
                    None
                }
            }

            Tier::PrimaryRegionTemplate => {
                let primary = self.primary_region_for(state)?;
                let scaler = ScreenScaler::new(self.settings.reference_resolution, frame_size);
                let region = scaler.scale_region(&primary.region);

                candidates
                    .template
                    .iter()
                    .filter(|c| {
                        c.score.unwrap_or(0.0) >= primary.min_score
                            && region.contains(c.center.0, c.center.1)
                    })
                    .max_by(|a, b| cmp_score(a, b))
                    .map(|c| {
                        (
                            tap_at(c),
                            format!(
                                "template match {:.2} inside the primary control region",
                                c.score.unwrap_or(0.0)
                            ),
                        )
                    })
            }

            Tier::PrivilegedColor => candidates
                .color
                .iter()
                .filter(|c| {
                    c.color_tag
                        .as_ref()
                        .is_some_and(|tag| self.settings.privileged_tags.contains(tag))
                })
                .max_by(|a, b| cmp_area(a, b))
                .map(|c| {
                    (
                        tap_at(c),
                        format!(
                            "{} control, largest in-band blob",
                            c.color_tag.as_deref().unwrap_or("privileged")
                        ),
                    )
                }),

            Tier::BestTemplate => candidates
                .template
                .iter()
                .max_by(|a, b| cmp_score(a, b))
                .map(|c| {
                    (
                        tap_at(c),
                        format!("best template match {:.2}", c.score.unwrap_or(0.0)),
                    )
                }),

            Tier::LargestBlob => candidates
                .color
                .iter()
                .chain(candidates.edge.iter())
                .max_by(|a, b| cmp_area(a, b))
                .map(|c| (tap_at(c), format!("largest blob, area {:.0}", c.area))),

            Tier::Fallback => match self.settings.fallback {
                FallbackPolicy::TapCenter => {
                    let (w, h) = frame_size;
                    Some((
                        Action::Tap {
                            x: (w / 2) as i32,
                            y: (h / 2) as i32,
                        },
                        "no candidates, tapping frame center".to_string(),
                    ))
                }
                FallbackPolicy::Wait => {
                    Some((Action::Wait, "no candidates, holding".to_string()))
                }
            },
        }
    }

    fn primary_region_for(&self, state: ScreenState) -> Option<&PrimaryRegion> {
        self.settings
            .primary_regions
            .iter()
            .find(|r| r.state == state)
    }
}

fn tap_at(candidate: &Candidate) -> Action {
    Action::Tap {
        x: candidate.center.0 as i32,
        y: candidate.center.1 as i32,
    }
}

fn cmp_score(a: &&Candidate, b: &&Candidate) -> std::cmp::Ordering {
    a.score
        .partial_cmp(&b.score)
        .unwrap_or(std::cmp::Ordering::Equal)
}

fn cmp_area(a: &&Candidate, b: &&Candidate) -> std::cmp::Ordering {
    a.area
        .partial_cmp(&b.area)
        .unwrap_or(std::cmp::Ordering::Equal)
}
