//! Quality filter for location-point events
//!
//! Only `pokemon` events are filtered. The quality percentage is
//! `100 * (attack + defense + stamina) / 45`, compared against the
//! species' required threshold. Events flagged `shiny` always pass.
//!
//! The filter is pure: it holds an immutable [`QualityThresholds`] table and
//! blacklist, both fixed at construction.

pub mod thresholds;

pub use thresholds::{DEFAULT_THRESHOLD, QualityThresholds};

use std::collections::HashSet;
use tracing::{debug, info};

use crate::config::DispatchConfig;
use crate::event::{EventKind, WebhookEvent};

/// Field holding the species id
const SPECIES_FIELD: &str = "pokemon_id";

/// Field holding the exceptional/rare flag
const EXCEPTIONAL_FIELD: &str = "shiny";

/// The three bounded sub-attributes, each expected in `[0, 15]`
const ATTRIBUTE_FIELDS: [&str; 3] = [
    "individual_attack",
    "individual_defense",
    "individual_stamina",
];

/// Maximum attribute sum
const MAX_ATTRIBUTE_SUM: f64 = 45.0;

/// Outcome of evaluating one event
#[derive(Debug, Clone, PartialEq)]
pub enum QualityDecision {
    /// Kind is not subject to filtering
    NotApplicable,
    /// Missing, zero, or out-of-range species id
    MissingSpecies,
    /// Flagged exceptional; passes regardless of quality
    Exceptional {
        species: u16,
        quality: Option<f64>,
    },
    /// Species is blacklisted and the event is not exceptional
    Blacklisted { species: u16 },
    /// One of the sub-attributes is missing or not numeric
    MissingAttributes { species: u16 },
    /// Quality met the species' threshold
    Passed {
        species: u16,
        quality: f64,
        required: u8,
    },
    /// Quality below the species' threshold
    BelowThreshold {
        species: u16,
        quality: f64,
        required: u8,
    },
}

impl QualityDecision {
    /// Whether the event may be delivered
    pub fn is_pass(&self) -> bool {
        matches!(
            self,
            QualityDecision::NotApplicable
                | QualityDecision::Exceptional { .. }
                | QualityDecision::Passed { .. }
        )
    }
}

/// Decides whether a location-point event is worth notifying
#[derive(Debug, Clone)]
pub struct QualityFilter {
    thresholds: QualityThresholds,
    blacklist: HashSet<u16>,
}

impl QualityFilter {
    /// Create a filter from a threshold table and blacklist
    pub fn new(thresholds: QualityThresholds, blacklist: impl IntoIterator<Item = u16>) -> Self {
        Self {
            thresholds,
            blacklist: blacklist.into_iter().collect(),
        }
    }

    /// Build the filter described by a dispatch configuration
    pub fn from_config(config: &DispatchConfig) -> Self {
        Self::new(
            QualityThresholds::from_config(&config.filter),
            config.encounter_blacklist.iter().copied(),
        )
    }

    /// Contract entry point: may this event be delivered?
    pub fn passes(&self, event: &WebhookEvent) -> bool {
        self.check(event).is_pass()
    }

    /// Evaluate an event and log the decision
    pub fn check(&self, event: &WebhookEvent) -> QualityDecision {
        let decision = self.evaluate(event);
        log_decision(event, &decision);
        decision
    }

    /// Evaluate an event without logging
    pub fn evaluate(&self, event: &WebhookEvent) -> QualityDecision {
        if *event.kind() != EventKind::Pokemon {
            return QualityDecision::NotApplicable;
        }

        let Some(species) = species_of(event) else {
            return QualityDecision::MissingSpecies;
        };

        let exceptional = event
            .field(EXCEPTIONAL_FIELD)
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let quality = quality_of(event);

        if exceptional {
            return QualityDecision::Exceptional { species, quality };
        }

        if self.blacklist.contains(&species) {
            return QualityDecision::Blacklisted { species };
        }

        let Some(quality) = quality else {
            return QualityDecision::MissingAttributes { species };
        };

        let required = self.thresholds.required(species);
        if quality < f64::from(required) {
            QualityDecision::BelowThreshold {
                species,
                quality,
                required,
            }
        } else {
            QualityDecision::Passed {
                species,
                quality,
                required,
            }
        }
    }

    /// The threshold table in use
    pub fn thresholds(&self) -> &QualityThresholds {
        &self.thresholds
    }
}

fn species_of(event: &WebhookEvent) -> Option<u16> {
    let raw = event.field(SPECIES_FIELD)?.as_u64()?;
    match u16::try_from(raw) {
        Ok(0) | Err(_) => None,
        Ok(species) => Some(species),
    }
}

/// Normalized quality percentage; not clamped for out-of-range inputs
fn quality_of(event: &WebhookEvent) -> Option<f64> {
    let mut sum = 0.0;
    for field in ATTRIBUTE_FIELDS {
        sum += event.field(field)?.as_f64()?;
    }
    Some(100.0 * sum / MAX_ATTRIBUTE_SUM)
}

fn log_decision(event: &WebhookEvent, decision: &QualityDecision) {
    match decision {
        QualityDecision::NotApplicable | QualityDecision::Passed { .. } => {}
        QualityDecision::MissingSpecies => {
            info!("Got {} event with no species id: {:?}", event.kind(), event.fields());
        }
        QualityDecision::Exceptional { species, quality } => {
            debug!("Species {} is exceptional (quality {:?}), passing", species, quality);
        }
        QualityDecision::Blacklisted { species } => {
            debug!("Filtering blacklisted species {}", species);
        }
        QualityDecision::MissingAttributes { species } => {
            info!("Species {} event is missing quality attributes, filtering", species);
        }
        QualityDecision::BelowThreshold {
            species,
            quality,
            required,
        } => {
            info!(
                "Species {} | quality {:.1} (too low) | required {}",
                species, quality, required
            );
        }
    }
}
