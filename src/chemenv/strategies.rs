// src/chemenv/strategies.rs
//
// Strategies turn the raw candidate neighbours of a site into a decided
// coordination environment.

use super::finder::{SiteEnvironments, StructureEnvironments};
use super::geometries::UNKNOWN_SYMBOL;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const PRESET_NAMES: &[&str] = &["stats_article", "default"];

/// One candidate environment for a site
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvironmentGuess {
    pub symbol: String,
    /// Share of the total weight (multi-weight strategies only)
    pub fraction: Option<f64>,
    pub csm: Option<f64>,
}

impl EnvironmentGuess {
    pub fn unknown() -> Self {
        Self {
            symbol: UNKNOWN_SYMBOL.to_string(),
            fraction: None,
            csm: None,
        }
    }
}

/// Decision for a single site
#[derive(Debug, Clone, PartialEq)]
pub struct SiteOutcome {
    /// Ranked, never empty
    pub environments: Vec<EnvironmentGuess>,
    /// Candidate indices forming the chosen neighbour set
    pub members: Vec<usize>,
    pub note: Option<String>,
}

impl SiteOutcome {
    fn unknown(note: String) -> Self {
        Self {
            environments: vec![EnvironmentGuess::unknown()],
            members: Vec::new(),
            note: Some(note),
        }
    }
}

pub trait ChemenvStrategy {
    fn name(&self) -> String;

    fn site_outcome(&self, se: &StructureEnvironments, site: &SiteEnvironments) -> SiteOutcome;
}

// --- Simple cutoff strategy ---

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimpleStrategy {
    pub distance_cutoff: f64,
    pub angle_cutoff: f64,
}

impl ChemenvStrategy for SimpleStrategy {
    fn name(&self) -> String {
        format!("simple({}, {})", self.distance_cutoff, self.angle_cutoff)
    }

    fn site_outcome(&self, se: &StructureEnvironments, site: &SiteEnvironments) -> SiteOutcome {
        let members: Vec<usize> = site
            .candidates
            .iter()
            .enumerate()
            .filter(|(_, n)| {
                n.normalized_distance <= self.distance_cutoff + 1e-9
                    && n.normalized_angle >= self.angle_cutoff - 1e-12
            })
            .map(|(k, _)| k)
            .collect();

        if members.is_empty() {
            return SiteOutcome::unknown("no neighbours within cutoffs".to_string());
        }

        let measures = se.shape_measures(site, &members);
        match measures.first() {
            Some(best) => SiteOutcome {
                environments: vec![EnvironmentGuess {
                    symbol: best.symbol.to_string(),
                    fraction: None,
                    csm: Some(best.csm),
                }],
                members,
                note: None,
            },
            None => SiteOutcome::unknown(format!(
                "no reference geometry with coordination number {}",
                members.len()
            )),
        }
    }
}

// --- Multi-weight strategy ---

/// Smooth 0→1 ramp between two bounds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightRamp {
    pub lower: f64,
    pub upper: f64,
}

impl WeightRamp {
    pub const fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    /// 0 at or below `lower`, 1 at or above `upper`
    pub fn rising(&self, x: f64) -> f64 {
        if x <= self.lower {
            return 0.0;
        }
        if x >= self.upper {
            return 1.0;
        }
        let t = (x - self.lower) / (self.upper - self.lower);
        t * t * (3.0 - 2.0 * t)
    }

    pub fn falling(&self, x: f64) -> f64 {
        1.0 - self.rising(x)
    }

    fn validate(&self, name: &'static str) -> Result<(), ConfigError> {
        if !self.lower.is_finite() || !self.upper.is_finite() || self.lower >= self.upper {
            return Err(ConfigError::WeightBounds {
                name,
                lower: self.lower,
                upper: self.upper,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiWeightParams {
    /// Falls with the largest normalized distance of the set
    pub distance: WeightRamp,
    /// Rises with the smallest normalized angle of the set
    pub angle: WeightRamp,
    /// Falls with the set's own shape measure
    pub self_csm: WeightRamp,
    /// Falls when the set measures worse than a smaller set did
    pub delta_csm: WeightRamp,
}

impl MultiWeightParams {
    pub fn preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "stats_article" => Ok(Self {
                distance: WeightRamp::new(1.1, 1.45),
                angle: WeightRamp::new(0.1, 0.4),
                self_csm: WeightRamp::new(1.0, 8.0),
                delta_csm: WeightRamp::new(0.5, 4.0),
            }),
            "default" => Ok(Self {
                distance: WeightRamp::new(1.2, 1.6),
                angle: WeightRamp::new(0.05, 0.3),
                self_csm: WeightRamp::new(2.0, 10.0),
                delta_csm: WeightRamp::new(1.0, 5.0),
            }),
            other => Err(ConfigError::UnknownPreset(
                other.to_string(),
                PRESET_NAMES.join(", "),
            )),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.distance.validate("distance")?;
        self.angle.validate("angle")?;
        self.self_csm.validate("self_csm")?;
        self.delta_csm.validate("delta_csm")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightSource {
    Preset(String),
    Explicit(MultiWeightParams),
}

#[derive(Debug, Clone)]
pub struct MultiWeightsStrategy {
    label: String,
    params: MultiWeightParams,
}

impl MultiWeightsStrategy {
    pub fn new(label: impl Into<String>, params: MultiWeightParams) -> Self {
        Self {
            label: label.into(),
            params,
        }
    }
}

struct WeightedSet {
    size: usize,
    symbol: &'static str,
    csm: f64,
    weight: f64,
}

impl ChemenvStrategy for MultiWeightsStrategy {
    fn name(&self) -> String {
        format!("multiweighted({})", self.label)
    }

    fn site_outcome(&self, se: &StructureEnvironments, site: &SiteEnvironments) -> SiteOutcome {
        let mut sets: Vec<WeightedSet> = Vec::new();
        let mut best_smaller_csm: Option<f64> = None;

        for size in site.distance_shells() {
            let members: Vec<usize> = (0..size).collect();
            let measures = se.shape_measures(site, &members);
            let Some(best) = measures.first() else {
                continue;
            };

            let max_nd = site.candidates[size - 1].normalized_distance;
            let min_na = site.candidates[..size]
                .iter()
                .map(|n| n.normalized_angle)
                .fold(f64::INFINITY, f64::min);

            let w_delta = best_smaller_csm
                .map_or(1.0, |prev| self.params.delta_csm.falling(best.csm - prev));
            let weight = self.params.distance.falling(max_nd)
                * self.params.angle.rising(min_na)
                * self.params.self_csm.falling(best.csm)
                * w_delta;

            best_smaller_csm = Some(best_smaller_csm.map_or(best.csm, |p| p.min(best.csm)));
            sets.push(WeightedSet {
                size,
                symbol: best.symbol,
                csm: best.csm,
                weight,
            });
        }

        if sets.is_empty() {
            return SiteOutcome::unknown(if site.candidates.is_empty() {
                "no neighbours found".to_string()
            } else {
                "no neighbour set matches a reference geometry".to_string()
            });
        }

        let total: f64 = sets.iter().map(|s| s.weight).sum();
        if total <= 1e-12 {
            let mut fallback = &sets[0];
            for s in &sets[1..] {
                if s.csm < fallback.csm {
                    fallback = s;
                }
            }
            return SiteOutcome {
                environments: vec![EnvironmentGuess {
                    symbol: fallback.symbol.to_string(),
                    fraction: None,
                    csm: Some(fallback.csm),
                }],
                members: (0..fallback.size).collect(),
                note: Some("all neighbour-set weights vanished; using lowest-CSM set".to_string()),
            };
        }

        // Accumulate fractions per symbol, remembering the heaviest set of each
        let mut ranked: Vec<(EnvironmentGuess, usize, f64)> = Vec::new();
        for s in &sets {
            let fraction = s.weight / total;
            match ranked.iter_mut().find(|(g, _, _)| g.symbol == s.symbol) {
                Some((guess, size, heaviest)) => {
                    guess.fraction = guess.fraction.map(|f| f + fraction);
                    guess.csm = guess.csm.map(|c| c.min(s.csm));
                    if s.weight > *heaviest {
                        *size = s.size;
                        *heaviest = s.weight;
                    }
                }
                None => ranked.push((
                    EnvironmentGuess {
                        symbol: s.symbol.to_string(),
                        fraction: Some(fraction),
                        csm: Some(s.csm),
                    },
                    s.size,
                    s.weight,
                )),
            }
        }
        ranked.retain(|(g, _, _)| g.fraction.unwrap_or(0.0) > 0.0);
        ranked.sort_by(|a, b| {
            let fa = a.0.fraction.unwrap_or(0.0);
            let fb = b.0.fraction.unwrap_or(0.0);
            fb.total_cmp(&fa).then_with(|| a.0.symbol.cmp(&b.0.symbol))
        });

        let members = (0..ranked[0].1).collect();
        SiteOutcome {
            environments: ranked.into_iter().map(|(g, _, _)| g).collect(),
            members,
            note: None,
        }
    }
}

// --- Strategy selection ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum StrategySpec {
    Simple { distance_cutoff: f64, angle_cutoff: f64 },
    MultiWeighted { weights: WeightSource },
}

impl Default for StrategySpec {
    fn default() -> Self {
        StrategySpec::Simple {
            distance_cutoff: 1.4,
            angle_cutoff: 0.3,
        }
    }
}

impl StrategySpec {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.build().map(|_| ())
    }

    pub fn build(&self) -> Result<Box<dyn ChemenvStrategy>, ConfigError> {
        match self {
            StrategySpec::Simple {
                distance_cutoff,
                angle_cutoff,
            } => {
                if !distance_cutoff.is_finite() || *distance_cutoff < 1.0 {
                    return Err(ConfigError::DistanceCutoff(*distance_cutoff));
                }
                if !(0.0..=1.0).contains(angle_cutoff) {
                    return Err(ConfigError::AngleCutoff(*angle_cutoff));
                }
                Ok(Box::new(SimpleStrategy {
                    distance_cutoff: *distance_cutoff,
                    angle_cutoff: *angle_cutoff,
                }))
            }
            StrategySpec::MultiWeighted { weights } => {
                let (label, params) = match weights {
                    WeightSource::Preset(name) => (name.clone(), MultiWeightParams::preset(name)?),
                    WeightSource::Explicit(p) => ("explicit".to_string(), p.clone()),
                };
                params.validate()?;
                Ok(Box::new(MultiWeightsStrategy::new(label, params)))
            }
        }
    }
}

impl fmt::Display for StrategySpec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StrategySpec::Simple {
                distance_cutoff,
                angle_cutoff,
            } => write!(f, "simple:{},{}", distance_cutoff, angle_cutoff),
            StrategySpec::MultiWeighted {
                weights: WeightSource::Preset(name),
            } => write!(f, "multiweighted:{}", name),
            StrategySpec::MultiWeighted { .. } => write!(f, "multiweighted:explicit"),
        }
    }
}

/// Parses `simple:<d>,<a>` or `multiweighted:<preset>`
impl FromStr for StrategySpec {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let syntax = || ConfigError::StrategySyntax(s.to_string());
        let (kind, args) = match s.split_once(':') {
            Some((k, a)) => (k.trim().to_lowercase(), Some(a.trim())),
            None => (s.trim().to_lowercase(), None),
        };

        match kind.as_str() {
            "simple" => match args {
                None => Ok(StrategySpec::default()),
                Some(args) => {
                    let parts: Vec<&str> = args.split(',').map(str::trim).collect();
                    if parts.len() != 2 {
                        return Err(syntax());
                    }
                    let distance_cutoff = parts[0].parse().map_err(|_| syntax())?;
                    let angle_cutoff = parts[1].parse().map_err(|_| syntax())?;
                    Ok(StrategySpec::Simple {
                        distance_cutoff,
                        angle_cutoff,
                    })
                }
            },
            "multiweighted" | "multi-weighted" | "multi_weighted" => {
                let preset = args.filter(|a| !a.is_empty()).unwrap_or("default");
                Ok(StrategySpec::MultiWeighted {
                    weights: WeightSource::Preset(preset.to_string()),
                })
            }
            _ => Err(syntax()),
        }
    }
}
