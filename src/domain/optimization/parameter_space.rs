//! Tunable parameter declarations and the assignments drawn from them.
//!
//! Every assignment handed out by `ParameterSpace` satisfies the bounds and
//! domain of its specs: sampling, perturbation and decoding all end with a
//! clamp, so no candidate ever carries an out-of-range value.

use crate::domain::errors::ConfigurationError;
use crate::domain::optimization::candidate::Candidate;
use crate::domain::optimization::constraints::ParameterConstraint;
use rand::Rng;
use rand_distr::StandardNormal;
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Attempts made by `generate_random` to find an assignment satisfying the
/// cross-parameter constraints before returning the last draw.
const MAX_FEASIBLE_ATTEMPTS: usize = 100;

/// Probability that `neighbor` perturbs a second key.
const SECOND_KEY_PROBABILITY: f64 = 0.2;

/// Identifies a parameter: the strategy component that owns it plus its name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ParamKey {
    pub owner_id: String,
    pub name: String,
}

impl ParamKey {
    pub fn new(owner_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner_id, self.name)
    }
}

impl From<ParamKey> for String {
    fn from(key: ParamKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for ParamKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.rsplit_once('/') {
            Some((owner, name)) if !name.is_empty() => Ok(ParamKey::new(owner, name)),
            _ => Err(format!("Invalid parameter key '{}': expected owner/name", value)),
        }
    }
}

/// Concrete value held by one parameter of an assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Choice(String),
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Number(v) => Some(*v),
            ParamValue::Choice(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Number(_) => None,
            ParamValue::Choice(s) => Some(s),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Number(v) => write!(f, "{}", v),
            ParamValue::Choice(s) => f.write_str(s),
        }
    }
}

/// Mapping from parameter key to concrete value, ordered by key
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterAssignment {
    values: BTreeMap<ParamKey, ParamValue>,
}

impl ParameterAssignment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &ParamKey) -> Option<&ParamValue> {
        self.values.get(key)
    }

    pub fn number(&self, key: &ParamKey) -> Option<f64> {
        self.values.get(key).and_then(ParamValue::as_f64)
    }

    /// Numeric value looked up by owner and name
    pub fn number_of(&self, owner_id: &str, name: &str) -> Option<f64> {
        self.number(&ParamKey::new(owner_id, name))
    }

    pub fn set(&mut self, key: ParamKey, value: ParamValue) {
        self.values.insert(key, value);
    }

    pub fn with(mut self, key: ParamKey, value: ParamValue) -> Self {
        self.set(key, value);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ParamKey, &ParamValue)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Display for ParameterAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .values
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    Continuous,
    Discrete,
    Categorical,
}

/// Declared bounds and domain of one tunable parameter.
///
/// Categorical parameters are encoded numerically as the index of their
/// value in `allowed_values`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub owner_id: String,
    pub name: String,
    pub kind: ParameterKind,
    #[serde(default)]
    pub min: f64,
    #[serde(default)]
    pub max: f64,
    #[serde(default)]
    pub step: Option<f64>,
    #[serde(default)]
    pub allowed_values: Option<Vec<String>>,
}

impl ParameterSpec {
    pub fn continuous(owner_id: &str, name: &str, min: f64, max: f64) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            name: name.to_string(),
            kind: ParameterKind::Continuous,
            min,
            max,
            step: None,
            allowed_values: None,
        }
    }

    pub fn discrete(owner_id: &str, name: &str, min: f64, max: f64, step: f64) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            name: name.to_string(),
            kind: ParameterKind::Discrete,
            min,
            max,
            step: Some(step),
            allowed_values: None,
        }
    }

    pub fn categorical(owner_id: &str, name: &str, values: &[&str]) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            name: name.to_string(),
            kind: ParameterKind::Categorical,
            min: 0.0,
            max: values.len().saturating_sub(1) as f64,
            step: None,
            allowed_values: Some(values.iter().map(|v| v.to_string()).collect()),
        }
    }

    pub fn key(&self) -> ParamKey {
        ParamKey::new(self.owner_id.clone(), self.name.clone())
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let invalid = |reason: String| ConfigurationError::InvalidParameter {
            key: self.key().to_string(),
            reason,
        };

        if self.name.is_empty() {
            return Err(invalid("parameter name is empty".to_string()));
        }

        match self.kind {
            ParameterKind::Categorical => match &self.allowed_values {
                Some(values) if !values.is_empty() => Ok(()),
                _ => Err(invalid(
                    "categorical parameter needs at least one allowed value".to_string(),
                )),
            },
            ParameterKind::Continuous | ParameterKind::Discrete => {
                if !self.min.is_finite() || !self.max.is_finite() {
                    return Err(invalid("bounds must be finite".to_string()));
                }
                if self.min > self.max {
                    return Err(invalid(format!("min {} > max {}", self.min, self.max)));
                }
                if self.kind == ParameterKind::Discrete {
                    match self.step {
                        Some(step) if step.is_finite() && step > 0.0 => {}
                        _ => return Err(invalid("discrete parameter needs step > 0".to_string())),
                    }
                }
                Ok(())
            }
        }
    }

    fn choices(&self) -> &[String] {
        self.allowed_values.as_deref().unwrap_or(&[])
    }

    fn step(&self) -> f64 {
        self.step.unwrap_or(1.0)
    }

    /// Bounds of the numeric encoding of this parameter
    pub fn bounds(&self) -> (f64, f64) {
        match self.kind {
            ParameterKind::Categorical => (0.0, self.choices().len().saturating_sub(1) as f64),
            _ => (self.min, self.max),
        }
    }

    pub fn range(&self) -> f64 {
        let (lo, hi) = self.bounds();
        hi - lo
    }

    /// Number of distinct values; `None` for continuous ranges wider than a point
    pub fn cardinality(&self) -> Option<usize> {
        match self.kind {
            ParameterKind::Continuous if self.min == self.max => Some(1),
            ParameterKind::Continuous => None,
            ParameterKind::Discrete => Some(self.lattice_size()),
            ParameterKind::Categorical => Some(self.choices().len()),
        }
    }

    /// True when the parameter can take more than one value
    pub fn is_optimizable(&self) -> bool {
        self.cardinality().is_none_or(|n| n > 1)
    }

    /// Saturates at `usize::MAX` for lattices too wide to index
    fn lattice_size(&self) -> usize {
        (((self.max - self.min) / self.step() + 1e-9).floor() as usize).saturating_add(1)
    }

    fn lattice_point(&self, k: usize) -> f64 {
        let step = self.step();
        let exact = Decimal::from_f64(self.min)
            .zip(Decimal::from_f64(step))
            .zip(Decimal::from_usize(k))
            .and_then(|((min, step), k)| step.checked_mul(k).and_then(|o| min.checked_add(o)))
            .and_then(|v| v.to_f64());
        exact.unwrap_or(self.min + step * k as f64).min(self.max)
    }

    fn snap_to_step(&self, value: f64) -> f64 {
        let clamped = value.clamp(self.min, self.max);
        let k = ((clamped - self.min) / self.step()).round().max(0.0) as usize;
        self.lattice_point(k.min(self.lattice_size() - 1))
    }

    fn index_of(&self, value: &ParamValue) -> Option<usize> {
        match value {
            ParamValue::Choice(s) => self.choices().iter().position(|c| c == s),
            ParamValue::Number(v) if v.is_finite() => {
                let last = self.choices().len().saturating_sub(1) as f64;
                Some(v.round().clamp(0.0, last) as usize)
            }
            ParamValue::Number(_) => None,
        }
    }

    fn choice(&self, index: usize) -> ParamValue {
        let choices = self.choices();
        let index = index.min(choices.len().saturating_sub(1));
        ParamValue::Choice(choices.get(index).cloned().unwrap_or_default())
    }

    /// Value used when an assignment lacks this key
    pub fn default_value(&self) -> ParamValue {
        self.decode((self.bounds().0 + self.bounds().1) / 2.0)
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> ParamValue {
        match self.kind {
            ParameterKind::Continuous => {
                ParamValue::Number(self.min + (self.max - self.min) * rng.random::<f64>())
            }
            ParameterKind::Discrete => {
                ParamValue::Number(self.lattice_point(rng.random_range(0..self.lattice_size())))
            }
            ParameterKind::Categorical => self.choice(rng.random_range(0..self.choices().len())),
        }
    }

    /// Bring a value back into this parameter's domain; valid values pass through
    pub fn clamp_value(&self, value: &ParamValue) -> ParamValue {
        match self.kind {
            ParameterKind::Categorical => match self.index_of(value) {
                Some(index) => self.choice(index),
                None => self.choice(0),
            },
            _ => {
                let numeric = match value {
                    ParamValue::Number(v) => Some(*v),
                    ParamValue::Choice(s) => s.parse::<f64>().ok(),
                };
                match numeric.filter(|v| v.is_finite()) {
                    Some(v) => self.decode(v),
                    None => ParamValue::Number(self.min),
                }
            }
        }
    }

    pub fn encode(&self, value: &ParamValue) -> f64 {
        match self.kind {
            ParameterKind::Categorical => self.index_of(value).unwrap_or(0) as f64,
            _ => value.as_f64().filter(|v| v.is_finite()).unwrap_or(self.min),
        }
    }

    /// Map an encoded coordinate to the nearest valid value
    pub fn decode(&self, x: f64) -> ParamValue {
        let x = if x.is_finite() { x } else { self.bounds().0 };
        match self.kind {
            ParameterKind::Continuous => ParamValue::Number(x.clamp(self.min, self.max)),
            ParameterKind::Discrete => ParamValue::Number(self.snap_to_step(x)),
            ParameterKind::Categorical => self.choice(x.round().max(0.0) as usize),
        }
    }

    /// Gaussian move of `scale * range`, clamped back into the domain.
    /// Discrete values always move at least one step; categoricals switch value.
    pub fn perturb<R: Rng + ?Sized>(&self, value: &ParamValue, rng: &mut R, scale: f64) -> ParamValue {
        match self.kind {
            ParameterKind::Categorical => {
                let n = self.choices().len();
                if n < 2 {
                    return self.clamp_value(value);
                }
                let current = self.index_of(value).unwrap_or(0);
                let offset = rng.random_range(1..n);
                self.choice((current + offset) % n)
            }
            ParameterKind::Continuous => {
                let current = self.encode(value);
                let z: f64 = rng.sample(StandardNormal);
                self.decode(current + z * scale * self.range())
            }
            ParameterKind::Discrete => {
                let current = self.snap_to_step(self.encode(value));
                let z: f64 = rng.sample(StandardNormal);
                let moved = self.snap_to_step(current + z * scale * self.range());
                if moved != current || self.lattice_size() < 2 {
                    return ParamValue::Number(moved);
                }
                let direction = if z >= 0.0 { 1.0 } else { -1.0 };
                let mut stepped = self.snap_to_step(current + direction * self.step());
                if stepped == current {
                    stepped = self.snap_to_step(current - direction * self.step());
                }
                ParamValue::Number(stepped)
            }
        }
    }

    /// Number of points on this parameter's grid axis
    pub fn grid_len(&self, default_subdivisions: usize) -> usize {
        match self.kind {
            ParameterKind::Categorical => self.choices().len(),
            ParameterKind::Discrete => self.lattice_size(),
            ParameterKind::Continuous if self.min == self.max => 1,
            ParameterKind::Continuous => default_subdivisions.max(2),
        }
    }

    /// Point `index` of the grid axis, computed on demand
    pub fn grid_value(&self, index: usize, default_subdivisions: usize) -> ParamValue {
        match self.kind {
            ParameterKind::Categorical => self.choice(index),
            ParameterKind::Discrete => ParamValue::Number(self.lattice_point(index)),
            ParameterKind::Continuous => {
                let n = self.grid_len(default_subdivisions);
                if n < 2 {
                    return ParamValue::Number(self.min);
                }
                let t = index.min(n - 1) as f64 / (n - 1) as f64;
                ParamValue::Number((self.min + t * (self.max - self.min)).min(self.max))
            }
        }
    }
}

/// The set of tunable parameters of a strategy plus cross-parameter constraints.
///
/// Deserialization goes through `ParameterSpace::new` and `with_constraint`,
/// so a space read from JSON or TOML is validated like a constructed one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "RawParameterSpace")]
pub struct ParameterSpace {
    specs: Vec<ParameterSpec>,
    #[serde(default)]
    constraints: Vec<ParameterConstraint>,
}

/// Unvalidated wire form of `ParameterSpace`
#[derive(Deserialize)]
struct RawParameterSpace {
    specs: Vec<ParameterSpec>,
    #[serde(default)]
    constraints: Vec<ParameterConstraint>,
}

impl TryFrom<RawParameterSpace> for ParameterSpace {
    type Error = ConfigurationError;

    fn try_from(raw: RawParameterSpace) -> Result<Self, Self::Error> {
        raw.constraints
            .into_iter()
            .try_fold(ParameterSpace::new(raw.specs)?, ParameterSpace::with_constraint)
    }
}

impl ParameterSpace {
    /// Validates every spec; specs are kept sorted by key.
    pub fn new(mut specs: Vec<ParameterSpec>) -> Result<Self, ConfigurationError> {
        specs.sort_by_key(|s| s.key());
        let space = Self {
            specs,
            constraints: Vec::new(),
        };
        space.validate()?;
        Ok(space)
    }

    /// Re-check every spec, key uniqueness and every constraint
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        for spec in &self.specs {
            spec.validate()?;
        }
        let mut keys: Vec<ParamKey> = self.specs.iter().map(ParameterSpec::key).collect();
        keys.sort();
        if let Some(pair) = keys.windows(2).find(|w| w[0] == w[1]) {
            return Err(ConfigurationError::InvalidParameter {
                key: pair[0].to_string(),
                reason: "declared more than once".to_string(),
            });
        }
        for constraint in &self.constraints {
            constraint.validate(&self.specs)?;
        }
        Ok(())
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_constraint(mut self, constraint: ParameterConstraint) -> Result<Self, ConfigurationError> {
        constraint.validate(&self.specs)?;
        self.constraints.push(constraint);
        Ok(self)
    }

    pub fn specs(&self) -> &[ParameterSpec] {
        &self.specs
    }

    pub fn constraints(&self) -> &[ParameterConstraint] {
        &self.constraints
    }

    pub fn spec(&self, key: &ParamKey) -> Option<&ParameterSpec> {
        self.specs.iter().find(|s| &s.key() == key)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Fails with `NoOptimizableParameters` unless some parameter can vary
    pub fn ensure_optimizable(&self) -> Result<(), ConfigurationError> {
        if self.specs.iter().any(ParameterSpec::is_optimizable) {
            Ok(())
        } else {
            Err(ConfigurationError::NoOptimizableParameters)
        }
    }

    pub fn bounds(&self) -> Vec<(f64, f64)> {
        self.specs.iter().map(ParameterSpec::bounds).collect()
    }

    pub fn ranges(&self) -> Vec<f64> {
        self.specs.iter().map(ParameterSpec::range).collect()
    }

    pub fn is_feasible(&self, assignment: &ParameterAssignment) -> bool {
        self.constraints.iter().all(|c| c.is_satisfied(assignment))
    }

    /// True when the assignment holds exactly this space's keys, all in domain
    pub fn contains(&self, assignment: &ParameterAssignment) -> bool {
        assignment.len() == self.specs.len()
            && self.specs.iter().all(|spec| {
                assignment
                    .get(&spec.key())
                    .is_some_and(|v| &spec.clamp_value(v) == v)
            })
    }

    pub fn random_assignment<R: Rng + ?Sized>(&self, rng: &mut R) -> ParameterAssignment {
        let mut assignment = self.draw(rng);
        for _ in 1..MAX_FEASIBLE_ATTEMPTS {
            if self.is_feasible(&assignment) {
                break;
            }
            assignment = self.draw(rng);
        }
        assignment
    }

    fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> ParameterAssignment {
        let mut assignment = ParameterAssignment::new();
        for spec in &self.specs {
            assignment.set(spec.key(), spec.sample(rng));
        }
        assignment
    }

    /// Uniform sample within declared bounds, as an unevaluated candidate
    pub fn generate_random<R: Rng + ?Sized>(&self, rng: &mut R) -> Candidate {
        Candidate::new(self.random_assignment(rng))
    }

    /// Total and idempotent. Missing keys get the spec default, unknown keys are dropped.
    pub fn clamp(&self, assignment: &ParameterAssignment) -> ParameterAssignment {
        let mut clamped = ParameterAssignment::new();
        for spec in &self.specs {
            let key = spec.key();
            let value = match assignment.get(&key) {
                Some(v) => spec.clamp_value(v),
                None => spec.default_value(),
            };
            clamped.set(key, value);
        }
        clamped
    }

    /// Perturb one key (occasionally two) by an amount proportional to `scale`
    pub fn neighbor<R: Rng + ?Sized>(
        &self,
        assignment: &ParameterAssignment,
        rng: &mut R,
        scale: f64,
    ) -> ParameterAssignment {
        let mut next = self.clamp(assignment);
        let n = self.specs.len();
        if n == 0 {
            return next;
        }
        let scale = if scale.is_finite() { scale.clamp(1e-6, 1.0) } else { 0.1 };

        let first = rng.random_range(0..n);
        let mut picks = vec![first];
        if n > 1 && rng.random_bool(SECOND_KEY_PROBABILITY) {
            picks.push((first + 1 + rng.random_range(0..n - 1)) % n);
        }

        for index in picks {
            let spec = &self.specs[index];
            let key = spec.key();
            let current = next.get(&key).cloned().unwrap_or_else(|| spec.default_value());
            next.set(key, spec.perturb(&current, rng, scale));
        }
        next
    }

    pub fn encode(&self, assignment: &ParameterAssignment) -> Vec<f64> {
        self.specs
            .iter()
            .map(|spec| match assignment.get(&spec.key()) {
                Some(v) => spec.encode(v),
                None => spec.encode(&spec.default_value()),
            })
            .collect()
    }

    /// Inverse of `encode`; coordinates are clamped and snapped to the domain
    pub fn decode(&self, coordinates: &[f64]) -> ParameterAssignment {
        let mut assignment = ParameterAssignment::new();
        for (i, spec) in self.specs.iter().enumerate() {
            let value = match coordinates.get(i) {
                Some(x) => spec.decode(*x),
                None => spec.default_value(),
            };
            assignment.set(spec.key(), value);
        }
        assignment
    }

}
