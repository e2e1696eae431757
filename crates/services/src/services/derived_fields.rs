//! Computed form fields that follow their source fields.
//!
//! Recomputation is pull-based: after a field changes, the rules that read it
//! are evaluated and a target is written only when its value actually differs.
//! Writing the same value twice would otherwise look like a fresh change and
//! keep re-triggering the rules that depend on it.

use std::collections::BTreeSet;

use serde_json::{Map, Value};
use tracing::warn;

/// Field values of one form, addressed by dotted paths such as `month.days`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormState {
    values: Map<String, Value>,
    writes: u64,
}

impl FormState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-object values yield an empty form.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(values) => Self { values, writes: 0 },
            _ => Self::default(),
        }
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.values.get(segments.next()?)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Numeric reading of a field. Numeric strings count, blanks and anything else do not.
    pub fn number(&self, path: &str) -> Option<f64> {
        let value = match self.get(path)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        value.filter(|n| n.is_finite())
    }

    pub fn text(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    /// Whether the field holds something other than null or a blank string.
    pub fn is_filled(&self, path: &str) -> bool {
        match self.get(path) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(_) => true,
        }
    }

    pub fn set(&mut self, path: &str, value: impl Into<Value>) {
        let value = value.into();
        let mut segments: Vec<&str> = path.split('.').collect();
        let Some(last) = segments.pop() else {
            return;
        };

        let mut current = &mut self.values;
        for segment in segments {
            let entry = current
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            let Some(map) = entry.as_object_mut() else {
                return;
            };
            current = map;
        }
        current.insert(last.to_string(), value);
        self.writes += 1;
    }

    pub fn remove(&mut self, path: &str) -> Option<Value> {
        let (parent, last) = match path.rsplit_once('.') {
            Some((parent, last)) => (Some(parent), last),
            None => (None, path),
        };
        let map = match parent {
            None => &mut self.values,
            Some(parent) => {
                let mut current = &mut self.values;
                for segment in parent.split('.') {
                    current = current.get_mut(segment)?.as_object_mut()?;
                }
                current
            }
        };
        let removed = map.remove(last);
        if removed.is_some() {
            self.writes += 1;
        }
        removed
    }

    /// Number of writes applied since the form was created.
    pub fn writes(&self) -> u64 {
        self.writes
    }

    pub fn as_value(&self) -> Value {
        Value::Object(self.values.clone())
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.values)
    }
}

/// How a rule treats missing or non-numeric sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    /// Count them as 0.
    ZeroIfMissing,
    /// Leave the target untouched.
    SkipIfMissing,
}

/// Takes source values in declaration order. `None` means "do not write".
pub type Compute = fn(&[f64]) -> Option<f64>;

#[derive(Debug, Clone)]
pub struct DerivedFieldRule {
    pub source_fields: Vec<String>,
    pub target_field: String,
    pub coercion: Coercion,
    compute: Compute,
}

impl DerivedFieldRule {
    pub fn new(target_field: &str, source_fields: &[&str], coercion: Coercion, compute: Compute) -> Self {
        Self {
            source_fields: source_fields.iter().map(|s| s.to_string()).collect(),
            target_field: target_field.to_string(),
            coercion,
            compute,
        }
    }

    /// `target = sum(sources)`, missing sources count as 0.
    pub fn sum(target_field: &str, source_fields: &[&str]) -> Self {
        Self::new(target_field, source_fields, Coercion::ZeroIfMissing, |values| {
            Some(values.iter().sum())
        })
    }

    pub fn depends_on(&self, field: &str) -> bool {
        self.source_fields.iter().any(|source| source == field)
    }

    /// Value the target should hold, rounded to 2 decimals, or `None` to skip the write.
    pub fn evaluate(&self, form: &FormState) -> Option<f64> {
        let mut values = Vec::with_capacity(self.source_fields.len());
        for source in &self.source_fields {
            match (form.number(source), self.coercion) {
                (Some(value), _) => values.push(value),
                (None, Coercion::ZeroIfMissing) => values.push(0.0),
                (None, Coercion::SkipIfMissing) => return None,
            }
        }
        (self.compute)(&values)
            .filter(|value| value.is_finite())
            .map(round2)
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Default)]
pub struct DerivedFieldCalculator {
    rules: Vec<DerivedFieldRule>,
}

impl DerivedFieldCalculator {
    pub fn new(rules: Vec<DerivedFieldRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[DerivedFieldRule] {
        &self.rules
    }

    pub fn is_derived(&self, field: &str) -> bool {
        self.rules.iter().any(|rule| rule.target_field == field)
    }

    /// Re-evaluate rules that read `field`. Returns the targets that were written.
    pub fn on_field_change(&self, form: &mut FormState, field: &str) -> Vec<String> {
        self.settle(form, BTreeSet::from([field.to_string()]))
    }

    /// Re-evaluate every rule, e.g. when a form is first loaded.
    pub fn recompute_all(&self, form: &mut FormState) -> Vec<String> {
        let dirty = self
            .rules
            .iter()
            .flat_map(|rule| rule.source_fields.iter().cloned())
            .collect();
        self.settle(form, dirty)
    }

    fn settle(&self, form: &mut FormState, mut dirty: BTreeSet<String>) -> Vec<String> {
        let mut written = Vec::new();
        // Each pass can only be caused by a write from the previous one, so an
        // acyclic rule set settles within `rules.len() + 1` passes.
        for _ in 0..=self.rules.len() {
            if dirty.is_empty() {
                return written;
            }
            let mut next = BTreeSet::new();
            for rule in &self.rules {
                if !dirty.iter().any(|field| rule.depends_on(field)) {
                    continue;
                }
                let Some(value) = rule.evaluate(form) else {
                    continue;
                };
                if form.number(&rule.target_field) == Some(value) {
                    continue;
                }
                form.set(&rule.target_field, value);
                next.insert(rule.target_field.clone());
                written.push(rule.target_field.clone());
            }
            dirty = next;
        }

        if !dirty.is_empty() {
            warn!(
                fields = ?dirty,
                "Derived field rules did not settle, a rule cycle is likely"
            );
        }
        written
    }
}

/// Rules shared by the mill forms.
pub mod rules {
    use super::{Coercion, DerivedFieldRule};

    /// Paddy deal total across the three varieties.
    pub fn paddy_total() -> DerivedFieldRule {
        DerivedFieldRule::sum("total", &["dhanMota", "dhanPatla", "dhanSarna"])
    }

    pub fn gunny_total() -> DerivedFieldRule {
        DerivedFieldRule::sum("totalGunny", &["newGunny", "oldGunny", "plasticGunny"])
    }

    /// Salary for the month prorated by attended plus allowed-leave days.
    pub fn payable_salary() -> DerivedFieldRule {
        DerivedFieldRule::new(
            "payableSalary",
            &["salary", "attendance", "allowedLeave", "month.days"],
            Coercion::SkipIfMissing,
            |v| {
                let (salary, attendance, allowed_leave, days) = (v[0], v[1], v[2], v[3]);
                if days <= 0.0 {
                    return None;
                }
                Some((attendance + allowed_leave) / days * salary)
            },
        )
    }

    pub fn deal_amount() -> DerivedFieldRule {
        DerivedFieldRule::new("amount", &["total", "rate"], Coercion::SkipIfMissing, |v| {
            Some(v[0] * v[1])
        })
    }
}
