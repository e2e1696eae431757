//! Declarative field table: type, requiredness and visibility of every form field.
//!
//! Visibility and validation live in the same [`FieldSpec`], so a field hidden
//! by its sibling values is neither rendered nor validated.

use std::{collections::BTreeMap, fmt};

use chrono::NaiveDate;
use serde_json::Value;

use super::derived_fields::FormState;

#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Text,
    Number { min: Option<f64> },
    /// `YYYY-MM-DD`
    Date,
    Choice(Vec<String>),
}

/// Predicate over sibling field values.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Always,
    Equals { field: String, value: Value },
    OneOf { field: String, values: Vec<Value> },
    Filled(String),
    Not(Box<Condition>),
    All(Vec<Condition>),
}

impl Condition {
    pub fn equals(field: &str, value: impl Into<Value>) -> Self {
        Self::Equals {
            field: field.to_string(),
            value: value.into(),
        }
    }

    pub fn one_of<V: Into<Value>>(field: &str, values: impl IntoIterator<Item = V>) -> Self {
        Self::OneOf {
            field: field.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn holds(&self, form: &FormState) -> bool {
        match self {
            Self::Always => true,
            Self::Equals { field, value } => form.get(field) == Some(value),
            Self::OneOf { field, values } => form.get(field).is_some_and(|v| values.contains(v)),
            Self::Filled(field) => form.is_filled(field),
            Self::Not(inner) => !inner.holds(form),
            Self::All(conditions) => conditions.iter().all(|c| c.holds(form)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
    pub visible_when: Condition,
}

impl FieldSpec {
    fn new(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: false,
            visible_when: Condition::Always,
        }
    }

    pub fn text(name: &str) -> Self {
        Self::new(name, FieldKind::Text)
    }

    pub fn number(name: &str) -> Self {
        Self::new(name, FieldKind::Number { min: None })
    }

    /// Number that may not go below zero (quantities, rates).
    pub fn quantity(name: &str) -> Self {
        Self::new(name, FieldKind::Number { min: Some(0.0) })
    }

    pub fn date(name: &str) -> Self {
        Self::new(name, FieldKind::Date)
    }

    pub fn choice<S: Into<String>>(name: &str, options: impl IntoIterator<Item = S>) -> Self {
        Self::new(
            name,
            FieldKind::Choice(options.into_iter().map(Into::into).collect()),
        )
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn visible_when(mut self, condition: Condition) -> Self {
        self.visible_when = condition;
        self
    }

    fn check(&self, form: &FormState) -> Result<(), String> {
        if !form.is_filled(&self.name) {
            return if self.required {
                Err("is required".to_string())
            } else {
                Ok(())
            };
        }

        match &self.kind {
            FieldKind::Text => match form.get(&self.name) {
                Some(Value::String(_)) => Ok(()),
                _ => Err("must be text".to_string()),
            },
            FieldKind::Number { min } => match form.number(&self.name) {
                None => Err("must be a number".to_string()),
                Some(n) if min.is_some_and(|min| n < min) => {
                    Err(format!("must be at least {}", min.unwrap_or_default()))
                }
                Some(_) => Ok(()),
            },
            FieldKind::Date => form
                .text(&self.name)
                .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
                .map(|_| ())
                .ok_or_else(|| "must be a date (YYYY-MM-DD)".to_string()),
            FieldKind::Choice(options) => match form.text(&self.name) {
                Some(s) if options.iter().any(|o| o == s) => Ok(()),
                _ => Err(format!("must be one of: {}", options.join(", "))),
            },
        }
    }
}

/// Field name to message for every field that failed validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    pub fields: BTreeMap<String, String>,
}

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .fields
            .iter()
            .map(|(field, message)| format!("{field} {message}"))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormSchema {
    fields: Vec<FieldSpec>,
}

impl FormSchema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Fields unknown to the schema are treated as visible.
    pub fn is_visible(&self, name: &str, form: &FormState) -> bool {
        self.field(name)
            .is_none_or(|spec| spec.visible_when.holds(form))
    }

    /// Names of the fields to render, in declaration order.
    pub fn visible_fields(&self, form: &FormState) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|spec| spec.visible_when.holds(form))
            .map(|spec| spec.name.as_str())
            .collect()
    }

    /// Clear values of hidden fields so stale input is not submitted.
    pub fn strip_hidden(&self, form: &mut FormState) -> Vec<String> {
        let hidden: Vec<String> = self
            .fields
            .iter()
            .filter(|spec| !spec.visible_when.holds(form) && form.get(&spec.name).is_some())
            .map(|spec| spec.name.clone())
            .collect();
        for name in &hidden {
            form.remove(name);
        }
        hidden
    }

    pub fn validate(&self, form: &FormState) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        for spec in &self.fields {
            if !spec.visible_when.holds(form) {
                continue;
            }
            if let Err(message) = spec.check(form) {
                errors.fields.insert(spec.name.clone(), message);
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn schema() -> FormSchema {
        FormSchema::new(vec![
            FieldSpec::text("partyName").required(),
            FieldSpec::choice("purchaseType", ["do", "market"]).required(),
            FieldSpec::text("doNumber")
                .required()
                .visible_when(Condition::equals("purchaseType", "do")),
            FieldSpec::quantity("rate"),
            FieldSpec::date("dealDate").required(),
        ])
    }

    #[test]
    fn hidden_required_field_is_not_validated() {
        let form = FormState::from_value(json!({
            "partyName": "Acme Traders",
            "purchaseType": "market",
            "dealDate": "2026-03-01",
        }));
        assert_eq!(
            schema().visible_fields(&form),
            ["partyName", "purchaseType", "rate", "dealDate"]
        );
        assert!(schema().validate(&form).is_ok());
    }

    #[test]
    fn visible_required_field_is_validated() {
        let form = FormState::from_value(json!({
            "partyName": "Acme Traders",
            "purchaseType": "do",
            "doNumber": "  ",
            "dealDate": "2026-03-01",
        }));
        assert!(schema().is_visible("doNumber", &form));
        let errors = schema().validate(&form).unwrap_err();
        assert_eq!(errors.get("doNumber"), Some("is required"));
        assert_eq!(errors.fields.len(), 1);
    }

    #[test]
    fn type_checks_report_per_field_messages() {
        let form = FormState::from_value(json!({
            "partyName": 12,
            "purchaseType": "barter",
            "rate": -4,
            "dealDate": "01/03/2026",
        }));
        let errors = schema().validate(&form).unwrap_err();
        assert_eq!(errors.get("partyName"), Some("must be text"));
        assert_eq!(errors.get("purchaseType"), Some("must be one of: do, market"));
        assert_eq!(errors.get("rate"), Some("must be at least 0"));
        assert_eq!(errors.get("dealDate"), Some("must be a date (YYYY-MM-DD)"));
        assert!(errors.to_string().contains("rate must be at least 0"));
    }

    #[test]
    fn strip_hidden_clears_values_of_hidden_fields() {
        let mut form = FormState::from_value(json!({
            "purchaseType": "market",
            "doNumber": "DO-12",
        }));
        assert_eq!(schema().strip_hidden(&mut form), ["doNumber"]);
        assert!(form.get("doNumber").is_none());
    }

    #[test]
    fn conditions_compose() {
        let form = FormState::from_value(json!({ "purchaseType": "do", "committeeName": "" }));
        assert!(Condition::one_of("purchaseType", ["do", "fci"]).holds(&form));
        assert!(!Condition::Filled("committeeName".into()).holds(&form));
        assert!(
            Condition::All(vec![
                Condition::equals("purchaseType", "do"),
                Condition::Not(Box::new(Condition::Filled("committeeName".into()))),
            ])
            .holds(&form)
        );
    }
}
