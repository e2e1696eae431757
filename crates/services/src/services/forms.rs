//! Form definitions for the mill records: field table plus derived-field rules.

use serde_json::Value;
use tracing::debug;

use super::{
    derived_fields::{DerivedFieldCalculator, FormState, rules},
    form_schema::{Condition, FieldSpec, FormSchema, ValidationErrors},
};

#[derive(Debug, Clone)]
pub struct FormDefinition {
    pub name: &'static str,
    pub schema: FormSchema,
    pub calculator: DerivedFieldCalculator,
}

impl FormDefinition {
    /// Apply one user edit and bring derived fields up to date.
    ///
    /// Derived targets are read-only, edits to them are ignored.
    pub fn edit(&self, form: &mut FormState, field: &str, value: impl Into<Value>) -> Vec<String> {
        if self.calculator.is_derived(field) {
            debug!(form = self.name, field, "Ignoring edit of a derived field");
            return Vec::new();
        }
        form.set(field, value);
        self.calculator.on_field_change(form, field)
    }

    /// Prepare a form for submission: drop hidden values, recompute, validate.
    pub fn submit(&self, mut form: FormState) -> Result<FormState, ValidationErrors> {
        let stripped = self.schema.strip_hidden(&mut form);
        if !stripped.is_empty() {
            debug!(form = self.name, fields = ?stripped, "Cleared hidden fields before submit");
        }
        self.calculator.recompute_all(&mut form);
        self.schema.validate(&form)?;
        Ok(form)
    }
}

/// Look up a form definition by its `name`.
pub fn by_name(name: &str) -> Option<FormDefinition> {
    match name {
        "paddy_purchase_deal" => Some(paddy_purchase_deal()),
        "gunny_movement" => Some(gunny_movement()),
        "staff_salary" => Some(staff_salary()),
        _ => None,
    }
}

pub fn paddy_purchase_deal() -> FormDefinition {
    let is_do = || Condition::equals("purchaseType", "do");
    FormDefinition {
        name: "paddy_purchase_deal",
        schema: FormSchema::new(vec![
            FieldSpec::date("dealDate").required(),
            FieldSpec::text("partyName").required(),
            FieldSpec::text("brokerName"),
            FieldSpec::choice("purchaseType", ["do", "market"]).required(),
            FieldSpec::text("doNumber").required().visible_when(is_do()),
            FieldSpec::text("committeeName").required().visible_when(is_do()),
            FieldSpec::quantity("dhanMota"),
            FieldSpec::quantity("dhanPatla"),
            FieldSpec::quantity("dhanSarna"),
            FieldSpec::quantity("total"),
            FieldSpec::quantity("rate"),
        ]),
        calculator: DerivedFieldCalculator::new(vec![rules::paddy_total()]),
    }
}

pub fn gunny_movement() -> FormDefinition {
    FormDefinition {
        name: "gunny_movement",
        schema: FormSchema::new(vec![
            FieldSpec::date("date").required(),
            FieldSpec::choice("direction", ["inward", "outward"]).required(),
            FieldSpec::text("partyName")
                .required()
                .visible_when(Condition::equals("direction", "inward")),
            FieldSpec::quantity("newGunny"),
            FieldSpec::quantity("oldGunny"),
            FieldSpec::quantity("plasticGunny"),
            FieldSpec::quantity("totalGunny"),
        ]),
        calculator: DerivedFieldCalculator::new(vec![rules::gunny_total()]),
    }
}

pub fn staff_salary() -> FormDefinition {
    FormDefinition {
        name: "staff_salary",
        schema: FormSchema::new(vec![
            FieldSpec::text("staffName").required(),
            FieldSpec::quantity("salary").required(),
            FieldSpec::quantity("attendance").required(),
            FieldSpec::quantity("allowedLeave"),
            FieldSpec::quantity("month.days").required(),
            FieldSpec::quantity("payableSalary"),
        ]),
        calculator: DerivedFieldCalculator::new(vec![rules::payable_salary()]),
    }
}
