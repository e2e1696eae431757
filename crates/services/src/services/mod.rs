pub mod accumulator;
pub mod derived_fields;
pub mod dialog_scope;
pub mod form_schema;
pub mod forms;
pub mod list_fetcher;
pub mod reference_selector;
