//! Domain model of the store setup form: the draft, its validation rules and
//! the subdomain availability state machine.

pub mod domain_status;
pub mod types;
pub mod validation;

pub use domain_status::{DomainCheckOutcome, DomainStatus};
pub use types::{
    Category, Country, Currency, DraftPatch, Field, FieldErrors, NewStore, SelectOption,
    StoreDraft, UnknownOption,
};
pub use validation::{availability_error, validate_domain_format, validate_field};
