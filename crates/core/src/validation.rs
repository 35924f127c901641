use validator::ValidateEmail;

use crate::domain_status::DomainCheckOutcome;
use crate::types::{Category, Country, Currency, Field, FieldErrors, NewStore, StoreDraft};

pub const MIN_NAME_LEN: usize = 3;
pub const MIN_DOMAIN_LEN: usize = 3;

pub const NAME_TOO_SHORT: &str = "Store name must be at least 3 characters long";
pub const DOMAIN_TOO_SHORT: &str = "Domain must be at least 3 characters";
pub const DOMAIN_INVALID_CHARS: &str = "Domain can only contain lowercase letters, numbers, and hyphens (-), but cannot start or end with a hyphen, can't contain whitespace";
pub const DOMAIN_TAKEN: &str = "Domain is already taken";
pub const COUNTRY_NOT_ALLOWED: &str = "Invalid country: Currently only Bangladesh is allowed";
pub const CURRENCY_NOT_ALLOWED: &str = "Invalid currency: Currently only BDT is allowed";
pub const CURRENCY_UNKNOWN: &str = "Invalid currency: expected one of BDT, USD, EUR, INR";
pub const CATEGORY_UNKNOWN: &str =
    "Invalid category: expected one of Fashion, Electronics, Groceries, Home & Garden";
pub const EMAIL_INVALID: &str = "Invalid email address";

pub fn validate_name(name: &str) -> Result<(), &'static str> {
    if name.chars().count() < MIN_NAME_LEN {
        return Err(NAME_TOO_SHORT);
    }
    Ok(())
}

/// Synchronous subdomain rules: length, then character set and hyphen placement.
pub fn validate_domain_format(domain: &str) -> Result<(), &'static str> {
    if domain.chars().count() < MIN_DOMAIN_LEN {
        return Err(DOMAIN_TOO_SHORT);
    }
    let allowed = domain
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !allowed || domain.starts_with('-') || domain.ends_with('-') {
        return Err(DOMAIN_INVALID_CHARS);
    }
    Ok(())
}

/// Asynchronous subdomain rule. An inconclusive check counts as taken.
pub fn availability_error(outcome: DomainCheckOutcome) -> Option<&'static str> {
    match outcome {
        DomainCheckOutcome::Available => None,
        DomainCheckOutcome::Taken | DomainCheckOutcome::Failed => Some(DOMAIN_TAKEN),
    }
}

pub fn validate_country(country: &str) -> Result<Country, &'static str> {
    match country.parse::<Country>() {
        Ok(Country::Bangladesh) => Ok(Country::Bangladesh),
        _ => Err(COUNTRY_NOT_ALLOWED),
    }
}

pub fn validate_category(category: &str) -> Result<Category, &'static str> {
    category.parse::<Category>().map_err(|_| CATEGORY_UNKNOWN)
}

pub fn validate_currency(currency: &str) -> Result<Currency, &'static str> {
    match currency.parse::<Currency>() {
        Ok(Currency::Bdt) => Ok(Currency::Bdt),
        Ok(_) => Err(CURRENCY_NOT_ALLOWED),
        Err(_) => Err(CURRENCY_UNKNOWN),
    }
}

pub fn validate_email(email: &str) -> Result<(), &'static str> {
    if email.validate_email() {
        Ok(())
    } else {
        Err(EMAIL_INVALID)
    }
}

/// Runs the synchronous rule for one field against the draft.
pub fn validate_field(draft: &StoreDraft, field: Field) -> Result<(), &'static str> {
    match field {
        Field::Name => validate_name(&draft.name),
        Field::Domain => validate_domain_format(&draft.domain),
        Field::Country => validate_country(&draft.country).map(drop),
        Field::Category => validate_category(&draft.category).map(drop),
        Field::Currency => validate_currency(&draft.currency).map(drop),
        Field::Email => validate_email(&draft.email),
    }
}

impl StoreDraft {
    /// Checks every synchronous rule and returns the typed store on success.
    ///
    /// Domain availability is not part of this check; callers combine the
    /// result with [`availability_error`] once the remote answer is known.
    pub fn validate(&self) -> Result<NewStore, FieldErrors> {
        let checks = (
            validate_name(&self.name),
            validate_domain_format(&self.domain),
            validate_country(&self.country),
            validate_category(&self.category),
            validate_currency(&self.currency),
            validate_email(&self.email),
        );

        match checks {
            (Ok(()), Ok(()), Ok(country), Ok(category), Ok(currency), Ok(())) => Ok(NewStore {
                name: self.name.clone(),
                domain: self.domain.clone(),
                country,
                category,
                currency,
                email: self.email.clone(),
            }),
            (name, domain, country, category, currency, email) => {
                let mut errors = FieldErrors::new();
                errors.set(Field::Name, name);
                errors.set(Field::Domain, domain);
                errors.set(Field::Country, country.map(drop));
                errors.set(Field::Category, category.map(drop));
                errors.set(Field::Currency, currency.map(drop));
                errors.set(Field::Email, email);
                Err(errors)
            }
        }
    }
}
