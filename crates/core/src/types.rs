use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw form input for a store that has not been created yet.
///
/// Every field holds exactly what the merchant typed or selected. Nothing is
/// guaranteed about the contents until [`StoreDraft::validate`] succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default = "default_country")]
    pub country: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub email: String,
}

impl Default for StoreDraft {
    fn default() -> Self {
        Self {
            name: String::new(),
            domain: String::new(),
            country: default_country(),
            category: default_category(),
            currency: default_currency(),
            email: String::new(),
        }
    }
}

impl StoreDraft {
    /// Applies a partial update and returns the fields that actually changed.
    pub fn apply(&mut self, patch: DraftPatch) -> Vec<Field> {
        let mut changed = Vec::new();
        let slots = [
            (Field::Name, patch.name, &mut self.name),
            (Field::Domain, patch.domain, &mut self.domain),
            (Field::Country, patch.country, &mut self.country),
            (Field::Category, patch.category, &mut self.category),
            (Field::Currency, patch.currency, &mut self.currency),
            (Field::Email, patch.email, &mut self.email),
        ];
        for (field, update, slot) in slots {
            if let Some(value) = update {
                if *slot != value {
                    *slot = value;
                    changed.push(field);
                }
            }
        }
        changed
    }
}

fn default_country() -> String {
    Country::Bangladesh.as_str().to_string()
}

fn default_category() -> String {
    Category::Fashion.as_str().to_string()
}

fn default_currency() -> String {
    Currency::Bdt.as_str().to_string()
}

/// Partial draft update produced by a single edit in the form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// A draft that passed every synchronous rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStore {
    pub name: String,
    pub domain: String,
    pub country: Country,
    pub category: Category,
    pub currency: Currency,
    pub email: String,
}

/// Form fields, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Name,
    Domain,
    Country,
    Category,
    Currency,
    Email,
}

impl Field {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Domain => "domain",
            Self::Country => "country",
            Self::Category => "category",
            Self::Currency => "currency",
            Self::Email => "email",
        }
    }
}

/// Per-field validation messages. Each field carries at most one message:
/// the first rule it failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<Field, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: Field, message: impl Into<String>) {
        self.0.insert(field, message.into());
    }

    pub fn remove(&mut self, field: Field) -> Option<String> {
        self.0.remove(&field)
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    pub fn contains(&self, field: Field) -> bool {
        self.0.contains_key(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        self.0.iter().map(|(field, message)| (*field, message.as_str()))
    }

    /// Replaces the entry for `field` with `result`, clearing it on success.
    pub fn set(&mut self, field: Field, result: Result<(), &str>) {
        match result {
            Ok(()) => {
                self.0.remove(&field);
            }
            Err(message) => {
                self.0.insert(field, message.to_string());
            }
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in self.iter() {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{}: {message}", field.as_str())?;
            first = false;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownOption {
    pub kind: &'static str,
    pub value: String,
}

/// A labelled choice offered by one of the form's selectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SelectOption {
    pub value: &'static str,
    pub label: &'static str,
}

macro_rules! option_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $($variant:ident => ($value:literal, $label:literal)),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $value)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $value,)+
                }
            }

            pub fn label(self) -> &'static str {
                match self {
                    $(Self::$variant => $label,)+
                }
            }

            /// Every choice in selector order.
            pub fn options() -> Vec<SelectOption> {
                Self::ALL
                    .iter()
                    .map(|item| SelectOption {
                        value: item.as_str(),
                        label: item.label(),
                    })
                    .collect()
            }
        }

        impl FromStr for $name {
            type Err = UnknownOption;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($value => Ok(Self::$variant),)+
                    other => Err(UnknownOption {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

option_enum! {
    /// Store location. Only Bangladesh is accepted for now, the rest are
    /// still listed in the selector.
    Country, "country" {
        Bangladesh => ("Bangladesh", "Bangladesh"),
        India => ("India", "India"),
        Usa => ("USA", "USA"),
        Uk => ("UK", "UK"),
    }
}

option_enum! {
    Category, "category" {
        Fashion => ("Fashion", "Fashion"),
        Electronics => ("Electronics", "Electronics"),
        Groceries => ("Groceries", "Groceries"),
        HomeAndGarden => ("Home & Garden", "Home & Garden"),
    }
}

option_enum! {
    /// Selling currency. Only BDT is accepted for now.
    Currency, "currency" {
        Bdt => ("BDT", "BDT (Taka)"),
        Usd => ("USD", "USD (US Dollar)"),
        Eur => ("EUR", "EUR (Euro)"),
        Inr => ("INR", "INR (Indian Rupee)"),
    }
}
