use serde::{Deserialize, Serialize};

/// Availability of the subdomain currently typed in the form.
///
/// Transitions: `Unknown -> Checking -> {Available | Taken | Unknown}`. A new
/// qualifying edit re-enters `Checking` from any state; a value that does not
/// qualify for a check resets to `Unknown`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainStatus {
    #[default]
    Unknown,
    Checking,
    Available,
    Taken,
}

/// Result of a single remote availability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainCheckOutcome {
    Available,
    Taken,
    /// The request failed or the response could not be understood.
    Failed,
}

impl DomainCheckOutcome {
    pub fn from_taken(taken: bool) -> Self {
        if taken {
            Self::Taken
        } else {
            Self::Available
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Taken => "taken",
            Self::Failed => "failed",
        }
    }
}

impl DomainStatus {
    pub fn begin_check(&mut self) {
        *self = Self::Checking;
    }

    pub fn resolve(&mut self, outcome: DomainCheckOutcome) {
        *self = match outcome {
            DomainCheckOutcome::Available => Self::Available,
            DomainCheckOutcome::Taken => Self::Taken,
            DomainCheckOutcome::Failed => Self::Unknown,
        };
    }

    pub fn reset(&mut self) {
        *self = Self::Unknown;
    }

    pub fn is_checking(self) -> bool {
        matches!(self, Self::Checking)
    }

    /// Inline hint rendered under the domain input, if any.
    pub fn status_text(self) -> Option<&'static str> {
        match self {
            Self::Unknown => None,
            Self::Checking => Some("Checking availability..."),
            Self::Available => Some("Domain available!"),
            Self::Taken => Some("Domain is already taken!"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_lifecycle_follows_outcomes() {
        let mut status = DomainStatus::default();
        assert_eq!(status, DomainStatus::Unknown);

        status.begin_check();
        assert!(status.is_checking());
        status.resolve(DomainCheckOutcome::from_taken(false));
        assert_eq!(status, DomainStatus::Available);

        status.begin_check();
        status.resolve(DomainCheckOutcome::from_taken(true));
        assert_eq!(status, DomainStatus::Taken);

        status.begin_check();
        status.resolve(DomainCheckOutcome::Failed);
        assert_eq!(status, DomainStatus::Unknown);
    }

    #[test]
    fn status_text_matches_hints() {
        assert_eq!(DomainStatus::Unknown.status_text(), None);
        assert_eq!(
            DomainStatus::Checking.status_text(),
            Some("Checking availability...")
        );
        assert_eq!(
            DomainStatus::Taken.status_text(),
            Some("Domain is already taken!")
        );
    }
}
