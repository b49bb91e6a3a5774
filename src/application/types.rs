use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;

/// Lifecycle state of an applicant record, stored as text.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ApplicantStatus {
    Pending,
    Approved,
    Denied,
}

impl ApplicantStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ApplicantStatus::Pending => "pending",
            ApplicantStatus::Approved => "approved",
            ApplicantStatus::Denied => "denied",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(ApplicantStatus::Pending),
            "approved" => Some(ApplicantStatus::Approved),
            "denied" => Some(ApplicantStatus::Denied),
            _ => None,
        }
    }

    /// Whether an existing record in this state blocks a new application.
    pub fn blocks_new_application(self) -> bool {
        matches!(self, ApplicantStatus::Pending | ApplicantStatus::Approved)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum Branch {
    Army,
    Navy,
    Marines,
    AirForce,
    CoastGuard,
    SpaceForce,
}

impl Branch {
    pub const ALL: [Branch; 6] = [
        Branch::Army,
        Branch::Navy,
        Branch::Marines,
        Branch::AirForce,
        Branch::CoastGuard,
        Branch::SpaceForce,
    ];

    /// Human-readable label, also the name of the guild role granted on
    /// approval.
    pub fn label(self) -> &'static str {
        match self {
            Branch::Army => "Army",
            Branch::Navy => "Navy",
            Branch::Marines => "Marines",
            Branch::AirForce => "Air Force",
            Branch::CoastGuard => "Coast Guard",
            Branch::SpaceForce => "Space Force",
        }
    }

    /// Stable value used in select menu options.
    pub fn value(self) -> &'static str {
        match self {
            Branch::Army => "army",
            Branch::Navy => "navy",
            Branch::Marines => "marines",
            Branch::AirForce => "air_force",
            Branch::CoastGuard => "coast_guard",
            Branch::SpaceForce => "space_force",
        }
    }

    pub fn from_value(value: &str) -> Option<Self> {
        Branch::ALL.into_iter().find(|b| b.value() == value)
    }
}

impl Display for Branch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServiceStatus {
    Current,
    Former,
    Future,
}

impl ServiceStatus {
    pub const ALL: [ServiceStatus; 3] = [
        ServiceStatus::Current,
        ServiceStatus::Former,
        ServiceStatus::Future,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ServiceStatus::Current => "Currently Serving",
            ServiceStatus::Former => "Veteran / Former",
            ServiceStatus::Future => "DEP / Future Warrior",
        }
    }

    pub fn value(self) -> &'static str {
        match self {
            ServiceStatus::Current => "current",
            ServiceStatus::Former => "former",
            ServiceStatus::Future => "future",
        }
    }

    pub fn from_value(value: &str) -> Option<Self> {
        ServiceStatus::ALL.into_iter().find(|s| s.value() == value)
    }
}

impl Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// The three free-text fields collected through modals.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum TextField {
    Name,
    Pronouns,
    Referral,
}

impl TextField {
    pub fn key(self) -> &'static str {
        match self {
            TextField::Name => "name",
            TextField::Pronouns => "pronouns",
            TextField::Referral => "referral",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "name" => Some(TextField::Name),
            "pronouns" => Some(TextField::Pronouns),
            "referral" => Some(TextField::Referral),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TextField::Name => "Name",
            TextField::Pronouns => "Pronouns",
            TextField::Referral => "How did you find us?",
        }
    }
}

/// A single change to a draft, applied atomically on the database thread.
#[derive(Debug, Clone)]
pub enum FieldUpdate {
    Text(TextField, String),
    Branch(Branch),
    Status(ServiceStatus),
}

/// Partially filled application attached to a DM prompt message. Serialized
/// as JSON into the draft_sessions table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplicationFields {
    pub name: Option<String>,
    pub pronouns: Option<String>,
    pub referral: Option<String>,
    pub branch: Option<Branch>,
    pub status: Option<ServiceStatus>,
}

impl ApplicationFields {
    pub fn apply(&mut self, update: FieldUpdate) {
        match update {
            FieldUpdate::Text(TextField::Name, value) => self.name = Some(value),
            FieldUpdate::Text(TextField::Pronouns, value) => self.pronouns = Some(value),
            FieldUpdate::Text(TextField::Referral, value) => self.referral = Some(value),
            FieldUpdate::Branch(branch) => self.branch = Some(branch),
            FieldUpdate::Status(status) => self.status = Some(status),
        }
    }

    pub fn text(&self, field: TextField) -> Option<&str> {
        match field {
            TextField::Name => self.name.as_deref(),
            TextField::Pronouns => self.pronouns.as_deref(),
            TextField::Referral => self.referral.as_deref(),
        }
    }

    /// Validates that every field is filled. Names the missing ones
    /// otherwise, so the user knows what is left to do.
    pub fn complete(&self) -> Result<CompletedApplication, WorkflowError> {
        fn filled(value: &Option<String>) -> Option<String> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        }

        let name = filled(&self.name);
        let pronouns = filled(&self.pronouns);
        let referral = filled(&self.referral);

        let mut missing = Vec::new();
        if name.is_none() {
            missing.push("name");
        }
        if pronouns.is_none() {
            missing.push("pronouns");
        }
        if referral.is_none() {
            missing.push("referral");
        }
        if self.branch.is_none() {
            missing.push("branch");
        }
        if self.status.is_none() {
            missing.push("service status");
        }

        if !missing.is_empty() {
            return Err(WorkflowError::IncompleteSubmission(missing));
        }

        Ok(CompletedApplication {
            name: name.unwrap(),
            pronouns: pronouns.unwrap(),
            referral: referral.unwrap(),
            branch: self.branch.unwrap(),
            status: self.status.unwrap(),
        })
    }
}

/// A fully validated application. Only values of this type reach the review
/// workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedApplication {
    pub name: String,
    pub pronouns: String,
    pub referral: String,
    pub branch: Branch,
    pub status: ServiceStatus,
}

#[derive(Debug, Clone)]
pub struct PendingReview {
    /// Message ID of the review card in the staff channel.
    pub message_id: u64,
    pub user_id: u64,
    pub application: CompletedApplication,
}

#[derive(Debug, Clone)]
pub struct DraftSession {
    /// Message ID of the DM prompt the draft is attached to.
    pub message_id: u64,
    pub user_id: u64,
    pub fields: ApplicationFields,
    pub opened_at: i64,
}

/// Outcome chosen by a reviewer.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Verdict {
    Approved,
    Denied,
}

impl Verdict {
    pub fn as_status(self) -> ApplicantStatus {
        match self {
            Verdict::Approved => ApplicantStatus::Approved,
            Verdict::Denied => ApplicantStatus::Denied,
        }
    }

    pub fn action(self) -> &'static str {
        match self {
            Verdict::Approved => "approve",
            Verdict::Denied => "deny",
        }
    }

    pub fn from_action(value: &str) -> Option<Self> {
        match value {
            "approve" => Some(Verdict::Approved),
            "deny" => Some(Verdict::Denied),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Verdict::Approved => "Approved",
            Verdict::Denied => "Denied",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_fields() -> ApplicationFields {
        ApplicationFields {
            name: Some("Sam".to_string()),
            pronouns: Some("they/them".to_string()),
            referral: Some("a friend".to_string()),
            branch: Some(Branch::Navy),
            status: Some(ServiceStatus::Former),
        }
    }

    #[test]
    fn complete_names_every_missing_field() {
        let err = ApplicationFields::default().complete().unwrap_err();
        match err {
            WorkflowError::IncompleteSubmission(missing) => {
                assert_eq!(
                    missing,
                    vec!["name", "pronouns", "referral", "branch", "service status"]
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn complete_treats_whitespace_as_missing() {
        let mut fields = full_fields();
        fields.pronouns = Some("   ".to_string());

        let err = fields.complete().unwrap_err();
        match err {
            WorkflowError::IncompleteSubmission(missing) => {
                assert_eq!(missing, vec!["pronouns"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        // the draft itself is untouched by validation
        assert_eq!(fields.pronouns.as_deref(), Some("   "));
    }

    #[test]
    fn complete_succeeds_on_full_draft() {
        let app = full_fields().complete().unwrap();
        assert_eq!(app.name, "Sam");
        assert_eq!(app.branch, Branch::Navy);
        assert_eq!(app.status, ServiceStatus::Former);
    }

    #[test]
    fn field_updates_apply_to_the_right_slot() {
        let mut fields = ApplicationFields::default();
        fields.apply(FieldUpdate::Text(TextField::Name, "Alex".to_string()));
        fields.apply(FieldUpdate::Branch(Branch::SpaceForce));

        assert_eq!(fields.name.as_deref(), Some("Alex"));
        assert_eq!(fields.branch, Some(Branch::SpaceForce));
        assert_eq!(fields.pronouns, None);
    }

    #[test]
    fn select_values_round_trip() {
        for branch in Branch::ALL {
            assert_eq!(Branch::from_value(branch.value()), Some(branch));
        }
        for status in ServiceStatus::ALL {
            assert_eq!(ServiceStatus::from_value(status.value()), Some(status));
        }
        assert_eq!(Branch::from_value("militia"), None);
    }
}
