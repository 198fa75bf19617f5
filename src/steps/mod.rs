//! Step model and plan compilation for the capture wizard.
//!
//! A host supplies an ordered list of abstract [`Step`]s; the plan compiler
//! expands that list into the concrete screen sequence for the active flow.

pub mod plan;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use plan::{client_capture_steps, compile};

/// Abstract step kinds accepted in host configuration.
///
/// `CrossDevice` and `ClientSuccess` are synthetic: the compiler injects
/// them, hosts never configure them directly. Unrecognized wire strings are
/// preserved in `Unknown` so a bad entry never aborts deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StepKind {
    Welcome,
    Document,
    Face,
    Complete,
    CrossDevice,
    ClientSuccess,
    Unknown(String),
}

impl StepKind {
    /// Wire name of this kind, as it appears in host configuration.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Welcome => "welcome",
            Self::Document => "document",
            Self::Face => "face",
            Self::Complete => "complete",
            Self::CrossDevice => "crossDevice",
            Self::ClientSuccess => "clientSuccess",
            Self::Unknown(name) => name,
        }
    }
}

impl From<String> for StepKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "welcome" => Self::Welcome,
            "document" => Self::Document,
            "face" => Self::Face,
            "complete" => Self::Complete,
            "crossDevice" => Self::CrossDevice,
            "clientSuccess" => Self::ClientSuccess,
            _ => Self::Unknown(value),
        }
    }
}

impl From<StepKind> for String {
    fn from(value: StepKind) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One host-configured step: a kind plus opaque per-step options.
///
/// Options are carried through to the screen bound to the step; the core
/// never interprets them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    #[serde(rename = "type")]
    pub kind: StepKind,
    #[serde(flatten, default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub options: serde_json::Map<String, serde_json::Value>,
}

impl Step {
    /// Create a step with no options.
    pub fn new(kind: StepKind) -> Self {
        Self {
            kind,
            options: serde_json::Map::new(),
        }
    }
}

/// Supported document types for the document capture step.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum DocumentType {
    #[default]
    Passport,
    DrivingLicence,
    NationalIdentityCard,
    /// Unrecognized document types compile as single-sided.
    Other(String),
}

impl DocumentType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Passport => "passport",
            Self::DrivingLicence => "driving_licence",
            Self::NationalIdentityCard => "national_identity_card",
            Self::Other(name) => name,
        }
    }

    /// Whether this document requires a back-side capture pass.
    pub fn is_double_sided(&self) -> bool {
        matches!(self, Self::DrivingLicence | Self::NationalIdentityCard)
    }
}

impl From<String> for DocumentType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "passport" => Self::Passport,
            "driving_licence" => Self::DrivingLicence,
            "national_identity_card" => Self::NationalIdentityCard,
            _ => Self::Other(value),
        }
    }
}

impl From<DocumentType> for String {
    fn from(value: DocumentType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two top-level flows a session can be positioned in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FlowMode {
    /// Single-device capture flow (also runs on the companion device).
    CaptureSteps,
    /// Desktop-side linking/waiting flow while capture is delegated.
    CrossDevice,
}

impl fmt::Display for FlowMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CaptureSteps => f.write_str("captureSteps"),
            Self::CrossDevice => f.write_str("crossDevice"),
        }
    }
}

/// Renderable screens the compiler can place in a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScreenKind {
    Welcome,
    Select,
    FrontCapture,
    FrontConfirm,
    BackCapture,
    BackConfirm,
    FaceCapture,
    FaceConfirm,
    Complete,
    ClientSuccess,
    CrossDeviceLink,
    MobileFlowWait,
}

impl fmt::Display for ScreenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Welcome => "Welcome",
            Self::Select => "Select",
            Self::FrontCapture => "FrontCapture",
            Self::FrontConfirm => "FrontConfirm",
            Self::BackCapture => "BackCapture",
            Self::BackConfirm => "BackConfirm",
            Self::FaceCapture => "FaceCapture",
            Self::FaceConfirm => "FaceConfirm",
            Self::Complete => "Complete",
            Self::ClientSuccess => "ClientSuccess",
            Self::CrossDeviceLink => "CrossDeviceLink",
            Self::MobileFlowWait => "MobileFlowWait",
        };
        f.write_str(name)
    }
}

/// One renderable screen bound to the step that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanEntry {
    pub screen: ScreenKind,
    pub step: Step,
}

/// Ordered screen sequence for one flow. Rebuilt on every flow change,
/// never mutated in place; order is the sole navigation axis.
pub type StepPlan = Vec<PlanEntry>;
