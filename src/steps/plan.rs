//! Pure compilation of a host step list into an ordered screen plan.
//!
//! Compilation is deterministic: identical inputs always produce
//! structurally identical plans. Position restore from navigable history
//! depends on this.

use tracing::error;

use super::{DocumentType, FlowMode, PlanEntry, ScreenKind, Step, StepKind, StepPlan};

/// Compile the authoritative screen sequence for one flow.
///
/// `mobile_flow` marks a compiler running on the companion device: the
/// incoming step list is first rewritten so the companion ends on its own
/// success screen instead of the desktop completion screen.
pub fn compile(
    flow: FlowMode,
    document_type: &DocumentType,
    steps: &[Step],
    mobile_flow: bool,
) -> StepPlan {
    match flow {
        FlowMode::CrossDevice => cross_device_plan(steps),
        FlowMode::CaptureSteps => {
            if mobile_flow {
                let steps = client_capture_steps(steps);
                expand_all(&steps, document_type)
            } else {
                expand_all(steps, document_type)
            }
        }
    }
}

/// Companion-side rewrite of the host step list: drop a trailing
/// `complete` step and append a synthetic `clientSuccess` step.
///
/// Always returns a fresh Vec; the host configuration is never mutated.
pub fn client_capture_steps(steps: &[Step]) -> Vec<Step> {
    let mut rewritten: Vec<Step> = if ends_with_complete(steps) {
        steps[..steps.len() - 1].to_vec()
    } else {
        steps.to_vec()
    };
    rewritten.push(Step::new(StepKind::ClientSuccess));
    rewritten
}

fn ends_with_complete(steps: &[Step]) -> bool {
    steps
        .last()
        .is_some_and(|step| step.kind == StepKind::Complete)
}

/// Desktop-side plan while capture is delegated: the linking screen, the
/// waiting screen, and the completion screen when the host configured one.
fn cross_device_plan(steps: &[Step]) -> StepPlan {
    let step = Step::new(StepKind::CrossDevice);
    let mut screens = vec![ScreenKind::CrossDeviceLink, ScreenKind::MobileFlowWait];
    if ends_with_complete(steps) {
        screens.push(ScreenKind::Complete);
    }
    screens
        .into_iter()
        .map(|screen| PlanEntry {
            screen,
            step: step.clone(),
        })
        .collect()
}

fn expand_all(steps: &[Step], document_type: &DocumentType) -> StepPlan {
    steps
        .iter()
        .flat_map(|step| expand_step(step, document_type))
        .collect()
}

/// Expand one step into the screens it contributes, each bound to the
/// step that produced it. Unknown kinds contribute nothing.
fn expand_step(step: &Step, document_type: &DocumentType) -> Vec<PlanEntry> {
    let screens = match &step.kind {
        StepKind::Welcome => vec![ScreenKind::Welcome],
        StepKind::Face => vec![ScreenKind::FaceCapture, ScreenKind::FaceConfirm],
        StepKind::Document => document_screens(document_type),
        StepKind::Complete => vec![ScreenKind::Complete],
        StepKind::ClientSuccess => vec![ScreenKind::ClientSuccess],
        StepKind::CrossDevice => {
            // Only the compiler itself places cross-device entries; a host
            // list containing one is treated like any other unknown kind.
            error!(kind = %step.kind, "step kind not valid in a capture flow, skipping");
            vec![]
        }
        StepKind::Unknown(name) => {
            error!(kind = %name, "no such step kind, skipping");
            vec![]
        }
    };
    screens
        .into_iter()
        .map(|screen| PlanEntry {
            screen,
            step: step.clone(),
        })
        .collect()
}

fn document_screens(document_type: &DocumentType) -> Vec<ScreenKind> {
    let mut screens = vec![
        ScreenKind::Select,
        ScreenKind::FrontCapture,
        ScreenKind::FrontConfirm,
    ];
    if document_type.is_double_sided() {
        screens.push(ScreenKind::BackCapture);
        screens.push(ScreenKind::BackConfirm);
    }
    screens
}
