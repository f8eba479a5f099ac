//! Classified call, ready to apply
//!
//! Classification runs without the tracker lock and produces a [`CallPlan`]:
//! an ordered list of bookkeeping steps. Applying the plan is the only part
//! that touches reconstruction state.

use smallvec::SmallVec;

use super::call::HandleList;
use crate::error::TrackerError;
use crate::handle::{ActionId, Handle, HandleState, NodeKey, ObjectType};
use crate::lifecycle::ModifyMode;
use crate::reconstruction::Reconstruction;
use crate::trace::{CallEffect, CallId};

/// Dependent side of a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    Handles(HandleList),
    /// The action node of the call being applied
    Action,
}

impl Subject {
    pub fn single(handle: Handle) -> Self {
        Subject::Handles(SmallVec::from_slice(&[handle]))
    }
}

/// One bookkeeping operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    AddHandles {
        handles: HandleList,
        ty: ObjectType,
    },
    AddAction,
    Depend {
        subject: Subject,
        depends_on: Handle,
        dependent_state: HandleState,
        depends_on_state: HandleState,
    },
    AttachCall {
        subject: Subject,
        state: Option<HandleState>,
    },
    SetCreated(HandleList),
    Remove {
        handles: HandleList,
        recursive: bool,
    },
    Modify {
        handles: HandleList,
        mode: ModifyMode,
    },
    ClearModify(HandleList),
}

/// Ordered steps for one intercepted call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallPlan {
    pub steps: Vec<Step>,
    pub effect: CallEffect,
}

impl Default for CallPlan {
    fn default() -> Self {
        Self {
            steps: Vec::new(),
            effect: CallEffect::Untracked,
        }
    }
}

/// Higher wins when a call has several effects
fn effect_rank(effect: CallEffect) -> u8 {
    match effect {
        CallEffect::Pending | CallEffect::Untracked => 0,
        CallEffect::Modify => 1,
        CallEffect::Destroy => 2,
        CallEffect::StateChange(_) => 3,
        CallEffect::Action(_) => 4,
        CallEffect::Create => 5,
    }
}

impl CallPlan {
    pub fn push(&mut self, step: Step) {
        self.steps.push(step);
    }

    /// Plain created-on-created edge
    pub fn depend_created(&mut self, subject: Subject, depends_on: Handle) {
        self.push(Step::Depend {
            subject,
            depends_on,
            dependent_state: HandleState::Created,
            depends_on_state: HandleState::Created,
        });
    }

    pub fn note_effect(&mut self, effect: CallEffect) {
        if effect_rank(effect) > effect_rank(self.effect) {
            self.effect = effect;
        }
    }

    pub fn is_tracked(&self) -> bool {
        !self.steps.is_empty()
    }

    /// Run every step against `recon` on behalf of `call`
    ///
    /// A failing step does not stop the rest; the first error is returned.
    pub fn apply(&self, recon: &mut Reconstruction, call: CallId) -> Result<(), TrackerError> {
        let action = NodeKey::Action(ActionId(call.0));
        let mut result = Ok(());
        let mut keep = |outcome: Result<(), TrackerError>| {
            if let Err(err) = outcome {
                if result.is_ok() {
                    result = Err(err);
                }
            }
        };

        for step in &self.steps {
            match step {
                Step::AddHandles { handles, ty } => keep(recon.add_handles(handles, *ty)),
                Step::AddAction => {
                    keep(recon.add_action(ActionId(call.0)));
                    keep(recon.set_api_effect(call, CallEffect::Action(ActionId(call.0))));
                }
                Step::Depend {
                    subject,
                    depends_on,
                    dependent_state,
                    depends_on_state,
                } => keep(match subject {
                    Subject::Handles(handles) => {
                        recon.add_handle_dependency(handles, *depends_on, *dependent_state, *depends_on_state)
                    }
                    Subject::Action => {
                        recon.add_dependency(action, *depends_on, *dependent_state, *depends_on_state)
                    }
                }),
                Step::AttachCall { subject, state } => keep(match subject {
                    Subject::Handles(handles) => recon.for_each_handle_add_api(handles, call, *state),
                    Subject::Action => recon.add_api(action, call, *state),
                }),
                Step::SetCreated(handles) => keep(recon.set_created_handles_for_api(call, handles)),
                Step::Remove { handles, recursive } => keep(recon.remove_handles(handles, *recursive)),
                Step::Modify { handles, mode } => {
                    keep(recon.for_each_handle_add_modify_api(handles, call, *mode))
                }
                Step::ClearModify(handles) => keep(recon.for_each_handle_clear_modify_api(handles)),
            }
        }
        keep(recon.set_api_effect(call, self.effect));
        result
    }
}
