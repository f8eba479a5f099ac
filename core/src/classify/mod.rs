//! Call classification
//!
//! Maps an intercepted call to the bookkeeping it implies:
//!
//! - **create**: created parameters are registered, depend on their parent
//!   object, and carry the call in their `Created` slot
//! - **state change**: the named parameter moves to a new state (memory binds)
//! - **destroy**: destroyed parameters are removed, recursively unless the call
//!   is a delayed destroy
//! - **modify** / **clear**: the call is appended to (or clears) the
//!   modification log of the named parameters
//! - **action**: the call gets its own synthetic node
//!
//! The rules live in a static table; unknown calls fall back to parameter
//! annotations alone.

mod call;
mod extract;
mod plan;
mod rules;

pub use call::{
    BindInfo, CallDetails, CallParam, DescriptorBufferInfo, DescriptorImageInfo, DescriptorType,
    DescriptorWrite, HandleList, InterceptedCall, ParamRole, PipelineDeps,
};
pub use plan::{CallPlan, Step, Subject};
pub use rules::{CALL_RULES, CallRule, DependencyRule, SpecialRule, is_known, lookup};

use crate::config::TrackerConfig;
use crate::error::TrackerError;
use crate::handle::{Handle, HandleState};
use crate::trace::CallEffect;

/// Work out what `call` does to the tracked state
pub fn classify(call: &InterceptedCall, config: &TrackerConfig) -> Result<CallPlan, TrackerError> {
    let rule = rules::lookup(&call.name);
    let mut plan = CallPlan::default();

    if let Some(special) = rule.special {
        extract::special(special, call, &mut plan);
    }

    for param in &call.params {
        let created = param.role == ParamRole::Created
            && !rules::SKIP_CREATOR_TYPES.contains(&param.object_type);
        let state_change = rule.state_change_for(&param.name);

        if created || state_change.is_some() {
            let subject = Subject::Handles(param.handles.clone());
            if created {
                plan.push(Step::AddHandles {
                    handles: param.handles.clone(),
                    ty: param.object_type,
                });
                if let Some(parent) = parent_handle(call, param) {
                    plan.depend_created(subject.clone(), parent);
                }
            }
            if let Some(deps) = rule.dependencies {
                extract::dependencies(deps, call, &subject, &mut plan)?;
            }

            let target = if created {
                HandleState::Created
            } else {
                state_change.unwrap_or(HandleState::Created)
            };
            plan.push(Step::AttachCall {
                subject,
                state: Some(target),
            });
            if created {
                let handles = param.handles.iter().copied().filter(|h| !h.is_null()).collect();
                plan.push(Step::SetCreated(handles));
                plan.note_effect(CallEffect::Create);
            } else {
                plan.note_effect(CallEffect::StateChange(target));
            }
        }

        if param.role == ParamRole::Destroyed {
            plan.push(Step::Remove {
                handles: param.handles.clone(),
                recursive: !rule.delayed_destroy,
            });
            plan.note_effect(CallEffect::Destroy);
        }

        if rule.is_modify_param(&param.name) {
            plan.push(Step::Modify {
                handles: param.handles.clone(),
                mode: rule.modify_mode,
            });
            plan.note_effect(CallEffect::Modify);
        } else if rule.is_clear_modifier_param(&param.name) {
            plan.push(Step::ClearModify(param.handles.clone()));
            plan.note_effect(CallEffect::Modify);
        }
    }

    if rule.action {
        if config.batched_descriptor_updates {
            tracing::trace!(call = %call.name, "action replayed from batched state, not tracked");
        } else {
            plan.push(Step::AddAction);
            if let Some(deps) = rule.dependencies {
                extract::dependencies(deps, call, &Subject::Action, &mut plan)?;
            }
            plan.push(Step::AttachCall {
                subject: Subject::Action,
                state: Some(HandleState::Created),
            });
        }
    }

    Ok(plan)
}

/// First input handle of the created type's parent type
fn parent_handle(call: &InterceptedCall, created: &CallParam) -> Option<Handle> {
    let parent_type = created.object_type.parent_type()?;
    call.params
        .iter()
        .find(|p| p.role == ParamRole::Input && p.object_type == parent_type)
        .and_then(|p| p.handles.first().copied())
}
