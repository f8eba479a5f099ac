//! Special-case dependency extractors

use super::call::{DescriptorType, InterceptedCall};
use super::plan::{CallPlan, Step, Subject};
use super::rules::{DependencyRule, SpecialRule};
use crate::error::TrackerError;
use crate::handle::{Handle, HandleState};
use crate::trace::CallEffect;

/// Add the edges of `rule` for `subject`
pub fn dependencies(
    rule: DependencyRule,
    call: &InterceptedCall,
    subject: &Subject,
    plan: &mut CallPlan,
) -> Result<(), TrackerError> {
    match rule {
        DependencyRule::AllocateCommandBuffers => {
            plan.depend_created(subject.clone(), call.handle_of("commandPool"));
        }
        DependencyRule::AllocateDescriptorSets => {
            plan.depend_created(subject.clone(), call.handle_of("descriptorPool"));
        }
        DependencyRule::AllocateMemory => {
            for dedicated in ["dedicatedImage", "dedicatedBuffer"] {
                let target = call.handle_of(dedicated);
                if !target.is_null() {
                    plan.depend_created(subject.clone(), target);
                }
            }
        }
        DependencyRule::CreateImageView => {
            plan.push(Step::Depend {
                subject: subject.clone(),
                depends_on: call.handle_of("image"),
                dependent_state: HandleState::Created,
                depends_on_state: HandleState::BoundMemory,
            });
        }
        DependencyRule::CreateGraphicsPipelines => graphics_pipelines(call, subject, plan)?,
        DependencyRule::CreateFramebuffer => {
            plan.depend_created(subject.clone(), call.handle_of("renderPass"));
            if let Some(attachments) = call.find_param("pAttachments") {
                for &view in &attachments.handles {
                    plan.depend_created(subject.clone(), view);
                }
            }
        }
        DependencyRule::BindMemory => {
            let Subject::Handles(resources) = subject else {
                return Err(unsupported(call, "memory binding needs a resource parameter"));
            };
            for &resource in resources {
                bind(plan, resource, call.handle_of("memory"));
            }
        }
        DependencyRule::UpdateDescriptorSets => descriptor_writes(call, subject, plan),
    }
    Ok(())
}

/// Custom tracking for calls that carry their handles in structured details
pub fn special(special: SpecialRule, call: &InterceptedCall, plan: &mut CallPlan) {
    match special {
        SpecialRule::BindMemory2 => {
            for info in &call.details.bind_infos {
                bind(plan, info.target, info.memory);
            }
            let targets = call
                .details
                .bind_infos
                .iter()
                .map(|info| info.target)
                .filter(|target| !target.is_null())
                .collect();
            plan.push(Step::AttachCall {
                subject: Subject::Handles(targets),
                state: Some(HandleState::BoundMemory),
            });
            plan.note_effect(CallEffect::StateChange(HandleState::BoundMemory));
        }
    }
}

/// Bound resource depends on the memory and on its own unbound state
fn bind(plan: &mut CallPlan, resource: Handle, memory: Handle) {
    if resource.is_null() {
        return;
    }
    for depends_on in [memory, resource] {
        plan.push(Step::Depend {
            subject: Subject::single(resource),
            depends_on,
            dependent_state: HandleState::BoundMemory,
            depends_on_state: HandleState::Created,
        });
    }
}

fn graphics_pipelines(
    call: &InterceptedCall,
    subject: &Subject,
    plan: &mut CallPlan,
) -> Result<(), TrackerError> {
    let Subject::Handles(pipelines) = subject else {
        return Err(unsupported(call, "pipeline dependencies need created pipelines"));
    };
    let infos = &call.details.pipelines;
    if infos.len() != pipelines.len() {
        return Err(unsupported(
            call,
            &format!(
                "{} pipelines created but {} create infos provided",
                pipelines.len(),
                infos.len()
            ),
        ));
    }
    for (&pipeline, info) in pipelines.iter().zip(infos) {
        if pipeline.is_null() {
            continue;
        }
        for &module in &info.stages {
            plan.depend_created(Subject::single(pipeline), module);
        }
        plan.depend_created(Subject::single(pipeline), info.render_pass);
    }
    Ok(())
}

fn descriptor_writes(call: &InterceptedCall, subject: &Subject, plan: &mut CallPlan) {
    for write in &call.details.descriptor_writes {
        plan.depend_created(subject.clone(), write.dst_set);
        match write.descriptor_type {
            DescriptorType::CombinedImageSampler => {
                for info in &write.image_infos {
                    plan.depend_created(subject.clone(), info.sampler);
                    plan.depend_created(subject.clone(), info.image_view);
                }
            }
            DescriptorType::Sampler => {
                for info in &write.image_infos {
                    plan.depend_created(subject.clone(), info.sampler);
                }
            }
            DescriptorType::UniformBuffer => {
                for info in &write.buffer_infos {
                    plan.depend_created(subject.clone(), info.buffer);
                }
            }
            _ => {}
        }
    }
}

fn unsupported(call: &InterceptedCall, reason: &str) -> TrackerError {
    TrackerError::Unsupported {
        call: call.name.clone(),
        reason: reason.to_string(),
    }
}
