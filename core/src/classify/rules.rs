//! Static call classification table
//!
//! Calls not listed here are classified purely from their parameter
//! annotations, except `vkCmd*` recording calls which share one rule.

use std::sync::OnceLock;

use hashbrown::HashMap;

use crate::handle::{HandleState, ObjectType};
use crate::lifecycle::ModifyMode;

/// Extra dependency edges a call adds beyond the parent-type rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyRule {
    /// Created buffers depend on `commandPool`
    AllocateCommandBuffers,
    /// Created sets depend on `descriptorPool`
    AllocateDescriptorSets,
    /// Memory depends on its dedicated image or buffer
    AllocateMemory,
    /// View depends on the bound image
    CreateImageView,
    /// Each pipeline depends on its stage modules and render pass
    CreateGraphicsPipelines,
    /// Framebuffer depends on the render pass and every attachment
    CreateFramebuffer,
    /// Bound resource depends on `memory` and on its own created state
    BindMemory,
    /// Update depends on each written set and the written samplers, views and buffers
    UpdateDescriptorSets,
}

/// Calls whose whole tracking is custom
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialRule {
    /// `pBindInfos` of `vkBind*Memory2`: every element binds one resource
    BindMemory2,
}

/// How one call affects the tracked state
#[derive(Debug, Clone, Copy)]
pub struct CallRule {
    pub name: &'static str,
    pub dependencies: Option<DependencyRule>,
    /// Input parameter moved to a new state by this call
    pub state_change: Option<(&'static str, HandleState)>,
    /// Parameters whose handles record this call as a modification
    pub modifies: &'static [&'static str],
    pub modify_mode: ModifyMode,
    /// Call gets its own action node
    pub action: bool,
    /// Parameters whose modification log this call clears
    pub clear_modifiers: &'static [&'static str],
    /// Destroy without cascading; dependents keep the handle alive
    pub delayed_destroy: bool,
    pub special: Option<SpecialRule>,
}

impl CallRule {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            dependencies: None,
            state_change: None,
            modifies: &[],
            modify_mode: ModifyMode::Replace,
            action: false,
            clear_modifiers: &[],
            delayed_destroy: false,
            special: None,
        }
    }

    const fn with_dependencies(mut self, rule: DependencyRule) -> Self {
        self.dependencies = Some(rule);
        self
    }

    const fn with_state_change(mut self, param: &'static str, state: HandleState) -> Self {
        self.state_change = Some((param, state));
        self
    }

    const fn with_modifies(mut self, params: &'static [&'static str], mode: ModifyMode) -> Self {
        self.modifies = params;
        self.modify_mode = mode;
        self
    }

    const fn with_action(mut self) -> Self {
        self.action = true;
        self
    }

    const fn with_clear_modifiers(mut self, params: &'static [&'static str]) -> Self {
        self.clear_modifiers = params;
        self
    }

    const fn with_delayed_destroy(mut self) -> Self {
        self.delayed_destroy = true;
        self
    }

    const fn with_special(mut self, special: SpecialRule) -> Self {
        self.special = Some(special);
        self
    }

    pub fn is_modify_param(&self, param: &str) -> bool {
        self.modifies.contains(&param)
    }

    pub fn is_clear_modifier_param(&self, param: &str) -> bool {
        self.clear_modifiers.contains(&param)
    }

    /// Target state if `param` is this call's state-change parameter
    pub fn state_change_for(&self, param: &str) -> Option<HandleState> {
        self.state_change
            .filter(|(name, _)| *name == param)
            .map(|(_, state)| state)
    }
}

/// Types whose create calls are not replayed (they come from another create)
pub const SKIP_CREATOR_TYPES: &[ObjectType] = &[ObjectType::Queue];

/// Prefix of command recording calls
pub const COMMAND_PREFIX: &str = "vkCmd";

pub static CALL_RULES: &[CallRule] = &[
    CallRule::new("vkAllocateCommandBuffers").with_dependencies(DependencyRule::AllocateCommandBuffers),
    CallRule::new("vkAllocateDescriptorSets").with_dependencies(DependencyRule::AllocateDescriptorSets),
    CallRule::new("vkAllocateMemory").with_dependencies(DependencyRule::AllocateMemory),
    CallRule::new("vkCreateImageView").with_dependencies(DependencyRule::CreateImageView),
    CallRule::new("vkCreateGraphicsPipelines").with_dependencies(DependencyRule::CreateGraphicsPipelines),
    CallRule::new("vkCreateFramebuffer").with_dependencies(DependencyRule::CreateFramebuffer),
    CallRule::new("vkBindImageMemory")
        .with_dependencies(DependencyRule::BindMemory)
        .with_state_change("image", HandleState::BoundMemory),
    CallRule::new("vkBindBufferMemory")
        .with_dependencies(DependencyRule::BindMemory)
        .with_state_change("buffer", HandleState::BoundMemory),
    CallRule::new("vkBindImageMemory2").with_special(SpecialRule::BindMemory2),
    CallRule::new("vkBindImageMemory2KHR").with_special(SpecialRule::BindMemory2),
    CallRule::new("vkBindBufferMemory2").with_special(SpecialRule::BindMemory2),
    CallRule::new("vkBindBufferMemory2KHR").with_special(SpecialRule::BindMemory2),
    CallRule::new("vkUpdateDescriptorSets")
        .with_dependencies(DependencyRule::UpdateDescriptorSets)
        .with_action(),
    CallRule::new("vkMapMemoryIntoAddressSpaceGOOGLE").with_modifies(&["memory"], ModifyMode::Replace),
    CallRule::new("vkGetBlobGOOGLE").with_modifies(&["memory"], ModifyMode::Replace),
    CallRule::new("vkBeginCommandBuffer").with_modifies(&["commandBuffer"], ModifyMode::Append),
    CallRule::new("vkEndCommandBuffer").with_modifies(&["commandBuffer"], ModifyMode::Append),
    CallRule::new("vkResetCommandBuffer").with_clear_modifiers(&["commandBuffer"]),
    CallRule::new("vkDestroyShaderModule").with_delayed_destroy(),
];

static COMMAND_RULE: CallRule =
    CallRule::new(COMMAND_PREFIX).with_modifies(&["commandBuffer"], ModifyMode::Append);

static DEFAULT_RULE: CallRule = CallRule::new("");

fn rule_index() -> &'static HashMap<&'static str, usize> {
    static INDEX: OnceLock<HashMap<&'static str, usize>> = OnceLock::new();
    INDEX.get_or_init(|| {
        CALL_RULES
            .iter()
            .enumerate()
            .map(|(i, rule)| (rule.name, i))
            .collect()
    })
}

/// Rule for a call name; unknown calls get an empty rule
pub fn lookup(name: &str) -> &'static CallRule {
    if let Some(&i) = rule_index().get(name) {
        return &CALL_RULES[i];
    }
    if name.starts_with(COMMAND_PREFIX) {
        return &COMMAND_RULE;
    }
    &DEFAULT_RULE
}

/// True if `name` has an entry of its own (or is a recording call)
pub fn is_known(name: &str) -> bool {
    rule_index().contains_key(name) || name.starts_with(COMMAND_PREFIX)
}
