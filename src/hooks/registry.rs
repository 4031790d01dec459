use std::collections::HashSet;

use super::core::{
    AfterResponseHookFn, ErrorHookFn, Hook, HookScope, RequestHookFn, ResponseHookFn, Stage,
};
use crate::ids::HookId;

/// Per-application hook lists, one typed list per [`Stage`].
///
/// Cloning is shallow: callbacks are shared, which is how a route snapshots the
/// hooks of its application at declaration time.
#[derive(Clone, Default, Debug)]
pub struct HookRegistry {
    pub(crate) global_request: Vec<Hook<RequestHookFn>>,
    pub(crate) transform: Vec<Hook<RequestHookFn>>,
    pub(crate) before_handle: Vec<Hook<RequestHookFn>>,
    pub(crate) after_handle: Vec<Hook<ResponseHookFn>>,
    pub(crate) map_response: Vec<Hook<ResponseHookFn>>,
    pub(crate) global_error: Vec<Hook<ErrorHookFn>>,
    pub(crate) global_after_response: Vec<Hook<AfterResponseHookFn>>,
}

impl HookRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pull `child`'s hooks into this registry.
    ///
    /// Global hooks always come along; local hooks only when `child_exported`.
    /// Every list is then deduplicated by hook id, first occurrence wins.
    pub fn merge_from(&mut self, child: &HookRegistry, child_exported: bool) {
        merge_stage(&mut self.global_request, &child.global_request, child_exported);
        merge_stage(&mut self.transform, &child.transform, child_exported);
        merge_stage(&mut self.before_handle, &child.before_handle, child_exported);
        merge_stage(&mut self.after_handle, &child.after_handle, child_exported);
        merge_stage(&mut self.map_response, &child.map_response, child_exported);
        merge_stage(&mut self.global_error, &child.global_error, child_exported);
        merge_stage(
            &mut self.global_after_response,
            &child.global_after_response,
            child_exported,
        );
    }

    /// Ids registered for `stage`, in execution order.
    #[must_use]
    pub fn ids(&self, stage: Stage) -> Vec<HookId> {
        match stage {
            Stage::GlobalRequest => ids_of(&self.global_request),
            Stage::Transform => ids_of(&self.transform),
            Stage::BeforeHandle => ids_of(&self.before_handle),
            Stage::AfterHandle => ids_of(&self.after_handle),
            Stage::MapResponse => ids_of(&self.map_response),
            Stage::GlobalError => ids_of(&self.global_error),
            Stage::GlobalAfterResponse => ids_of(&self.global_after_response),
        }
    }

    #[must_use]
    pub fn len(&self, stage: Stage) -> usize {
        match stage {
            Stage::GlobalRequest => self.global_request.len(),
            Stage::Transform => self.transform.len(),
            Stage::BeforeHandle => self.before_handle.len(),
            Stage::AfterHandle => self.after_handle.len(),
            Stage::MapResponse => self.map_response.len(),
            Stage::GlobalError => self.global_error.len(),
            Stage::GlobalAfterResponse => self.global_after_response.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        Stage::ALL.iter().all(|s| self.len(*s) == 0)
    }
}

fn merge_stage<F: ?Sized>(into: &mut Vec<Hook<F>>, from: &[Hook<F>], include_local: bool) {
    into.extend(
        from.iter()
            .filter(|h| include_local || h.scope() == HookScope::Global)
            .cloned(),
    );
    dedupe(into);
}

fn dedupe<F: ?Sized>(hooks: &mut Vec<Hook<F>>) {
    let mut seen = HashSet::with_capacity(hooks.len());
    hooks.retain(|h| seen.insert(h.id()));
}

fn ids_of<F: ?Sized>(hooks: &[Hook<F>]) -> Vec<HookId> {
    hooks.iter().map(Hook::id).collect()
}
