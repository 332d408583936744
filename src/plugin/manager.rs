//! Plugin manager

use std::sync::Arc;

use super::hooks::{Plugin, PluginEnforce, PluginHook, has_hook};
use crate::error::LlmError;

/// Ordered plugin set.
///
/// `pre` plugins come first, unordered plugins keep registration order in the
/// middle, `post` plugins come last. Names are unique.
#[derive(Clone, Default)]
pub struct PluginManager {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl PluginManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a manager from a list, rejecting duplicate names.
    pub fn from_plugins(
        plugins: impl IntoIterator<Item = Arc<dyn Plugin>>,
    ) -> Result<Self, LlmError> {
        let mut manager = Self::new();
        for plugin in plugins {
            manager.use_plugin(plugin)?;
        }
        Ok(manager)
    }

    /// Add a plugin. Fails when a plugin with the same name is registered.
    pub fn use_plugin(&mut self, plugin: Arc<dyn Plugin>) -> Result<&mut Self, LlmError> {
        if self.plugins.iter().any(|p| p.name() == plugin.name()) {
            return Err(LlmError::InvalidParameter(format!(
                "plugin '{}' is already registered",
                plugin.name()
            )));
        }
        self.plugins.push(plugin);
        Ok(self)
    }

    /// Remove a plugin by name; returns it when present.
    pub fn remove(&mut self, name: &str) -> Option<Arc<dyn Plugin>> {
        let idx = self.plugins.iter().position(|p| p.name() == name)?;
        Some(self.plugins.remove(idx))
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.plugins.iter().find(|p| p.name() == name).cloned()
    }

    /// Every plugin in execution order.
    pub fn get_all(&self) -> Vec<Arc<dyn Plugin>> {
        let tier = |p: &Arc<dyn Plugin>| match p.enforce() {
            Some(PluginEnforce::Pre) => 0,
            None => 1,
            Some(PluginEnforce::Post) => 2,
        };
        let mut ordered = self.plugins.clone();
        // Stable sort keeps registration order within a tier.
        ordered.sort_by_key(tier);
        ordered
    }

    /// Plugins implementing `hook`, in execution order.
    pub fn get_plugins_with_hook(&self, hook: PluginHook) -> Vec<Arc<dyn Plugin>> {
        self.get_all()
            .into_iter()
            .filter(|p| has_hook(p.as_ref(), hook))
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.get_all().iter().map(|p| p.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}
