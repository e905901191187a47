//! Capability resolution for sandboxed module references.
//!
//! Generated widgets may only `import`/`require` what the allow-list names.
//! The list is a compile-time constant, so nothing executed inside the sandbox
//! can extend it.

use thiserror::Error;

use crate::config::errors::ERR_RESOLUTION_DENIED;

/// Host bindings a sandboxed module may obtain through `require`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// The host UI-component-authoring primitive (`React`).
    Ui,
}

impl Capability {
    pub fn specifier(&self) -> &'static str {
        match self {
            Capability::Ui => "react",
        }
    }
}

const ALLOW_LIST: &[(&str, Capability)] = &[("react", Capability::Ui)];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{ERR_RESOLUTION_DENIED}: module '{symbol}' is not available to widgets (only 'react' can be required)")]
pub struct ResolutionError {
    pub symbol: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CapabilityResolver;

impl CapabilityResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve(&self, symbol: &str) -> Result<Capability, ResolutionError> {
        ALLOW_LIST
            .iter()
            .find(|(name, _)| *name == symbol)
            .map(|(_, capability)| *capability)
            .ok_or_else(|| ResolutionError {
                symbol: symbol.to_string(),
            })
    }

    pub fn allow_list(&self) -> impl Iterator<Item = &'static str> {
        ALLOW_LIST.iter().map(|(name, _)| *name)
    }
}
