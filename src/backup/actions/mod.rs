// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Built-in item actions

mod pod;
mod pvc;

pub use pod::PodVolumesAction;
pub use pvc::PvcAction;

use std::sync::Arc;

use super::action::{ActionRegistry, RegistryError};

/// Registry with every built-in action, in the order they chain
pub fn builtin_registry() -> Result<ActionRegistry, RegistryError> {
    let mut registry = ActionRegistry::new();
    registry.register(Arc::new(PodVolumesAction))?;
    registry.register(Arc::new(PvcAction))?;
    Ok(registry)
}
