// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Process-to-image resolution boundary.

use crate::types::AppBundle;

/// Maps a process of an app to a concrete container image. Validation uses
/// it to confirm every process is buildable; the deployment reconciler uses
/// it to fill container specs.
pub trait ImageResolver: Send + Sync {
    fn resolve(&self, app: &AppBundle, process: &str) -> Option<String>;
}

/// Resolves every process to the image declared in the build config.
#[derive(Debug, Clone, Default)]
pub struct BuildImageResolver;

impl ImageResolver for BuildImageResolver {
    fn resolve(&self, app: &AppBundle, _process: &str) -> Option<String> {
        app.spec
            .build
            .image
            .clone()
            .filter(|image| !image.is_empty())
    }
}
