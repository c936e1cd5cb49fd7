// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Custom resource types managed by drover.

pub mod app;

pub use app::{
    AppBundle, AppBundleSpec, AppConfig, AppEnvVar, Autoscaling, AutoscalingOverlay, BuildConfig,
    EnvOverlay, EnvVarOverlay, Process, ReplicasOverlay,
};
