// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
pub mod config;
pub mod constants;
pub mod controller;
pub mod error;
pub mod images;
pub mod reconcilers;
pub mod resources;
pub mod types;
pub mod webhooks;

#[cfg(test)]
pub mod test_utils;
