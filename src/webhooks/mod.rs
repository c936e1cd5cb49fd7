// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Admission control: defaulting, validation, and the webhook endpoint.

pub mod admission;
pub mod default;
pub mod server;
pub mod validate;

pub use admission::{AdmissionEngine, DiagnosticsSink, LogDiagnostics, ReviewKind};
pub use server::WebhookServer;
pub use validate::{AppValidator, FieldError, ValidationErrors};
