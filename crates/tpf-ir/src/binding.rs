// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Transport-specific views derived from a [`StepModel`](crate::step_model::StepModel).
//!
//! Bindings are derived and immutable; Binding Construction produces them from the IR
//! and they are consumed exactly once by their renderer (§4.1.5). Nothing downstream
//! of a renderer should ever observe a `Binding` value.

use crate::step_model::StepModel;
use crate::StepName;

/// A service/method pair identifying a generated gRPC handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    /// The fully-qualified gRPC service name.
    pub service_name: StepName,
}

/// A single RPC method on a [`ServiceDescriptor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    /// The method name as it appears on the wire.
    pub method_name: StepName,
}

/// Defaults applied to generated orchestrator client stubs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClientDefaults {
    /// The configuration key prefix clients are wired under (see `orchestrator-clients.properties`).
    pub config_key_prefix: Option<StepName>,
}

/// A transport-specific view of a single `StepModel`, produced once per (step, target) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    /// A gRPC server or client binding.
    Grpc {
        /// The step this binding was derived from.
        model: StepModel,
        /// The gRPC service this step is exposed as.
        service_descriptor: ServiceDescriptor,
        /// The gRPC method this step is exposed as.
        method_descriptor: MethodDescriptor,
    },
    /// A REST server binding.
    Rest {
        /// The step this binding was derived from.
        model: StepModel,
        /// An explicit path override, if the step customized its REST route.
        path_override: Option<StepName>,
    },
    /// An orchestrator wiring binding.
    Orchestrator {
        /// The step this binding was derived from.
        model: StepModel,
        /// The module steps the orchestrator dispatches into, in pipeline order.
        module_steps: Vec<StepName>,
        /// Defaults applied to the generated client stubs.
        client_defaults: ClientDefaults,
    },
}

impl Binding {
    /// The step this binding was derived from.
    #[must_use]
    pub fn model(&self) -> &StepModel {
        match self {
            Binding::Grpc { model, .. }
            | Binding::Rest { model, .. }
            | Binding::Orchestrator { model, .. } => model,
        }
    }
}
