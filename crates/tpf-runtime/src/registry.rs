// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! The link-time step registry.
//!
//! Discovery needs to find step declarations without re-parsing the source tree at
//! startup. `#[tpf_macros::pipeline_step]` registers each annotated type's factory
//! into [`STEP_REGISTRY`], a `linkme` distributed slice collected across the whole
//! linked binary. The compiler's Discovery phase reads this registry and cross
//! references it against the pipeline template's declared step names.

use linkme::distributed_slice;
use std::any::Any;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Constructs a type-erased step instance. Callers downcast the result to the
/// concrete step type named by [`StepDescriptor::canonical_name`].
pub trait StepFactory {
    /// Builds a new instance of this step, type-erased behind `Any`.
    fn create() -> Box<dyn Any + Send + Sync>;
}

/// A single entry in the link-time step registry.
#[derive(Debug, Clone, Copy)]
pub struct StepDescriptor {
    /// The step's canonical, fully-qualified class/type name, matching the name
    /// used in the pipeline template and `order.json`.
    pub canonical_name: &'static str,
    /// Constructs a new instance of the described step.
    pub factory: fn() -> Box<dyn Any + Send + Sync>,
}

/// The link-time collected set of annotated step descriptors.
#[distributed_slice]
pub static STEP_REGISTRY: [StepDescriptor] = [..];

/// Builds a lookup map from canonical step name to its descriptor, for Discovery
/// and startup instantiation to consult.
///
/// `STEP_REGISTRY` is fixed at link time, so the map is built once and cached for
/// the life of the process.
#[must_use]
pub fn step_descriptor_map() -> HashMap<&'static str, StepDescriptor> {
    static MAP: OnceLock<HashMap<&'static str, StepDescriptor>> = OnceLock::new();
    MAP.get_or_init(|| {
        STEP_REGISTRY
            .iter()
            .map(|descriptor| (descriptor.canonical_name, *descriptor))
            .collect()
    })
    .clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy;

    impl StepFactory for Dummy {
        fn create() -> Box<dyn Any + Send + Sync> {
            Box::new(Dummy)
        }
    }

    #[test]
    fn descriptor_map_is_keyed_by_canonical_name() {
        let descriptor = StepDescriptor {
            canonical_name: "com.example.Dummy",
            factory: Dummy::create,
        };
        let map = HashMap::from([(descriptor.canonical_name, descriptor)]);
        assert!(map.contains_key("com.example.Dummy"));
        let built = (map["com.example.Dummy"].factory)();
        assert!(built.downcast_ref::<Dummy>().is_some());
    }
}
