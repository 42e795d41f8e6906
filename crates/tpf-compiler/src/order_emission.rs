// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Order Emission (§4.1.6): serializes the canonical ordered-step resource.

use crate::error::CompileError;
use tpf_ir::order::OrderedStepList;
use tpf_ir::StepName;

/// Serializes `ordered_steps` into the JSON document written at
/// [`tpf_ir::order::RESOURCE_PATH`].
pub fn emit(ordered_steps: &[StepName]) -> Result<String, CompileError> {
    let list = OrderedStepList::new(ordered_steps.to_vec());
    serde_json::to_string_pretty(&list).map_err(|e| CompileError::OrderEmissionFailed {
        details: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_ordered_steps_as_json_array() {
        let json = emit(&["com.example.PriceStep".into(), "com.example.ShipStep".into()])
            .expect("serialization succeeds");
        assert!(json.contains("com.example.PriceStep"));
        assert!(json.contains("com.example.ShipStep"));
    }

    #[test]
    fn emits_empty_list_as_empty_array() {
        let json = emit(&[]).expect("serialization succeeds");
        let parsed: OrderedStepList = serde_json::from_str(&json).expect("round-trips");
        assert!(parsed.is_empty());
    }
}
