//! Tests for the transformation pass, the guard, and the interceptors

use super::*;
use crate::module::{named_parameters, trainable_parameters, Module};
use crate::nn::{BatchNorm, Linear, Sequential};
use crate::state::{state_dict, LoadReport, StateDict};
use crate::strategy::{ChildMeta, LoraLinear, LoraStrategy};
use crate::Tensor;

fn two_level_tree() -> Sequential {
    // root -> { leaf_a, branch_b -> { leaf_c } }
    let branch = Sequential::new().with("leaf_c", Box::new(Linear::new(2, 2)));
    Sequential::new()
        .with("leaf_a", Box::new(Linear::new(2, 2)))
        .with("branch_b", Box::new(branch))
}

fn match_nothing(_: &mut dyn Module, _: &ChildMeta<'_>) -> Result<bool, FineTuneError> {
    Ok(false)
}

// ============================================================================
// Walk truth table
// ============================================================================

#[test]
fn test_unmatched_leaf_is_frozen() {
    let mut tree = Sequential::new().with("leaf", Box::new(Linear::new(2, 2)));
    modify_modules(&mut tree, &mut match_nothing, "").unwrap();

    assert!(trainable_parameters(&tree).is_empty());
}

#[test]
fn test_unmatched_composite_is_descended_not_frozen_wholesale() {
    let mut tree = two_level_tree();
    let mut visited = Vec::new();
    let mut strategy = |_: &mut dyn Module, child: &ChildMeta<'_>| {
        visited.push(child.global_name.to_string());
        Ok::<bool, FineTuneError>(false)
    };

    modify_modules(&mut tree, &mut strategy, "").unwrap();

    // The walk reached the nested leaf through the composite
    assert_eq!(visited, vec!["leaf_a", "branch_b", "branch_b.leaf_c"]);
    assert!(trainable_parameters(&tree).is_empty());
}

#[test]
fn test_matched_in_place_leaf_is_still_frozen() {
    // A strategy that claims the node but installs no marked replacement:
    // the claim does not protect it from the freeze branch.
    let mut tree = Sequential::new().with("leaf", Box::new(Linear::new(2, 2)));
    let mut strategy =
        |_: &mut dyn Module, _: &ChildMeta<'_>| Ok::<bool, FineTuneError>(true);

    modify_modules(&mut tree, &mut strategy, "").unwrap();

    assert!(trainable_parameters(&tree).is_empty());
}

#[test]
fn test_matched_composite_without_replacement_is_frozen_not_descended() {
    let mut tree = two_level_tree();
    let mut visited = Vec::new();
    let mut strategy = |_: &mut dyn Module, child: &ChildMeta<'_>| {
        visited.push(child.global_name.to_string());
        Ok::<bool, FineTuneError>(child.global_name == "branch_b")
    };

    modify_modules(&mut tree, &mut strategy, "").unwrap();

    // Matched: never descended into, frozen wholesale
    assert_eq!(visited, vec!["leaf_a", "branch_b"]);
    assert!(trainable_parameters(&tree).is_empty());
}

#[test]
fn test_marked_replacement_keeps_its_trainable_parameters() {
    // Leaf sub-case of the flagged edge: the strategy installs a marked
    // replacement carrying one trainable tensor.
    let mut tree = Sequential::new()
        .with("leaf_a", Box::new(Linear::new(2, 2)))
        .with("branch_b", Box::new(Linear::new(2, 2)));
    let mut strategy = LoraStrategy::new(1, 1.0);

    modify_modules(&mut tree, &mut strategy, "").unwrap();

    let trainable: Vec<String> =
        trainable_parameters(&tree).into_iter().map(|(name, _)| name).collect();
    assert_eq!(
        trainable,
        vec!["leaf_a.lora_a", "leaf_a.lora_b", "branch_b.lora_a", "branch_b.lora_b"]
    );
}

#[test]
fn test_marked_composite_replacement_is_left_alone_entirely() {
    // Composite sub-case of the flagged edge: the marked replacement has
    // children of its own; the walk neither descends nor freezes.
    struct Wrapper {
        inner: Sequential,
    }
    impl Module for Wrapper {
        fn class_name(&self) -> &'static str {
            "Wrapper"
        }
        fn children(&self) -> Vec<(&str, &dyn Module)> {
            self.inner.children()
        }
        fn children_mut(&mut self) -> Vec<(&str, &mut dyn Module)> {
            self.inner.children_mut()
        }
        fn is_finetuable(&self) -> bool {
            true
        }
        fn forward(&self, input: &Tensor) -> Tensor {
            self.inner.forward(input)
        }
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
            self
        }
    }

    let mut tree = two_level_tree();
    let mut strategy = |parent: &mut dyn Module, child: &ChildMeta<'_>| {
        if child.global_name != "branch_b" {
            return Ok(false);
        }
        let inner = Sequential::new().with("adapted", Box::new(Linear::new(2, 2)));
        parent
            .replace_child(child.name, Box::new(Wrapper { inner }))
            .map_err(|_| FineTuneError::Strategy {
                name: child.global_name.to_string(),
                reason: "replacement rejected".to_string(),
            })?;
        Ok(true)
    };

    modify_modules(&mut tree, &mut strategy, "").unwrap();

    // The wrapper's subtree was never frozen
    let trainable: Vec<String> =
        trainable_parameters(&tree).into_iter().map(|(name, _)| name).collect();
    assert_eq!(trainable, vec!["branch_b.adapted.weight", "branch_b.adapted.bias"]);
}

#[test]
fn test_each_node_is_visited_exactly_once() {
    let mut tree = two_level_tree();
    let mut counts = std::collections::HashMap::new();
    let mut strategy = |_: &mut dyn Module, child: &ChildMeta<'_>| {
        *counts.entry(child.global_name.to_string()).or_insert(0usize) += 1;
        Ok::<bool, FineTuneError>(false)
    };

    modify_modules(&mut tree, &mut strategy, "").unwrap();

    assert!(counts.values().all(|&count| count == 1), "revisited a node: {counts:?}");
    assert_eq!(counts.len(), 3);
}

// ============================================================================
// Double-application guard
// ============================================================================

#[test]
fn test_guard_names_the_already_finetuable_node() {
    let lora = LoraLinear::from_linear(&Linear::new(2, 2), 1, 1.0);
    let branch = Sequential::new().with("adapted", Box::new(lora));
    let mut tree = Sequential::new().with("branch", Box::new(branch));

    let result = modify_modules(&mut tree, &mut match_nothing, "");
    match result {
        Err(FineTuneError::AlreadyFinetuable { name }) => {
            assert_eq!(name, "branch.adapted");
        }
        other => panic!("Expected AlreadyFinetuable, got {other:?}"),
    }
}

#[test]
fn test_enable_twice_fails() {
    let tree = Sequential::new().with("dense", Box::new(Linear::new(2, 2)));
    let mut strategy = LoraStrategy::new(1, 1.0);

    let tuned = enable_fine_tuning(tree, &mut strategy, true).unwrap();

    let result = enable_fine_tuning(tuned.into_inner(), &mut strategy, true);
    assert!(matches!(result, Err(FineTuneError::AlreadyFinetuable { .. })));
}

#[test]
fn test_strategy_errors_abort_the_walk() {
    let mut tree = two_level_tree();
    let mut strategy = |_: &mut dyn Module, child: &ChildMeta<'_>| {
        if child.global_name == "branch_b" {
            return Err(FineTuneError::Strategy {
                name: child.global_name.to_string(),
                reason: "refused".to_string(),
            });
        }
        Ok(false)
    };

    let result = modify_modules(&mut tree, &mut strategy, "");
    assert!(matches!(result, Err(FineTuneError::Strategy { .. })));
}

// ============================================================================
// Interceptors
// ============================================================================

#[test]
fn test_strip_untrainable_drops_frozen_params_keeps_buffers() {
    let mut tree = Sequential::new()
        .with("dense", Box::new(Linear::new(2, 2)))
        .with("norm", Box::new(BatchNorm::new(2)));
    modify_modules(&mut tree, &mut match_nothing, "").unwrap();

    let full = state_dict(&tree);
    let filtered = strip_untrainable(&tree, &full);

    // All parameters frozen, so only buffers survive
    let keys: Vec<&str> = filtered.keys().collect();
    assert_eq!(keys, vec!["norm.running_mean", "norm.running_var"]);

    // Input untouched
    assert_eq!(full.len(), 6);
}

#[test]
fn test_strip_untrainable_preserves_relative_order() {
    let mut tree = Sequential::new()
        .with("a", Box::new(Linear::new(2, 2)))
        .with("norm", Box::new(BatchNorm::new(2)))
        .with("b", Box::new(Linear::new(2, 2)));
    let mut strategy = LoraStrategy::new(1, 1.0);
    modify_modules(&mut tree, &mut strategy, "").unwrap();

    let filtered = strip_untrainable(&tree, &state_dict(&tree));
    let keys: Vec<&str> = filtered.keys().collect();
    assert_eq!(
        keys,
        vec![
            "a.lora_a",
            "a.lora_b",
            "norm.running_mean",
            "norm.running_var",
            "b.lora_a",
            "b.lora_b",
        ]
    );
}

#[test]
fn test_relax_missing_keys_drops_only_unknown_keys() {
    let tree = Sequential::new().with("dense", Box::new(Linear::new(2, 2)));

    let mut report = LoadReport {
        missing_keys: vec![
            "dense.weight".to_string(),      // legitimately expected
            "ghost.parameter".to_string(),   // not defined by the tree
        ],
        unexpected_keys: Vec::new(),
    };
    relax_missing_keys(&tree, &mut report);

    assert_eq!(report.missing_keys, vec!["dense.weight".to_string()]);
}

#[test]
fn test_filtered_state_has_no_frozen_parameter_keys() {
    let tree = two_level_tree();
    let mut strategy = LoraStrategy::new(2, 2.0);
    let tuned = enable_fine_tuning(tree, &mut strategy, true).unwrap();

    let state = tuned.state_dict();
    let frozen: Vec<String> = named_parameters(tuned.module(), "")
        .into_iter()
        .filter(|(_, tensor)| !tensor.requires_grad())
        .map(|(name, _)| name)
        .collect();

    assert!(!frozen.is_empty());
    for key in frozen {
        assert!(!state.contains_key(&key), "frozen key {key} leaked into the state dict");
    }
}

#[test]
fn test_wrapper_parameter_enumeration_respects_flag() {
    let tree = Sequential::new().with("dense", Box::new(Linear::new(2, 2)));
    let mut strategy = LoraStrategy::new(1, 1.0);

    let trainable_only = enable_fine_tuning(tree, &mut strategy, true).unwrap();
    assert!(trainable_only.parameters().iter().all(|(_, t)| t.requires_grad()));
    assert_eq!(trainable_only.parameters().len(), 2); // lora_a, lora_b

    let tree = Sequential::new().with("dense", Box::new(Linear::new(2, 2)));
    let mut strategy = LoraStrategy::new(1, 1.0);
    let all = enable_fine_tuning(tree, &mut strategy, false).unwrap();
    assert_eq!(all.parameters().len(), 4); // weight, bias, lora_a, lora_b
}

#[test]
fn test_wrapper_mutable_visit_respects_flag() {
    let tree = Sequential::new().with("dense", Box::new(Linear::new(2, 2)));
    let mut strategy = LoraStrategy::new(1, 1.0);
    let mut tuned = enable_fine_tuning(tree, &mut strategy, true).unwrap();

    let mut seen = Vec::new();
    tuned.for_each_parameter_mut(|name, _| seen.push(name.to_string()));
    assert_eq!(seen, vec!["dense.lora_a", "dense.lora_b"]);
}

#[test]
fn test_load_missing_frozen_keys_is_tolerated() {
    let tree = Sequential::new().with("dense", Box::new(Linear::new(2, 2)));
    let mut strategy = LoraStrategy::new(1, 1.0);
    let mut tuned = enable_fine_tuning(tree, &mut strategy, true).unwrap();

    // Checkpoint holds only the trainable entries
    let filtered = tuned.state_dict();
    let report = tuned.load_state_dict(&filtered).unwrap();

    assert!(report.missing_keys.is_empty(), "spurious missing keys: {report:?}");
    assert!(report.unexpected_keys.is_empty());
}

#[test]
fn test_load_still_reports_genuinely_missing_keys() {
    let tree = Sequential::new().with("dense", Box::new(Linear::new(2, 2)));
    let mut strategy = LoraStrategy::new(1, 1.0);
    let mut tuned = enable_fine_tuning(tree, &mut strategy, true).unwrap();

    // Drop one legitimately defined key from the checkpoint
    let filtered = tuned.state_dict();
    let mut partial = StateDict::new();
    for (key, tensor) in filtered.iter() {
        if key != "dense.lora_b" {
            partial.insert(key, tensor.clone());
        }
    }

    let report = tuned.load_state_dict(&partial).unwrap();
    assert_eq!(report.missing_keys, vec!["dense.lora_b".to_string()]);
}
