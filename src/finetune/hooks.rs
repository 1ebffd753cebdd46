//! State-dict interceptors
//!
//! Two pure functions the persistence layer calls around save and load.
//! Save side: drop entries for frozen parameters so checkpoints carry only
//! what training changes. Load side: stop complaining about keys the
//! transformed module no longer defines, so checkpoints saved before the
//! transformation still load.

use crate::module::{named_parameters, Module};
use crate::state::{state_dict, LoadReport, StateDict};
use std::collections::HashSet;

/// Produce a copy of `state` without entries naming frozen parameters.
///
/// Keys are matched against the module's parameter set, not its buffers:
/// buffer entries always survive, since trainability is not defined for
/// them. Relative order of the retained entries is preserved and the
/// input is left untouched.
pub fn strip_untrainable(module: &dyn Module, state: &StateDict) -> StateDict {
    let frozen: HashSet<String> = named_parameters(module, "")
        .into_iter()
        .filter(|(_, tensor)| !tensor.requires_grad())
        .map(|(name, _)| name)
        .collect();

    let mut out = StateDict::new();
    for (key, tensor) in state.iter() {
        if !frozen.contains(key) {
            out.insert(key, tensor.clone());
        }
    }
    out
}

/// Drop missing-key complaints for keys the transformed module does not
/// expect in its checkpoints.
///
/// The authoritative membership test is the module's filtered state dict,
/// the keys [`strip_untrainable`] would emit. A key that set legitimately
/// contains stays reported when the checkpoint lacked it; frozen-parameter
/// keys and keys foreign to the tree are dropped from the complaint list.
pub fn relax_missing_keys(module: &dyn Module, report: &mut LoadReport) {
    let filtered = strip_untrainable(module, &state_dict(module));
    let expected: HashSet<String> = filtered.keys().map(String::from).collect();
    report.missing_keys.retain(|key| expected.contains(key));
}
