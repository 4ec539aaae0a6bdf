//! Descriptor evaluation: one contract against one descriptor, and a whole
//! source unit against the descriptor library.

use rayon::prelude::*;
use tracing::debug;

use super::ast::{Contract, SourceUnit};
use super::checks;
use super::descriptor::{Descriptor, DescriptorSet};
use super::report::{ContractReport, PatternVerdict};

/// Runs every check of `descriptor`; the verdict matches iff all pass. No
/// check is skipped after a failure so the report can name each one.
pub fn evaluate(contract: &Contract, descriptor: &Descriptor) -> PatternVerdict {
    let outcomes = descriptor
        .checks
        .iter()
        .map(|check| {
            let outcome = checks::run(check, contract);
            debug!(
                contract = %contract.name,
                descriptor = %descriptor.name,
                check = %outcome.check,
                passed = outcome.passed,
                "check evaluated"
            );
            outcome
        })
        .collect();
    PatternVerdict::new(&contract.name, &descriptor.name, outcomes)
}

/// One contract against every descriptor, in descriptor-name order.
pub fn evaluate_contract(contract: &Contract, descriptors: &DescriptorSet) -> ContractReport {
    ContractReport {
        contract: contract.name.clone(),
        kind: contract.kind,
        verdicts: descriptors.iter().map(|d| evaluate(contract, d)).collect(),
    }
}

/// Every contract of the unit against every descriptor. Contracts are
/// independent and evaluated in parallel; the result keeps declaration order.
pub fn analyze(unit: &SourceUnit, descriptors: &DescriptorSet) -> Vec<ContractReport> {
    unit.contracts
        .par_iter()
        .map(|contract| evaluate_contract(contract, descriptors))
        .collect()
}
