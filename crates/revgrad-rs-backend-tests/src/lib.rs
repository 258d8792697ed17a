//! Conformance suite exercised against any numeric backend.
//!
//! Backend crates invoke [`define_backend_tests!`] with a constructor
//! closure to stamp the whole suite into their own test module:
//!
//! ```ignore
//! revgrad_rs_backend_tests::define_backend_tests!(
//!     cpu_ref,
//!     || std::sync::Arc::new(revgrad_rs_backend_ref_cpu::CpuArrayBackend::new())
//! );
//! ```

pub mod contract;

#[macro_export]
macro_rules! define_backend_tests {
    ($module:ident, $backend_ctor:expr) => {
        #[cfg(test)]
        mod $module {
            use super::*;
            use $crate::contract;

            #[test]
            fn forward_same_shape_subtracts_elementwise() {
                contract::forward_same_shape_subtracts_elementwise(&($backend_ctor)());
            }

            #[test]
            fn forward_broadcasts_scalar_lhs() {
                contract::forward_broadcasts_scalar_lhs(&($backend_ctor)());
            }

            #[test]
            fn forward_broadcasts_scalar_rhs() {
                contract::forward_broadcasts_scalar_rhs(&($backend_ctor)());
            }

            #[test]
            fn forward_missing_input_fails_without_writing() {
                contract::forward_missing_input_fails_without_writing(&($backend_ctor)());
            }

            #[test]
            fn backward_same_shape_passes_and_negates() {
                contract::backward_same_shape_passes_and_negates(&($backend_ctor)());
            }

            #[test]
            fn backward_scalar_lhs_reduces_to_mean() {
                contract::backward_scalar_lhs_reduces_to_mean(&($backend_ctor)());
            }

            #[test]
            fn backward_scalar_rhs_reduces_to_negated_mean() {
                contract::backward_scalar_rhs_reduces_to_negated_mean(&($backend_ctor)());
            }

            #[test]
            fn backward_skips_unselected_inputs() {
                contract::backward_skips_unselected_inputs(&($backend_ctor)());
            }

            #[test]
            fn backward_missing_gradient_fails_without_writing() {
                contract::backward_missing_gradient_fails_without_writing(&($backend_ctor)());
            }

            #[test]
            fn release_is_idempotent() {
                contract::release_is_idempotent(&($backend_ctor)());
            }

            #[test]
            fn passes_leave_no_temporaries() {
                contract::passes_leave_no_temporaries(&($backend_ctor)());
            }

            #[test]
            fn alias_survives_source_release() {
                contract::alias_survives_source_release(&($backend_ctor)());
            }

            #[test]
            fn executor_runs_chain_forward_and_backward() {
                contract::executor_runs_chain_forward_and_backward(&($backend_ctor)());
            }

            #[test]
            fn randomized_chain_preserves_accounting() {
                contract::randomized_chain_preserves_accounting(&($backend_ctor)());
            }
        }
    };
}
