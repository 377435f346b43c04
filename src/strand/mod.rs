//! Strand construction and execution (`spec.md` §4.4–§4.5): turning a
//! source/destination/path description into an ordered list of [`Step`]s,
//! then running that list's two-pass reverse/forward solver.

pub mod builder;
pub mod executor;
pub mod node;

pub use builder::{build_strand, PathElement, StrandSpec};
pub use executor::execute_strand;
pub use node::Node;

use crate::sandbox::PaymentSandbox;
use crate::step::{DebtDirection, Step};

/// A strand's composed quality is the product of its steps' individual
/// upper bounds, threading each step's debt direction into the next
/// (`spec.md` §4.3, §4.6). Returns [`crate::amount::Quality::worst`] if
/// any step fails to report one.
pub fn composed_quality(
    steps: &[Step],
    sandbox: &PaymentSandbox,
) -> crate::error::EngineResult<crate::amount::Quality> {
    let mut direction = DebtDirection::Redeems;
    let mut quality = crate::amount::Quality::identity();
    for step in steps {
        let (step_quality, next_dir) = step.quality_upper_bound(sandbox, direction)?;
        quality = quality.compose(&step_quality)?;
        direction = next_dir;
    }
    Ok(quality)
}

/// True if any step in the strand has marked itself inactive.
pub fn is_inactive(steps: &[Step]) -> bool {
    steps.iter().any(|s| s.inactive())
}
