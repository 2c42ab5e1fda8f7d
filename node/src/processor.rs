//! Stateless unit checks run before the resolver sees a unit.
//!
//! These checks need nothing but the unit, so batches are spread over the
//! rayon pool; only the resolver insertion that follows is ordered.

use rayon::prelude::*;
use weave_dag::{DagError, Unit};

/// Hash and message integrity, then the author's signature.
pub fn verify_unit(unit: &Unit) -> Result<(), DagError> {
    unit.verify_contents()?;
    if unit.is_genesis() {
        return Ok(());
    }
    unit.header().verify_author()
}

/// [`verify_unit`] over a batch in parallel, preserving input order.
pub fn verify_batch(units: Vec<Unit>) -> Vec<(Unit, Result<(), DagError>)> {
    units
        .into_par_iter()
        .map(|unit| {
            let verdict = verify_unit(&unit);
            (unit, verdict)
        })
        .collect()
}
