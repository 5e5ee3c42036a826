//! Phase-setting search.

use std::future::Future;

use super::CompositionError;

/// Every ordering of `values`, in lexicographic order of positions.
pub fn permutations(values: &[i64]) -> Vec<Vec<i64>> {
    if values.len() <= 1 {
        return vec![values.to_vec()];
    }
    let mut result = Vec::new();
    for (i, &head) in values.iter().enumerate() {
        let mut rest = values.to_vec();
        rest.remove(i);
        for mut tail in permutations(&rest) {
            tail.insert(0, head);
            result.push(tail);
        }
    }
    result
}

/// Try every ordering of `phases` and keep the one with the highest signal.
///
/// `run` is called once per ordering. The first error aborts the search.
/// Returns `None` only when `phases` is empty.
pub async fn best_signal<F, Fut>(
    phases: &[i64],
    mut run: F,
) -> Result<Option<(i64, Vec<i64>)>, CompositionError>
where
    F: FnMut(Vec<i64>) -> Fut,
    Fut: Future<Output = Result<i64, CompositionError>>,
{
    if phases.is_empty() {
        return Ok(None);
    }
    let mut best: Option<(i64, Vec<i64>)> = None;
    for order in permutations(phases) {
        let signal = run(order.clone()).await?;
        log::trace!("phases {:?} -> {}", order, signal);
        if best.as_ref().map_or(true, |(top, _)| signal > *top) {
            best = Some((signal, order));
        }
    }
    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::Pipeline;
    use crate::program::Program;

    #[test]
    fn test_permutations() {
        let perms = permutations(&[1, 2, 3]);
        assert_eq!(perms.len(), 6);
        assert_eq!(perms[0], vec![1, 2, 3]);
        assert_eq!(perms[5], vec![3, 2, 1]);
        assert_eq!(permutations(&[0, 1, 2, 3, 4]).len(), 120);
    }

    #[tokio::test]
    async fn test_best_pipeline_phases() {
        let program = Program::parse("3,15,3,16,1002,16,10,16,1,16,15,15,4,15,99,0,0").unwrap();
        let pipeline = Pipeline::new(program);
        let pipeline = &pipeline;
        let best = best_signal(&[0, 1, 2, 3, 4], |order| async move {
            pipeline.run_signal(&order, 0).await
        })
        .await
        .unwrap();
        assert_eq!(best, Some((43210, vec![4, 3, 2, 1, 0])));
    }
}
