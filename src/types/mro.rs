//! C3 linearisation of a class hierarchy.

use crate::error::PyErr;
use crate::object::ObjectId;
use crate::runtime::Runtime;
use crate::PyResult;

/// Merges the linearisations of `bases` followed by `bases` itself.
///
/// The result lists every ancestor once, keeps each base's own MRO order and
/// puts every type before its bases. The new type itself is not included.
pub(crate) fn linearize(rt: &Runtime, bases: &[ObjectId]) -> PyResult<Vec<ObjectId>> {
    let mut sequences: Vec<Vec<ObjectId>> = Vec::with_capacity(bases.len() + 1);
    for &base in bases {
        sequences.push(rt.type_object(base)?.mro.clone());
    }
    sequences.push(bases.to_vec());
    merge(rt, sequences)
}

fn merge(rt: &Runtime, sequences: Vec<Vec<ObjectId>>) -> PyResult<Vec<ObjectId>> {
    let mut result = Vec::new();
    // Heads are consumed from the front; track positions instead of
    // shifting vectors.
    let mut heads = vec![0usize; sequences.len()];

    loop {
        let pending: Vec<usize> = (0..sequences.len())
            .filter(|&i| heads[i] < sequences[i].len())
            .collect();
        if pending.is_empty() {
            return Ok(result);
        }

        let candidate = pending.iter().map(|&i| sequences[i][heads[i]]).find(|&head| {
            !pending
                .iter()
                .any(|&j| sequences[j][heads[j] + 1..].contains(&head))
        });

        let Some(next) = candidate else {
            let names: Vec<String> = pending
                .iter()
                .map(|&i| sequences[i][heads[i]])
                .fold(Vec::new(), |mut seen: Vec<ObjectId>, id| {
                    if !seen.contains(&id) {
                        seen.push(id);
                    }
                    seen
                })
                .into_iter()
                .map(|id| rt.type_name(id))
                .collect();
            return Err(PyErr::type_error(format!(
                "Cannot create a consistent method resolution order (MRO) for bases {}",
                names.join(", ")
            )));
        };

        result.push(next);
        for i in 0..sequences.len() {
            if heads[i] < sequences[i].len() && sequences[i][heads[i]] == next {
                heads[i] += 1;
            }
        }
    }
}
