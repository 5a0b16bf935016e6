//! Partitioner - splits a role's endpoints into per-worker ranges
//!
//! `chunk = total / workers`. Worker `i` drives `[i * chunk, (i + 1) * chunk - 1]`
//! and the last worker extends to `total - 1`, absorbing the remainder.
//! With more workers than endpoints each endpoint gets its own worker and the
//! surplus workers get an empty range (they are skipped, not an error).

use crate::domain::WorkerAssignment;

/// Assign endpoint index ranges to `workers` workers
///
/// Returns one assignment per worker, ordered by worker id. Zero workers
/// yields no assignments.
pub fn assign(total_endpoints: usize, workers: usize) -> Vec<WorkerAssignment> {
    if workers == 0 {
        return Vec::new();
    }

    if workers > total_endpoints {
        return (0..workers)
            .map(|worker_id| {
                let range = if worker_id < total_endpoints {
                    worker_id..worker_id + 1
                } else {
                    total_endpoints..total_endpoints
                };
                WorkerAssignment::new(worker_id, range)
            })
            .collect();
    }

    let chunk = total_endpoints / workers;
    (0..workers)
        .map(|worker_id| {
            let start = worker_id * chunk;
            let end = if worker_id + 1 == workers {
                total_endpoints
            } else {
                start + chunk
            };
            WorkerAssignment::new(worker_id, start..end)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_last_worker_absorbs_remainder() {
        let bounds: Vec<_> = assign(10, 3).iter().map(|a| a.bounds()).collect();
        assert_eq!(bounds, vec![Some((0, 2)), Some((3, 5)), Some((6, 9))]);
    }

    #[test]
    fn test_even_split() {
        let sizes: Vec<_> = assign(12, 4).iter().map(|a| a.len()).collect();
        assert_eq!(sizes, vec![3, 3, 3, 3]);
    }

    #[test]
    fn test_more_workers_than_endpoints() {
        let assignments = assign(2, 5);
        assert_eq!(assignments.len(), 5);
        assert_eq!(assignments[0].bounds(), Some((0, 0)));
        assert_eq!(assignments[1].bounds(), Some((1, 1)));
        assert!(assignments[2..].iter().all(|a| a.is_empty()));
    }

    #[test]
    fn test_no_endpoints() {
        let assignments = assign(0, 3);
        assert_eq!(assignments.len(), 3);
        assert!(assignments.iter().all(|a| a.is_empty()));
    }

    #[test]
    fn test_zero_workers() {
        assert!(assign(10, 0).is_empty());
    }

    #[test]
    fn test_single_worker_takes_everything() {
        let assignments = assign(7, 1);
        assert_eq!(assignments, vec![WorkerAssignment::new(0, 0..7)]);
    }

    proptest! {
        #[test]
        fn assignments_cover_every_endpoint_once(total in 0usize..500, workers in 1usize..64) {
            let assignments = assign(total, workers);
            prop_assert_eq!(assignments.len(), workers);

            let mut seen = vec![0u32; total];
            for a in &assignments {
                for index in a.range.clone() {
                    seen[index] += 1;
                }
            }
            prop_assert!(seen.iter().all(|count| *count == 1));
        }

        #[test]
        fn assignments_are_contiguous_and_ordered(total in 0usize..500, workers in 1usize..64) {
            let non_empty: Vec<_> = assign(total, workers)
                .into_iter()
                .filter(|a| !a.is_empty())
                .collect();
            for pair in non_empty.windows(2) {
                prop_assert_eq!(pair[0].range.end, pair[1].range.start);
                prop_assert!(pair[0].worker_id < pair[1].worker_id);
            }
            if let Some(first) = non_empty.first() {
                prop_assert_eq!(first.range.start, 0);
            }
        }

        #[test]
        fn chunk_sizes_follow_the_remainder_rule(total in 1usize..500, workers in 1usize..64) {
            prop_assume!(workers <= total);
            let chunk = total / workers;
            let assignments = assign(total, workers);
            let (last, rest) = assignments.split_last().unwrap();
            prop_assert!(rest.iter().all(|a| a.len() == chunk));
            prop_assert_eq!(last.len(), chunk + total % workers);
        }

        #[test]
        fn surplus_workers_get_nothing(total in 0usize..32, extra in 1usize..32) {
            let workers = total + extra;
            let assignments = assign(total, workers);
            for a in &assignments {
                if a.worker_id < total {
                    prop_assert_eq!(a.len(), 1);
                } else {
                    prop_assert!(a.is_empty());
                }
            }
        }
    }
}
