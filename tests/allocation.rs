//! Allocation tracking around buffer population, triangulation runs,
//! and release, using the optional `count-allocations` feature.

#[cfg(feature = "count-allocations")]
use allocation_counter::measure;
use rand::Rng;

/// Helpers shared by the allocation tests.
pub mod test_helpers {
    use super::*;

    /// Measure allocations of `f`, returning its result alongside.
    ///
    /// # Panics
    ///
    /// Panics if the closure `f` does not complete successfully.
    #[cfg(feature = "count-allocations")]
    pub fn measure_with_result<F, R>(f: F) -> (R, allocation_counter::AllocationInfo)
    where
        F: FnOnce() -> R,
    {
        let mut result: Option<R> = None;
        let info = measure(|| {
            result = Some(f());
        });
        (result.expect("closure should have set result"), info)
    }

    /// Fallback for when allocation counting is disabled.
    #[cfg(not(feature = "count-allocations"))]
    pub fn measure_with_result<F, R>(f: F) -> (R, ())
    where
        F: FnOnce() -> R,
    {
        (f(), ())
    }

    /// Random coordinates in a small box.
    #[must_use]
    pub fn random_points(count: usize) -> Vec<[f64; 2]> {
        let mut rng = rand::rng();
        (0..count)
            .map(|_| {
                [
                    rng.random_range(-10.0..10.0),
                    rng.random_range(-10.0..10.0),
                ]
            })
            .collect()
    }

    /// Print a short allocation summary for `operation`.
    #[cfg(feature = "count-allocations")]
    pub fn print_alloc_summary(info: &allocation_counter::AllocationInfo, operation: &str) {
        println!("=== {operation} ===");
        println!("total allocations: {}", info.count_total);
        println!("peak allocations:  {}", info.count_max);
        println!("total bytes:       {}", info.bytes_total);
        println!("peak bytes:        {}", info.bytes_max);
    }

    /// Fallback summary for when allocation counting is disabled.
    #[cfg(not(feature = "count-allocations"))]
    pub fn print_alloc_summary(_info: &(), operation: &str) {
        println!("=== {operation}: allocation counting disabled ===");
    }
}

#[cfg(test)]
mod tests {
    use super::test_helpers::*;
    use trigen::prelude::*;

    #[test]
    fn buffer_population_allocates_once_per_array() {
        let (count, info) = measure_with_result(|| {
            let points = random_points(100);
            let mut input = MeshBuffer::new();
            input.set_points(&points).unwrap();
            let count = input.point_count();
            input.release();
            count
        });

        assert_eq!(count, 100);
        print_alloc_summary(&info, "populate 100 points");
    }

    #[test]
    fn a_triangulation_run_frees_what_it_allocates() {
        let (counts, info) = measure_with_result(|| {
            let points = random_points(50);
            let mut input = MeshBuffer::new();
            input.set_points(&points).unwrap();
            let output = triangulate(&input, &Options::default(), false).unwrap();
            let counts = (output.point_count(), output.triangle_count());
            input.release();
            output.release();
            counts
        });

        assert_eq!(counts.0, 50);
        assert!(counts.1 > 0);
        print_alloc_summary(&info, "triangulate 50 points");
    }

    #[test]
    fn replacing_an_array_does_not_retain_the_old_one() {
        let (final_count, info) = measure_with_result(|| {
            let mut input = MeshBuffer::new();
            input.set_points(&random_points(64)).unwrap();
            input.set_points(&random_points(8)).unwrap();
            let count = input.point_count();
            input.release();
            count
        });

        assert_eq!(final_count, 8);
        print_alloc_summary(&info, "replace a point list");
    }
}
