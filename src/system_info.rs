//! Host information used for pool sizing

/// Number of logical processors, never less than 1
pub fn processor_count() -> usize {
    num_cpus::get().max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processor_count_is_positive() {
        assert!(processor_count() >= 1);
    }
}
