//! Derived cgroup memory values

/// Effective `memory.memsw.limit_in_bytes` for a container.
///
/// Swap defaults to twice the memory limit. A negative `memory_swap`
/// disables it and yields 0, which the template treats as "no swap line".
#[must_use]
pub const fn effective_swap_limit(memory: i64, memory_swap: i64) -> i64 {
    if memory_swap < 0 {
        return 0;
    }
    memory.saturating_mul(2)
}
