/// Pick the subsong to open.
///
/// `requested` is 1-based with 0 meaning "default". Containers with a single
/// stream always report index 0. For multi-stream containers an absent or
/// out-of-range request falls back to the first stream instead of failing.
pub fn resolve_subsong(requested: usize, count: usize) -> usize {
    if count <= 1 {
        return 0;
    }
    if requested == 0 || requested > count {
        if requested > count {
            log::warn!(
                "subsong {} out of range (1..={}), using the default stream",
                requested,
                count
            );
        }
        return 1;
    }
    requested
}
