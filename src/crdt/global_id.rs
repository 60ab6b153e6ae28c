use serde::{Deserialize, Serialize};

/// Total order on CRDT operation identities: `(counter, site_id)`, compared
/// lexicographically. `counter` is assigned by the originating site and is
/// strictly increasing per site; `site_id` is the tie-breaker for operations
/// issued with the same counter by different sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GlobalId {
    pub counter: u32,
    #[serde(rename = "siteId")]
    pub site_id: u32,
}

impl GlobalId {
    pub const fn new(counter: u32, site_id: u32) -> Self {
        Self { counter, site_id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_by_counter_first() {
        assert!(GlobalId::new(1, 5) < GlobalId::new(2, 0));
    }

    #[test]
    fn ties_break_on_site_id() {
        assert!(GlobalId::new(1, 1) < GlobalId::new(1, 2));
        assert!(GlobalId::new(2, 1) > GlobalId::new(1, 2));
    }

    #[test]
    fn is_antisymmetric_and_transitive() {
        let a = GlobalId::new(0, 1);
        let b = GlobalId::new(0, 2);
        let c = GlobalId::new(1, 0);
        assert!(a < b);
        assert!(!(b < a));
        assert!(b < c);
        assert!(a < c);
    }
}
