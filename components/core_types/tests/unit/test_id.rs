//! Unit tests for NodeId and Side

use core_types::{NodeId, Side};

#[cfg(test)]
mod node_id_tests {
    use super::*;

    #[test]
    fn test_nil_is_index_zero() {
        assert_eq!(NodeId::NIL.index(), 0);
        assert!(NodeId::NIL.is_nil());
        assert!(!NodeId::new(1).is_nil());
    }

    #[test]
    fn test_usize_conversions() {
        let id: NodeId = 7usize.into();
        assert_eq!(id, NodeId::new(7));
        let raw: usize = id.into();
        assert_eq!(raw, 7);
    }

    #[test]
    fn test_ordering_follows_index() {
        let mut ids = vec![NodeId::new(5), NodeId::NIL, NodeId::new(2)];
        ids.sort();
        assert_eq!(ids, vec![NodeId::NIL, NodeId::new(2), NodeId::new(5)]);
    }

    #[test]
    fn test_display_is_bare_index() {
        assert_eq!(NodeId::new(42).to_string(), "42");
    }
}

#[cfg(test)]
mod side_tests {
    use super::*;

    #[test]
    fn test_other_flips() {
        assert_eq!(Side::Left.other(), Side::Right);
        assert_eq!(Side::Right.other(), Side::Left);
    }

    #[test]
    fn test_both_lists_left_first() {
        assert_eq!(Side::BOTH, [Side::Left, Side::Right]);
    }

    #[test]
    fn test_display() {
        assert_eq!(Side::Left.to_string(), "left");
        assert_eq!(Side::Right.to_string(), "right");
    }
}
