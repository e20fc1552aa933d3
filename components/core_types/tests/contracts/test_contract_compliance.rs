//! Contract compliance tests for core_types
//!
//! These tests verify that the exported vocabulary has the shape the
//! collector components rely on.

use core_types::{Color, GcError, GcPhase, GcResult, NodeId, Side};

#[cfg(test)]
mod node_contract_tests {
    use super::*;

    /// Contract: NodeId is a Copy index with a NIL constant at 0
    #[test]
    fn test_node_id_is_copy_index() {
        let id = NodeId::new(3);
        let copy = id;
        assert_eq!(id, copy);
        assert_eq!(NodeId::NIL, NodeId::new(0));
    }

    /// Contract: NodeId serializes as a bare integer
    #[test]
    fn test_node_id_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&NodeId::new(12)).unwrap(), "12");
    }

    /// Contract: Side has exactly two slots
    #[test]
    fn test_side_has_two_slots() {
        assert_eq!(Side::BOTH.len(), 2);
    }
}

#[cfg(test)]
mod color_contract_tests {
    use super::*;

    /// Contract: Color has WHITE, GREY and BLACK
    #[test]
    fn test_color_variants() {
        let _: Color = Color::White;
        let _: Color = Color::Grey;
        let _: Color = Color::Black;
    }

    /// Contract: GcPhase has Idle, Marking and Reclaiming
    #[test]
    fn test_phase_variants() {
        let _: GcPhase = GcPhase::Idle;
        let _: GcPhase = GcPhase::Marking;
        let _: GcPhase = GcPhase::Reclaiming;
    }
}

#[cfg(test)]
mod error_contract_tests {
    use super::*;

    /// Contract: every error kind exists and implements std::error::Error
    #[test]
    fn test_error_variants() {
        let errors: Vec<GcError> = vec![
            GcError::OutOfRange {
                id: NodeId::new(9),
                capacity: 8,
            },
            GcError::OutOfMemory,
            GcError::NotReachable(NodeId::new(5)),
            GcError::InvalidCapacity(1),
            GcError::NotReleasable {
                id: NodeId::new(1),
                reason: "node is a root",
            },
            GcError::ReservedNode(NodeId::NIL),
            GcError::InvariantViolation("broken".to_string()),
            GcError::CollectorAttached,
            GcError::Spawn("no threads".to_string()),
        ];
        for err in errors {
            let boxed: Box<dyn std::error::Error> = Box::new(err);
            assert!(!boxed.to_string().is_empty());
        }
    }

    /// Contract: GcResult is Result<T, GcError>
    #[test]
    fn test_result_alias() {
        let ok: GcResult<usize> = Ok(1);
        assert_eq!(ok, Ok(1));
    }
}
