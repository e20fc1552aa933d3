//! Unit tests for Color and GcPhase

use core_types::{Color, GcPhase};

#[cfg(test)]
mod color_tests {
    use super::*;

    #[test]
    fn test_tag_round_trip() {
        for color in [Color::White, Color::Grey, Color::Black] {
            assert_eq!(Color::from_u8(color as u8), Some(color));
        }
        assert_eq!(Color::from_u8(3), None);
    }

    #[test]
    fn test_colors_only_darken() {
        assert!(Color::White < Color::Grey);
        assert!(Color::Grey < Color::Black);
    }

    #[test]
    fn test_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Color::Grey).unwrap(), "\"grey\"");
        let color: Color = serde_json::from_str("\"black\"").unwrap();
        assert_eq!(color, Color::Black);
    }
}

#[cfg(test)]
mod phase_tests {
    use super::*;

    #[test]
    fn test_default_is_idle() {
        assert_eq!(GcPhase::default(), GcPhase::Idle);
    }

    #[test]
    fn test_active_phases() {
        assert!(!GcPhase::Idle.is_active());
        assert!(GcPhase::Marking.is_active());
        assert!(GcPhase::Reclaiming.is_active());
    }
}
