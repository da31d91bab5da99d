// Chord names from pitch-class content.
//
// A chord is named by its root (chosen by the scoring policy) plus a
// quality suffix. The suffix comes from an exact match of the chord's
// pitch-class set, transposed so the root sits at 0, against a small
// template table. A set that matches no template has no name; callers show
// `null` for it.

use crate::pitch::pc_name;

/// Quality suffix and the pitch classes above the root that define it.
const QUALITY_TEMPLATES: [(&str, &[u8]); 12] = [
    // Triads
    ("", &[0, 4, 7]),
    ("m", &[0, 3, 7]),
    ("dim", &[0, 3, 6]),
    ("aug", &[0, 4, 8]),
    ("sus2", &[0, 2, 7]),
    ("sus4", &[0, 5, 7]),
    ("5", &[0, 7]),
    // Sevenths
    ("7", &[0, 4, 7, 10]),
    ("maj7", &[0, 4, 7, 11]),
    ("m7", &[0, 3, 7, 10]),
    ("m7b5", &[0, 3, 6, 10]),
    ("dim7", &[0, 3, 6, 9]),
];

fn template_mask(template: &[u8]) -> u16 {
    template.iter().fold(0u16, |m, &iv| m | (1 << iv))
}

/// Rotate a pitch-class mask down so that `root` lands on bit 0.
fn relative_to(mask: u16, root: u8) -> u16 {
    let r = (root % 12) as u32;
    let m = mask as u32;
    ((m >> r | m << (12 - r)) & 0x0FFF) as u16
}

/// Quality suffix of a pitch-class set over the given root.
pub fn quality(pc_mask: u16, root: u8) -> Option<&'static str> {
    let rel = relative_to(pc_mask, root);
    QUALITY_TEMPLATES
        .iter()
        .find(|(_, template)| template_mask(template) == rel)
        .map(|(suffix, _)| *suffix)
}

/// Full chord name ("C", "Am7", "F#dim"), or `None` without a root or a
/// matching template.
pub fn chord_name(pc_mask: u16, root: Option<u8>) -> Option<String> {
    let root = root?;
    let suffix = quality(pc_mask, root)?;
    Some(format!("{}{}", pc_name(root), suffix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pitch::pc_mask;

    #[test]
    fn test_triads_and_sevenths() {
        assert_eq!(chord_name(pc_mask(&[60, 64, 67]), Some(0)).as_deref(), Some("C"));
        assert_eq!(chord_name(pc_mask(&[57, 60, 64]), Some(9)).as_deref(), Some("Am"));
        assert_eq!(chord_name(pc_mask(&[66, 69, 72]), Some(6)).as_deref(), Some("F#dim"));
        assert_eq!(chord_name(pc_mask(&[67, 71, 74, 77]), Some(7)).as_deref(), Some("G7"));
        assert_eq!(chord_name(pc_mask(&[59, 62, 65, 69]), Some(11)).as_deref(), Some("Bm7b5"));
        assert_eq!(chord_name(pc_mask(&[60, 67]), Some(0)).as_deref(), Some("C5"));
    }

    #[test]
    fn test_unnamed_sets() {
        assert_eq!(chord_name(pc_mask(&[60, 61, 62]), Some(0)), None);
        assert_eq!(chord_name(pc_mask(&[60, 64, 67]), None), None);
        assert_eq!(chord_name(pc_mask(&[60]), Some(0)), None);
    }

    #[test]
    fn test_rotation_wraps() {
        // B D F# relative to B is 0 3 7.
        assert_eq!(relative_to(pc_mask(&[59, 62, 66]), 11), template_mask(&[0, 3, 7]));
        assert_eq!(relative_to(0b1, 0), 0b1);
    }
}
