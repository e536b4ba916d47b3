//! Scale library: maps integer note indices to volts, either chromatic or
//! mode-restricted.
//!
//! A scale is a bitmask of the twelve chromatic degrees it contains;
//! note-to-volts walks outward octave by octave picking the nearest
//! contained degree. This maps a dense integer *index* (`-64..+63`)
//! directly to the `index`-th note of the scale, rather than quantizing an
//! arbitrary incoming pitch, which is what `NoteSequence.Step` and the
//! procedural generators need.

/// Bitmask of the twelve chromatic degrees a scale contains, MSB = C.
pub type DegreeMask = u16;

pub const CHROMATIC_MASK: DegreeMask = 0b1111_1111_1111_0000;
pub const MAJOR_MASK: DegreeMask = 0b1010_1101_0101_0000; // C D E F G A B
pub const MINOR_MASK: DegreeMask = 0b1011_0101_1010_0000; // C D Eb F G Ab Bb

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Scale {
    mask: DegreeMask,
    chromatic: bool,
}

impl Scale {
    pub const fn chromatic() -> Self {
        Self { mask: CHROMATIC_MASK, chromatic: true }
    }

    pub const fn major() -> Self {
        Self { mask: MAJOR_MASK, chromatic: false }
    }

    pub const fn minor() -> Self {
        Self { mask: MINOR_MASK, chromatic: false }
    }

    pub const fn from_mask(mask: DegreeMask) -> Self {
        Self { mask, chromatic: mask == CHROMATIC_MASK }
    }

    pub fn is_chromatic(&self) -> bool {
        self.chromatic
    }

    fn degrees(&self) -> heapless::Vec<i32, 12> {
        let mut v = heapless::Vec::new();
        for degree in 0..12 {
            if (self.mask >> (15 - degree)) & 1 != 0 {
                let _ = v.push(degree);
            }
        }
        if v.is_empty() {
            for degree in 0..12 {
                let _ = v.push(degree);
            }
        }
        v
    }

    /// Converts a dense scale-degree index (a step's `note` field, range
    /// `-64..+63`) into an absolute semitone count from the scale's root,
    /// walking outward octave by octave through the scale's contained
    /// degrees.
    pub fn index_to_semitones(&self, index: i32) -> i32 {
        let degrees = self.degrees();
        let len = degrees.len() as i32;
        let octave = index.div_euclid(len);
        let degree_pos = index.rem_euclid(len) as usize;
        octave * 12 + degrees[degree_pos]
    }

    /// Converts a scale-degree index directly to volts (1.0 V/octave,
    /// MIDI 60 = 0.0 V convention).
    pub fn note_to_volts(&self, index: i32) -> f32 {
        self.index_to_semitones(index) as f32 / 12.0
    }
}

impl Default for Scale {
    fn default() -> Self {
        Self::chromatic()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chromatic_index_equals_semitones() {
        let s = Scale::chromatic();
        assert_eq!(s.index_to_semitones(0), 0);
        assert_eq!(s.index_to_semitones(12), 12);
        assert_eq!(s.index_to_semitones(-1), -1);
    }

    #[test]
    fn major_scale_skips_non_diatonic_degrees() {
        let s = Scale::major();
        assert!(!s.is_chromatic());
        // C D E F G A B -> indices 0..6 map to 0,2,4,5,7,9,11
        let expected = [0, 2, 4, 5, 7, 9, 11];
        for (i, &semis) in expected.iter().enumerate() {
            assert_eq!(s.index_to_semitones(i as i32), semis);
        }
        // Index 7 wraps to the next octave's root.
        assert_eq!(s.index_to_semitones(7), 12);
    }

    #[test]
    fn note_to_volts_is_semitones_over_twelve() {
        let s = Scale::chromatic();
        assert!((s.note_to_volts(24) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn negative_indices_walk_backwards() {
        let s = Scale::major();
        let up = s.index_to_semitones(7);
        let down = s.index_to_semitones(-7);
        assert_eq!(up, 12);
        assert_eq!(down, -12);
    }
}
