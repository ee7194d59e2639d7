// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Musical notes, scale filters and frequency quantization.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// The MIDI index of A4.
const A4_INDEX: i32 = 69;

/// Concert pitch for A4 in Hz.
const A4_FREQUENCY: f32 = 440.0;

/// Pitch class names, indexed by pitch class.
const PITCH_CLASS_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// A discrete musical pitch, identified by its MIDI-like index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MusicalNote {
    index: i32,
}

impl MusicalNote {
    /// Creates a note from its MIDI-like index (60 = C4, 69 = A4).
    pub const fn new(index: i32) -> MusicalNote {
        MusicalNote { index }
    }

    /// Returns the MIDI-like index of the note.
    pub fn index(&self) -> i32 {
        self.index
    }

    /// Returns the pitch class (0 = C, 11 = B).
    pub fn pitch_class(&self) -> u8 {
        self.index.rem_euclid(12) as u8
    }

    /// Returns the octave number, where the octave containing middle C is 4.
    pub fn octave(&self) -> i32 {
        self.index.div_euclid(12) - 1
    }

    /// Returns the note shifted by the given number of semitones.
    pub fn transpose(&self, semitones: i32) -> MusicalNote {
        MusicalNote::new(self.index + semitones)
    }

    /// Returns the equal-tempered frequency of this note in Hz.
    pub fn frequency(&self) -> f32 {
        A4_FREQUENCY * 2f32.powf((self.index - A4_INDEX) as f32 / 12.0)
    }

    /// Returns the display name of the note, e.g. "C#4".
    pub fn name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for MusicalNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}",
            PITCH_CLASS_NAMES[self.pitch_class() as usize],
            self.octave()
        )
    }
}

impl FromStr for MusicalNote {
    type Err = String;

    /// Parses names such as "A4", "C#3", "Db5" or "B-1".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let mut chars = s.chars();
        let letter = chars
            .next()
            .ok_or_else(|| "empty note name".to_string())?
            .to_ascii_uppercase();
        let natural = match letter {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return Err(format!("invalid note name {}", s)),
        };

        let rest = chars.as_str();
        let (accidental, octave) = if let Some(octave) = rest.strip_prefix('#') {
            (1, octave)
        } else if let Some(octave) = rest.strip_prefix('b') {
            (-1, octave)
        } else {
            (0, rest)
        };

        let octave: i32 = octave
            .parse()
            .map_err(|_| format!("invalid octave in note name {}", s))?;

        Ok(MusicalNote::new((octave + 1) * 12 + natural + accidental))
    }
}

/// The set of pitch classes notes are allowed to land on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleFilter {
    /// Every semitone is allowed.
    #[default]
    #[serde(alias = "chr")]
    Chromatic,
    /// Major (ionian) scale on C.
    #[serde(alias = "maj")]
    Major,
    /// Natural minor (aeolian) scale on C.
    #[serde(alias = "min")]
    Minor,
    /// Major pentatonic scale on C.
    #[serde(alias = "pen")]
    Pentatonic,
}

impl ScaleFilter {
    /// Returns the pitch classes permitted by this filter.
    pub fn pitch_classes(&self) -> &'static [u8] {
        match self {
            ScaleFilter::Chromatic => &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
            ScaleFilter::Major => &[0, 2, 4, 5, 7, 9, 11],
            ScaleFilter::Minor => &[0, 2, 3, 5, 7, 8, 10],
            ScaleFilter::Pentatonic => &[0, 2, 4, 7, 9],
        }
    }

    /// Returns true if the given note's pitch class belongs to this filter.
    pub fn contains(&self, note: MusicalNote) -> bool {
        self.pitch_classes().contains(&note.pitch_class())
    }

    /// Snaps the note to the nearest permitted pitch. Ties resolve downwards and
    /// the search crosses octave boundaries, so B snaps up to the next C when C
    /// is the closer member.
    pub fn snap(&self, note: MusicalNote) -> MusicalNote {
        if *self == ScaleFilter::Chromatic {
            return note;
        }

        // Every filter has a member within a tritone of any pitch class.
        for distance in 0..=6 {
            let below = note.transpose(-distance);
            if self.contains(below) {
                return below;
            }
            let above = note.transpose(distance);
            if self.contains(above) {
                return above;
            }
        }
        note
    }
}

impl fmt::Display for ScaleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScaleFilter::Chromatic => "CHR",
            ScaleFilter::Major => "MAJ",
            ScaleFilter::Minor => "MIN",
            ScaleFilter::Pentatonic => "PEN",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for ScaleFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "chr" | "chromatic" => Ok(ScaleFilter::Chromatic),
            "maj" | "major" => Ok(ScaleFilter::Major),
            "min" | "minor" => Ok(ScaleFilter::Minor),
            "pen" | "pentatonic" => Ok(ScaleFilter::Pentatonic),
            _ => Err(format!("unknown scale {}", s)),
        }
    }
}

/// Converts a frequency to the nearest equal-tempered note index.
pub fn frequency_to_index(frequency: f32) -> i32 {
    (A4_INDEX as f32 + 12.0 * (frequency / A4_FREQUENCY).log2()).round() as i32
}

/// Quantizes a frequency to a musical note permitted by the scale filter.
pub fn quantize(frequency: f32, scale: ScaleFilter) -> MusicalNote {
    scale.snap(MusicalNote::new(frequency_to_index(frequency)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_SCALES: [ScaleFilter; 4] = [
        ScaleFilter::Chromatic,
        ScaleFilter::Major,
        ScaleFilter::Minor,
        ScaleFilter::Pentatonic,
    ];

    #[test]
    fn test_note_names() {
        assert_eq!(MusicalNote::new(69).to_string(), "A4");
        assert_eq!(MusicalNote::new(60).to_string(), "C4");
        assert_eq!(MusicalNote::new(61).to_string(), "C#4");
        assert_eq!(MusicalNote::new(57).to_string(), "A3");
        assert_eq!(MusicalNote::new(21).to_string(), "A0");
        assert_eq!(MusicalNote::new(11).to_string(), "B-1");
        assert_eq!(MusicalNote::new(-1).to_string(), "B-2");
    }

    #[test]
    fn test_note_parsing() {
        assert_eq!("A4".parse::<MusicalNote>().unwrap().index(), 69);
        assert_eq!("C4".parse::<MusicalNote>().unwrap().index(), 60);
        assert_eq!("c#4".parse::<MusicalNote>().unwrap().index(), 61);
        assert_eq!("Db4".parse::<MusicalNote>().unwrap().index(), 61);
        assert_eq!("B-1".parse::<MusicalNote>().unwrap().index(), 11);
        assert!("H4".parse::<MusicalNote>().is_err());
        assert!("C".parse::<MusicalNote>().is_err());
        assert!("".parse::<MusicalNote>().is_err());

        for index in 0..128 {
            let note = MusicalNote::new(index);
            assert_eq!(note.name().parse::<MusicalNote>().unwrap(), note);
        }
    }

    #[test]
    fn test_concert_pitch() {
        let note = quantize(440.0, ScaleFilter::Chromatic);
        assert_eq!(note.index(), 69);
        assert_eq!(note.name(), "A4");
        assert_eq!(quantize(261.63, ScaleFilter::Chromatic).name(), "C4");
        assert_eq!(quantize(110.0, ScaleFilter::Chromatic).name(), "A2");
    }

    #[test]
    fn test_chromatic_is_rounding() {
        let mut frequency = 30.0f32;
        while frequency < 4000.0 {
            let expected = (69.0 + 12.0 * (frequency / 440.0).log2()).round() as i32;
            assert_eq!(
                quantize(frequency, ScaleFilter::Chromatic).index(),
                expected
            );
            frequency *= 1.013;
        }
    }

    #[test]
    fn test_scale_membership() {
        let mut frequency = 30.0f32;
        while frequency < 4000.0 {
            for scale in ALL_SCALES {
                let note = quantize(frequency, scale);
                assert!(
                    scale.contains(note),
                    "{} quantized to {} outside {}",
                    frequency,
                    note,
                    scale
                );
                // Snapping never moves further than a tritone.
                assert!((note.index() - frequency_to_index(frequency)).abs() <= 6);
            }
            frequency *= 1.007;
        }
    }

    #[test]
    fn test_quantize_idempotent() {
        for index in 12..120 {
            for scale in ALL_SCALES {
                let note = quantize(MusicalNote::new(index).frequency(), scale);
                assert_eq!(quantize(note.frequency(), scale), note);
            }
        }
    }

    #[test]
    fn test_snap_tie_breaks_downwards() {
        // C# sits between C and D in every non-chromatic filter here.
        let c_sharp = MusicalNote::new(61);
        assert_eq!(ScaleFilter::Major.snap(c_sharp).index(), 60);
        assert_eq!(ScaleFilter::Minor.snap(c_sharp).index(), 60);
        assert_eq!(ScaleFilter::Pentatonic.snap(c_sharp).index(), 60);

        // F# is between F and G in major.
        assert_eq!(ScaleFilter::Major.snap(MusicalNote::new(66)).index(), 65);

        // B in minor is equidistant from A# and C.
        assert_eq!(ScaleFilter::Minor.snap(MusicalNote::new(71)).index(), 70);
    }

    #[test]
    fn test_snap_wraps_octave() {
        // B is one semitone below the next C and two above A.
        let b4 = MusicalNote::new(71);
        assert_eq!(ScaleFilter::Pentatonic.snap(b4).name(), "C5");
        // F is nearer E than G in pentatonic.
        assert_eq!(ScaleFilter::Pentatonic.snap(MusicalNote::new(65)).name(), "E4");
    }

    #[test]
    fn test_scale_parsing() {
        assert_eq!("maj".parse::<ScaleFilter>(), Ok(ScaleFilter::Major));
        assert_eq!("MIN".parse::<ScaleFilter>(), Ok(ScaleFilter::Minor));
        assert_eq!("pentatonic".parse::<ScaleFilter>(), Ok(ScaleFilter::Pentatonic));
        assert_eq!("chr".parse::<ScaleFilter>(), Ok(ScaleFilter::Chromatic));
        assert!("lydian".parse::<ScaleFilter>().is_err());
        assert_eq!(ScaleFilter::Pentatonic.to_string(), "PEN");
    }
}
