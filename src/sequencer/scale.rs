// Scale - interval tables for the harmonic tracks

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScaleType {
    Major,
    NaturalMinor,
    HarmonicMinor,
    MelodicMinor,
    Ionian,
    Dorian,
    Phrygian,
    Lydian,
    Mixolydian,
    Aeolian,
    Locrian,
    MixolydianFlat9Flat13,
    LydianSharp9,
    PhrygianDominant,
    LydianSharp5,
    HalfWhole,
    WholeHalf,
    Augmented,
    Altered,
    PentatonicMajor,
    PentatonicMinor,
    Blues,
    Gypsy,
    Japanese,
    Hirajoshi,
    Kumoi,
    Arabic,
}

pub const SCALE_COUNT: usize = 27;

const MAJOR: &[u8] = &[0, 2, 4, 5, 7, 9, 11];
const NATURAL_MINOR: &[u8] = &[0, 2, 3, 5, 7, 8, 10];
const HARMONIC_MINOR: &[u8] = &[0, 2, 3, 5, 7, 8, 11];
const MELODIC_MINOR: &[u8] = &[0, 2, 3, 5, 7, 9, 11];
const DORIAN: &[u8] = &[0, 2, 3, 5, 7, 9, 10];
const PHRYGIAN: &[u8] = &[0, 1, 3, 5, 7, 8, 10];
const LYDIAN: &[u8] = &[0, 2, 4, 6, 7, 9, 11];
const MIXOLYDIAN: &[u8] = &[0, 2, 4, 5, 7, 9, 10];
const LOCRIAN: &[u8] = &[0, 1, 3, 5, 6, 8, 10];
const MIX_B9_B13: &[u8] = &[0, 1, 4, 5, 6, 8, 10];
const LYDIAN_SHARP9: &[u8] = &[0, 2, 3, 6, 7, 9, 11];
const PHRYGIAN_DOMINANT: &[u8] = &[0, 1, 4, 5, 7, 8, 10];
const LYDIAN_SHARP5: &[u8] = &[0, 2, 4, 6, 8, 9, 11];
const HALF_WHOLE: &[u8] = &[0, 1, 3, 4, 6, 7, 9, 10];
const WHOLE_HALF: &[u8] = &[0, 2, 3, 5, 6, 8, 9, 11];
const AUGMENTED: &[u8] = &[0, 1, 4, 5, 8, 9];
const ALTERED: &[u8] = &[0, 1, 3, 4, 6, 8, 10];
const PENTATONIC_MAJOR: &[u8] = &[0, 2, 4, 7, 9];
const PENTATONIC_MINOR: &[u8] = &[0, 3, 5, 7, 10];
const BLUES: &[u8] = &[0, 3, 5, 6, 7, 10];
const GYPSY: &[u8] = &[0, 1, 4, 5, 7, 8, 10];
const JAPANESE: &[u8] = &[0, 1, 5, 7, 8];
const HIRAJOSHI: &[u8] = &[0, 2, 3, 7, 8];
const KUMOI: &[u8] = &[0, 2, 3, 7, 9];
const ARABIC: &[u8] = &[0, 1, 4, 5, 6, 8, 11];

impl ScaleType {
    pub const ALL: [ScaleType; SCALE_COUNT] = [
        ScaleType::Major,
        ScaleType::NaturalMinor,
        ScaleType::HarmonicMinor,
        ScaleType::MelodicMinor,
        ScaleType::Ionian,
        ScaleType::Dorian,
        ScaleType::Phrygian,
        ScaleType::Lydian,
        ScaleType::Mixolydian,
        ScaleType::Aeolian,
        ScaleType::Locrian,
        ScaleType::MixolydianFlat9Flat13,
        ScaleType::LydianSharp9,
        ScaleType::PhrygianDominant,
        ScaleType::LydianSharp5,
        ScaleType::HalfWhole,
        ScaleType::WholeHalf,
        ScaleType::Augmented,
        ScaleType::Altered,
        ScaleType::PentatonicMajor,
        ScaleType::PentatonicMinor,
        ScaleType::Blues,
        ScaleType::Gypsy,
        ScaleType::Japanese,
        ScaleType::Hirajoshi,
        ScaleType::Kumoi,
        ScaleType::Arabic,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn clamped(index: i32) -> Self {
        Self::ALL[index.clamp(0, SCALE_COUNT as i32 - 1) as usize]
    }

    /// Semitone offsets from the tonic, ascending
    pub fn intervals(self) -> &'static [u8] {
        match self {
            ScaleType::Major | ScaleType::Ionian => MAJOR,
            ScaleType::NaturalMinor | ScaleType::Aeolian => NATURAL_MINOR,
            ScaleType::HarmonicMinor => HARMONIC_MINOR,
            ScaleType::MelodicMinor => MELODIC_MINOR,
            ScaleType::Dorian => DORIAN,
            ScaleType::Phrygian => PHRYGIAN,
            ScaleType::Lydian => LYDIAN,
            ScaleType::Mixolydian => MIXOLYDIAN,
            ScaleType::Locrian => LOCRIAN,
            ScaleType::MixolydianFlat9Flat13 => MIX_B9_B13,
            ScaleType::LydianSharp9 => LYDIAN_SHARP9,
            ScaleType::PhrygianDominant => PHRYGIAN_DOMINANT,
            ScaleType::LydianSharp5 => LYDIAN_SHARP5,
            ScaleType::HalfWhole => HALF_WHOLE,
            ScaleType::WholeHalf => WHOLE_HALF,
            ScaleType::Augmented => AUGMENTED,
            ScaleType::Altered => ALTERED,
            ScaleType::PentatonicMajor => PENTATONIC_MAJOR,
            ScaleType::PentatonicMinor => PENTATONIC_MINOR,
            ScaleType::Blues => BLUES,
            ScaleType::Gypsy => GYPSY,
            ScaleType::Japanese => JAPANESE,
            ScaleType::Hirajoshi => HIRAJOSHI,
            ScaleType::Kumoi => KUMOI,
            ScaleType::Arabic => ARABIC,
        }
    }

    pub fn len(self) -> usize {
        self.intervals().len()
    }

    /// Major third above the tonic
    pub fn is_major(self) -> bool {
        self.intervals().contains(&4) && !self.intervals().contains(&3)
    }

    pub fn name(self) -> &'static str {
        match self {
            ScaleType::Major => "Major",
            ScaleType::NaturalMinor => "Natural Minor",
            ScaleType::HarmonicMinor => "Harmonic Minor",
            ScaleType::MelodicMinor => "Melodic Minor",
            ScaleType::Ionian => "Ionian",
            ScaleType::Dorian => "Dorian",
            ScaleType::Phrygian => "Phrygian",
            ScaleType::Lydian => "Lydian",
            ScaleType::Mixolydian => "Mixolydian",
            ScaleType::Aeolian => "Aeolian",
            ScaleType::Locrian => "Locrian",
            ScaleType::MixolydianFlat9Flat13 => "Mixolydian b9 b13",
            ScaleType::LydianSharp9 => "Lydian #9",
            ScaleType::PhrygianDominant => "Phrygian Dominant",
            ScaleType::LydianSharp5 => "Lydian #5",
            ScaleType::HalfWhole => "Half-Whole",
            ScaleType::WholeHalf => "Whole-Half",
            ScaleType::Augmented => "Augmented",
            ScaleType::Altered => "Altered",
            ScaleType::PentatonicMajor => "Pentatonic Major",
            ScaleType::PentatonicMinor => "Pentatonic Minor",
            ScaleType::Blues => "Blues",
            ScaleType::Gypsy => "Gypsy",
            ScaleType::Japanese => "Japanese",
            ScaleType::Hirajoshi => "Hirajoshi",
            ScaleType::Kumoi => "Kumoi",
            ScaleType::Arabic => "Arabic",
        }
    }
}

impl Default for ScaleType {
    fn default() -> Self {
        ScaleType::Major
    }
}
