// Chord - chord lists with a rotating cursor, voicing and naming

use super::scale::ScaleType;

pub const MAX_CHORDS: usize = 16;
pub const MAX_POLYPHONY: usize = 5;

/// Scale-step offsets of successive voices: root, 3rd, 5th, 7th, 9th...
pub const VOICE_OFFSETS: [u32; 9] = [0, 2, 4, 6, 8, 8, 10, 12, 12];
const FLATTENED: [bool; 9] = [false, false, false, false, false, true, false, false, true];

/// Middle octave reached with octave 0 and tonic C
const BASE_NOTE: i32 = 48;

const NOTE_NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];
const MAJOR_QUALITIES: [&str; 7] = ["M7", "m7", "m7", "M7", "7", "m7", "m7b5"];
const MINOR_QUALITIES: [&str; 7] = ["m7", "m7b5", "M7", "m7", "m7", "M7", "7"];
const EXTENSIONS: [&str; 7] = ["9", "b9", "#9", "11", "#11", "13", "b13"];

/// Ordered scale degrees and the cursor of the next one to sound
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChordList {
    degrees: [u8; MAX_CHORDS],
    len: usize,
    cursor: usize,
}

impl ChordList {
    pub fn new() -> Self {
        Self {
            degrees: [0; MAX_CHORDS],
            len: 0,
            cursor: 0,
        }
    }

    /// Builds from a slice, keeping at most `MAX_CHORDS` entries
    pub fn from_degrees(degrees: &[u8]) -> Self {
        let mut list = Self::new();
        for degree in degrees.iter().take(MAX_CHORDS) {
            list.push(*degree);
        }
        list
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len >= MAX_CHORDS
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.degrees[..self.len]
    }

    pub fn get(&self, index: usize) -> Option<u8> {
        self.as_slice().get(index).copied()
    }

    /// Degree under the cursor, advancing the cursor with wrap
    pub fn next_degree(&mut self) -> Option<u8> {
        if self.len == 0 {
            return None;
        }
        let degree = self.degrees[self.cursor % self.len];
        self.cursor = (self.cursor + 1) % self.len;
        Some(degree)
    }

    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    /// Append; ignored when full
    pub fn push(&mut self, degree: u8) -> bool {
        if self.is_full() {
            return false;
        }
        self.degrees[self.len] = degree;
        self.len += 1;
        true
    }

    pub fn pop(&mut self) -> Option<u8> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        self.fix_cursor();
        Some(self.degrees[self.len])
    }

    pub fn set(&mut self, index: usize, degree: u8) -> bool {
        if index >= self.len {
            return false;
        }
        self.degrees[index] = degree;
        true
    }

    /// Insert at `index`, clamped to the current length
    pub fn insert(&mut self, index: usize, degree: u8) -> bool {
        if self.is_full() {
            return false;
        }
        let index = index.min(self.len);
        self.degrees.copy_within(index..self.len, index + 1);
        self.degrees[index] = degree;
        self.len += 1;
        true
    }

    pub fn remove(&mut self, index: usize) -> Option<u8> {
        if index >= self.len {
            return None;
        }
        let degree = self.degrees[index];
        self.degrees.copy_within(index + 1..self.len, index);
        self.len -= 1;
        self.fix_cursor();
        Some(degree)
    }

    /// Swap with the neighbour in direction `dir` (-1 or +1)
    pub fn move_item(&mut self, index: usize, dir: i32) -> bool {
        let target = index as i64 + dir.signum() as i64;
        if index >= self.len || dir == 0 || target < 0 || target >= self.len as i64 {
            return false;
        }
        self.degrees.swap(index, target as usize);
        true
    }

    /// Slot present: remove it. Slot missing: insert degree 0 there.
    pub fn toggle_slot(&mut self, index: usize) {
        if index < self.len {
            self.remove(index);
        } else {
            self.insert(index, 0);
        }
    }

    /// Grow with `(last + 1) % 7`, shrink from the end
    pub fn resize(&mut self, count: usize) {
        let count = count.min(MAX_CHORDS);
        while self.len > count {
            self.pop();
        }
        while self.len < count {
            let next = match self.len {
                0 => 0,
                n => (self.degrees[n - 1] + 1) % 7,
            };
            self.push(next);
        }
    }

    fn fix_cursor(&mut self) {
        if self.len == 0 {
            self.cursor = 0;
        } else if self.cursor >= self.len {
            self.cursor %= self.len;
        }
    }
}

impl Default for ChordList {
    fn default() -> Self {
        Self::from_degrees(&[0])
    }
}

/// Pitch of a scale degree: degrees past the scale length climb octaves
pub fn scale_degree_to_midi(tonic: u8, scale: ScaleType, octave: i8, degree: u32) -> u8 {
    let intervals = scale.intervals();
    let len = intervals.len() as u32;
    let cycles = (degree / len) as i32;
    let idx = (degree % len) as usize;
    let pitch = tonic as i32 + intervals[idx] as i32 + (cycles + octave as i32) * 12 + BASE_NOTE;
    pitch.clamp(0, 127) as u8
}

/// Up to `MAX_POLYPHONY` notes of one chord
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Voicing {
    notes: [u8; MAX_POLYPHONY],
    len: usize,
}

impl Voicing {
    pub fn notes(&self) -> &[u8] {
        &self.notes[..self.len]
    }

    pub fn root(&self) -> u8 {
        self.notes[0]
    }
}

/// Stack `polyphony` voices on `degree`
pub fn voice_chord(tonic: u8, scale: ScaleType, octave: i8, degree: u8, polyphony: u8) -> Voicing {
    let count = (polyphony as usize).clamp(1, MAX_POLYPHONY);
    let mut notes = [0u8; MAX_POLYPHONY];
    for (voice, note) in notes.iter_mut().enumerate().take(count) {
        let pitch = scale_degree_to_midi(tonic, scale, octave, degree as u32 + VOICE_OFFSETS[voice]);
        *note = if FLATTENED[voice] {
            pitch.saturating_sub(1)
        } else {
            pitch
        };
    }
    Voicing { notes, len: count }
}

/// Display name such as `Dm7` or `CM7 9`
pub fn chord_name(tonic: u8, scale: ScaleType, degree: u8, polyphony: u8) -> String {
    let degree = degree as usize % scale.len();
    let root = scale_degree_to_midi(tonic, scale, 0, degree as u32) % 12;
    let qualities = if scale.is_major() {
        &MAJOR_QUALITIES
    } else {
        &MINOR_QUALITIES
    };
    let base = format!("{}{}", NOTE_NAMES[root as usize], qualities[degree % 7]);

    let extra = (polyphony as usize).saturating_sub(4).min(EXTENSIONS.len());
    if extra == 0 {
        return base;
    }
    format!("{} {}", base, EXTENSIONS[..extra].join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_cycles_every_degree() {
        let mut list = ChordList::from_degrees(&[0, 3, 4, 5]);
        let first: Vec<_> = (0..4).filter_map(|_| list.next_degree()).collect();
        assert_eq!(first, vec![0, 3, 4, 5]);
        assert_eq!(list.next_degree(), Some(0));
    }

    #[test]
    fn test_empty_list_has_no_degree() {
        let mut list = ChordList::new();
        assert_eq!(list.next_degree(), None);
        assert!(list.pop().is_none());
    }

    #[test]
    fn test_capacity() {
        let mut list = ChordList::new();
        for i in 0..20 {
            list.push(i % 7);
        }
        assert_eq!(list.len(), MAX_CHORDS);
        assert!(!list.insert(0, 1));
    }

    #[test]
    fn test_insert_remove_move() {
        let mut list = ChordList::from_degrees(&[0, 1, 2]);
        list.insert(99, 6);
        assert_eq!(list.as_slice(), &[0, 1, 2, 6]);
        list.insert(1, 5);
        assert_eq!(list.as_slice(), &[0, 5, 1, 2, 6]);
        assert_eq!(list.remove(0), Some(0));
        assert_eq!(list.as_slice(), &[5, 1, 2, 6]);
        assert!(list.move_item(0, 1));
        assert_eq!(list.as_slice(), &[1, 5, 2, 6]);
        assert!(!list.move_item(0, -1));
        assert!(!list.move_item(3, 1));
    }

    #[test]
    fn test_cursor_stays_in_range() {
        let mut list = ChordList::from_degrees(&[0, 1, 2, 3]);
        list.next_degree();
        list.next_degree();
        list.next_degree();
        assert_eq!(list.cursor(), 3);
        list.pop();
        assert!(list.cursor() < list.len());
        list.resize(0);
        assert_eq!(list.cursor(), 0);
    }

    #[test]
    fn test_toggle_and_resize() {
        let mut list = ChordList::from_degrees(&[2]);
        list.toggle_slot(3);
        assert_eq!(list.as_slice(), &[2, 0]);
        list.toggle_slot(0);
        assert_eq!(list.as_slice(), &[0]);

        list.resize(4);
        assert_eq!(list.as_slice(), &[0, 1, 2, 3]);
        let mut wrap = ChordList::from_degrees(&[6]);
        wrap.resize(2);
        assert_eq!(wrap.as_slice(), &[6, 0]);
        list.resize(2);
        assert_eq!(list.as_slice(), &[0, 1]);
    }

    #[test]
    fn test_degree_to_midi() {
        assert_eq!(scale_degree_to_midi(0, ScaleType::Major, 0, 0), 48);
        assert_eq!(scale_degree_to_midi(0, ScaleType::Major, 0, 2), 52);
        // Past the scale length climbs one octave
        assert_eq!(scale_degree_to_midi(0, ScaleType::Major, 0, 7), 60);
        assert_eq!(scale_degree_to_midi(2, ScaleType::Major, -1, 0), 38);
        assert_eq!(scale_degree_to_midi(11, ScaleType::Major, 2, 40), 127);
    }

    #[test]
    fn test_triad_and_seventh() {
        let triad = voice_chord(0, ScaleType::Major, 0, 0, 3);
        assert_eq!(triad.notes(), &[48, 52, 55]);
        let seventh = voice_chord(0, ScaleType::Major, 0, 1, 4);
        assert_eq!(seventh.notes(), &[50, 53, 57, 60]);
        assert_eq!(seventh.root(), 50);
    }

    #[test]
    fn test_polyphony_clamped() {
        assert_eq!(voice_chord(0, ScaleType::Major, 0, 0, 0).notes().len(), 1);
        let full = voice_chord(0, ScaleType::Major, 0, 0, 9);
        assert_eq!(full.notes(), &[48, 52, 55, 59, 62]);
    }

    #[test]
    fn test_names() {
        assert_eq!(chord_name(0, ScaleType::Major, 0, 3), "CM7");
        assert_eq!(chord_name(0, ScaleType::Major, 1, 4), "Dm7");
        assert_eq!(chord_name(9, ScaleType::NaturalMinor, 0, 5), "Am7 9");
        assert_eq!(chord_name(0, ScaleType::Major, 4, 1), "G7");
    }
}
