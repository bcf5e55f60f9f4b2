const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Nearest equal-tempered MIDI note number (A4 = 440 Hz = 69).
pub fn midi_note(hz: f64) -> Option<i32> {
    if !hz.is_finite() || hz <= 0.0 {
        return None;
    }
    Some((12.0 * (hz / 440.0).log2()).round() as i32 + 69)
}

/// Scientific pitch name of the nearest note, e.g. `"A4"` or `"C#5"`.
pub fn note_name(hz: f64) -> Option<String> {
    let n = midi_note(hz)?;
    let name = NOTE_NAMES[n.rem_euclid(12) as usize];
    let octave = n.div_euclid(12) - 1;
    Some(format!("{}{}", name, octave))
}
