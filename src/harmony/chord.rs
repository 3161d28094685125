use super::pitch_class_name;

/// Interval sets above the root, with the quality used in the chord name.
const TEMPLATES: &[(&[u8], &str)] = &[
    (&[0, 4, 7], "major triad"),
    (&[0, 3, 7], "minor triad"),
    (&[0, 3, 6], "diminished triad"),
    (&[0, 4, 8], "augmented triad"),
    (&[0, 2, 7], "suspended-second triad"),
    (&[0, 5, 7], "suspended-fourth triad"),
    (&[0, 4, 7, 10], "dominant seventh chord"),
    (&[0, 4, 7, 11], "major seventh chord"),
    (&[0, 3, 7, 10], "minor seventh chord"),
    (&[0, 3, 7, 11], "minor-major seventh chord"),
    (&[0, 3, 6, 10], "half-diminished seventh chord"),
    (&[0, 3, 6, 9], "diminished seventh chord"),
    (&[0, 4, 8, 11], "augmented major seventh chord"),
    (&[0, 4, 7, 9], "major sixth chord"),
    (&[0, 3, 7, 9], "minor sixth chord"),
    (&[0, 5, 7, 10], "dominant seventh suspended-fourth chord"),
    (&[0, 2, 4, 7, 10], "dominant ninth chord"),
    (&[0, 2, 4, 7, 11], "major ninth chord"),
    (&[0, 2, 3, 7, 10], "minor ninth chord"),
];

const INTERVALS: [&str; 12] = [
    "octave",
    "minor second",
    "major second",
    "minor third",
    "major third",
    "perfect fourth",
    "tritone",
    "perfect fifth",
    "minor sixth",
    "major sixth",
    "minor seventh",
    "major seventh",
];

/// Common name of a set of simultaneous MIDI pitches.
///
/// Roots are tried starting from the bass pitch class, then upwards, and the
/// first root whose interval set matches a template names the chord
/// (`"C-major triad"`). Two pitch classes name the interval above the bass
/// (`"perfect fifth above C"`); anything unmatched lists its pitch classes.
pub fn chord_name(pitches: &[u8]) -> String {
    let mut sorted = pitches.to_vec();
    sorted.sort_unstable();

    // Pitch classes in order of first appearance from the bass up
    let mut classes: Vec<u8> = Vec::new();
    for p in &sorted {
        let pc = p % 12;
        if !classes.contains(&pc) {
            classes.push(pc);
        }
    }

    match classes.len() {
        0 => return String::from("rest"),
        1 => return format!("octave above {}", pitch_class_name(classes[0])),
        2 => {
            let interval = (classes[1] + 12 - classes[0]) % 12;
            return format!(
                "{} above {}",
                INTERVALS[interval as usize],
                pitch_class_name(classes[0])
            );
        }
        _ => {}
    }

    for &root in &classes {
        let mut intervals: Vec<u8> = classes.iter().map(|&pc| (pc + 12 - root) % 12).collect();
        intervals.sort_unstable();

        if let Some((_, quality)) = TEMPLATES.iter().find(|(set, _)| *set == intervals.as_slice()) {
            return format!("{}-{}", pitch_class_name(root), quality);
        }
    }

    let mut ascending = classes.clone();
    ascending.sort_unstable();
    let names: Vec<&str> = ascending.iter().map(|&pc| pitch_class_name(pc)).collect();
    format!("{} pitch-class set", names.join("-"))
}
