use std::collections::{HashMap, HashSet};

use crate::CellValue;

/// Make column labels unique.
///
/// The first occurrence of a label is kept as-is; the 2nd, 3rd, … occurrences get `_2`, `_3`, …
/// appended. If a generated label would collide with another label in the input (or one already
/// generated), the suffix keeps counting up until it is free, so the output is always unique and
/// always the same for the same input.
pub fn dedupe_labels<S: AsRef<str>>(labels: &[S]) -> Vec<String> {
    let originals: HashSet<&str> = labels.iter().map(AsRef::as_ref).collect();
    let mut emitted: HashSet<String> = HashSet::with_capacity(labels.len());
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut out = Vec::with_capacity(labels.len());

    for label in labels {
        let label = label.as_ref();
        let count = counts.entry(label).or_insert(0);
        *count += 1;

        if *count == 1 && !emitted.contains(label) {
            emitted.insert(label.to_string());
            out.push(label.to_string());
            continue;
        }

        let mut suffix = (*count).max(2);
        let candidate = loop {
            let candidate = format!("{label}_{suffix}");
            if !emitted.contains(&candidate) && !originals.contains(candidate.as_str()) {
                break candidate;
            }
            suffix += 1;
        };
        *count = suffix;
        emitted.insert(candidate.clone());
        out.push(candidate);
    }

    out
}

/// Derive column labels from a header row.
///
/// Blank header cells are named `Column N` (1-based) before de-duplication.
pub fn header_labels(header: &[CellValue]) -> Vec<String> {
    let raw: Vec<String> = header
        .iter()
        .enumerate()
        .map(|(idx, cell)| {
            let text = cell.to_string();
            let text = text.trim();
            if text.is_empty() {
                format!("Column {}", idx + 1)
            } else {
                text.to_string()
            }
        })
        .collect();
    dedupe_labels(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn numbers_repeated_labels_from_two() {
        assert_eq!(
            dedupe_labels(&["A", "B", "A", "A"]),
            vec!["A", "B", "A_2", "A_3"]
        );
    }

    #[test]
    fn leaves_unique_labels_untouched() {
        assert_eq!(dedupe_labels(&["Name", "Dose", "Route"]), vec!["Name", "Dose", "Route"]);
    }

    #[test]
    fn skips_suffixes_already_used_by_other_labels() {
        assert_eq!(dedupe_labels(&["A", "A", "A_2"]), vec!["A", "A_3", "A_2"]);
    }

    #[test]
    fn blank_header_cells_get_positional_names() {
        let header = vec![
            CellValue::Text("kVp".into()),
            CellValue::Empty,
            CellValue::Number(120.0),
            CellValue::Text(" ".into()),
        ];
        assert_eq!(header_labels(&header), vec!["kVp", "Column 2", "120", "Column 4"]);
    }

    proptest! {
        #[test]
        fn output_is_unique_and_keeps_first_occurrences(
            labels in prop::collection::vec("[AB_2]{1,3}", 0..12)
        ) {
            let out = dedupe_labels(&labels);
            prop_assert_eq!(out.len(), labels.len());

            let unique: HashSet<&String> = out.iter().collect();
            prop_assert_eq!(unique.len(), out.len());

            let mut seen = HashSet::new();
            for (input, output) in labels.iter().zip(&out) {
                if seen.insert(input.clone()) {
                    prop_assert_eq!(input, output);
                }
            }
        }
    }
}
