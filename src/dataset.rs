//! Loading and preparing labelled datasets.
//!
//! A dataset is a header-less CSV file where every line holds a fixed number of numeric
//! features followed by an integer class label.

use std::{fs::File, io, ops::RangeInclusive, path::Path};

use tracing::debug;

use crate::{Error, Labels, Result, Samples};

/// Reads a dataset from a CSV file. See [`read_csv`].
pub fn load_csv(path: impl AsRef<Path>, n_features: usize) -> Result<(Samples, Labels)> {
    let path = path.as_ref();
    let file = File::open(path).map_err(csv::Error::from)?;
    let (samples, labels) = read_csv(file, n_features)?;
    debug!(path = %path.display(), n_samples = samples.len(), n_features, "loaded dataset");
    Ok((samples, labels))
}

/// Reads `n_features` leading fields of every record as features and the next one as the
/// label. Fields after the label are ignored.
///
/// Fails on the first record that is too short or holds a value that does not parse.
pub fn read_csv(reader: impl io::Read, n_features: usize) -> Result<(Samples, Labels)> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut samples = Samples::new();
    let mut labels = Labels::new();
    for record in reader.records() {
        let record = record?;
        let line = record.position().map_or(0, |position| position.line());
        if record.len() <= n_features {
            return Err(Error::MalformedData(format!(
                "line {line}: expected at least {} fields, found {}",
                n_features + 1,
                record.len()
            )));
        }
        let sample = record
            .iter()
            .take(n_features)
            .map(|field| {
                field.parse::<f32>().map_err(|_| {
                    Error::MalformedData(format!("line {line}: invalid feature {field:?}"))
                })
            })
            .collect::<Result<_>>()?;
        samples.push(sample);
        labels.push(parse_label(&record[n_features], line)?);
    }
    Ok((samples, labels))
}

/// Labels are usually written as integers, but `2.0` is accepted as well.
fn parse_label(field: &str, line: u64) -> Result<usize> {
    if let Ok(label) = field.parse::<usize>() {
        return Ok(label);
    }
    match field.parse::<f32>() {
        // `usize::MAX as f32` rounds up to 2^64, which itself does not fit.
        Ok(x) if x >= 0.0 && x.fract() == 0.0 && x < usize::MAX as f32 => Ok(x as usize),
        _ => Err(Error::MalformedData(format!(
            "line {line}: invalid label {field:?}"
        ))),
    }
}

/// Number of classes implied by `labels`: the highest label plus one.
pub fn n_classes(labels: &[usize]) -> Result<usize> {
    let Some(&max) = labels.iter().max() else {
        return Err(Error::InvalidInput(
            "cannot infer the number of classes of an empty dataset".to_owned(),
        ));
    };
    max.checked_add(1)
        .ok_or_else(|| Error::InvalidInput(format!("label {max} too high")))
}

/// Min-max normalization of every column into `range`.
///
/// A column holding a single distinct value maps to the start of `range`.
pub fn normalize(samples: &mut [Vec<f32>], range: RangeInclusive<f32>) -> Result<()> {
    let Some(n_columns) = samples.first().map(Vec::len) else {
        return Ok(());
    };
    if let Some(row) = samples.iter().find(|row| row.len() != n_columns) {
        return Err(Error::dimension_mismatch("row length", n_columns, row.len()));
    }

    let mut min = vec![f32::INFINITY; n_columns];
    let mut max = vec![f32::NEG_INFINITY; n_columns];
    for row in samples.iter() {
        for (c, &x) in row.iter().enumerate() {
            min[c] = min[c].min(x);
            max[c] = max[c].max(x);
        }
    }

    let (a, b) = range.into_inner();
    for row in samples.iter_mut() {
        for (c, x) in row.iter_mut().enumerate() {
            let span = max[c] - min[c];
            *x = match span > 0.0 {
                true => a + (b - a) * (*x - min[c]) / span,
                false => a,
            };
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn reads_features_then_label() {
        let data = "5.1,3.5,1.4,0.2,0\n7.0, 3.2, 4.7, 1.4, 1\n\n6.3,3.3,6.0,2.5,2.0\n";
        let (samples, labels) = read_csv(data.as_bytes(), 4).unwrap();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[1], vec![7.0, 3.2, 4.7, 1.4]);
        assert_eq!(labels, vec![0, 1, 2]);
    }

    #[test]
    fn extra_fields_are_ignored() {
        let (samples, labels) = read_csv("1,2,3,extra\n".as_bytes(), 2).unwrap();
        assert_eq!(samples, vec![vec![1.0, 2.0]]);
        assert_eq!(labels, vec![3]);
    }

    #[test]
    fn short_line_fails_whole_load() {
        let data = "1,2,0\n1,2\n3,4,1\n";
        match read_csv(data.as_bytes(), 2) {
            Err(Error::MalformedData(reason)) => assert!(reason.contains("line 2"), "{reason}"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn bad_values_fail() {
        assert!(matches!(
            read_csv("1,x,0\n".as_bytes(), 2),
            Err(Error::MalformedData(_))
        ));
        assert!(matches!(
            read_csv("1,2,-1\n".as_bytes(), 2),
            Err(Error::MalformedData(_))
        ));
        assert!(matches!(
            read_csv("1,2,0.5\n".as_bytes(), 2),
            Err(Error::MalformedData(_))
        ));
    }

    #[test]
    fn huge_labels_are_rejected() {
        for label in ["1e30", "18446744073709551616.0", "inf"] {
            let data = format!("0.1,0.2,0\n0.5,0.6,{label}\n");
            match read_csv(data.as_bytes(), 2) {
                Err(Error::MalformedData(reason)) => assert!(reason.contains("line 2"), "{reason}"),
                other => panic!("{label}: unexpected {other:?}"),
            }
        }
        let (_, labels) = read_csv("0.1,0.2,1e3\n".as_bytes(), 2).unwrap();
        assert_eq!(labels, vec![1000]);
    }

    #[test]
    fn n_classes_is_highest_label_plus_one() {
        assert_eq!(n_classes(&[0, 2, 1]).unwrap(), 3);
        assert_eq!(n_classes(&[0]).unwrap(), 1);
        assert!(matches!(n_classes(&[]), Err(Error::InvalidInput(_))));

        // An integer label parses to `usize::MAX` without complaint.
        let (_, labels) = read_csv("0.1,0.2,18446744073709551615\n".as_bytes(), 2).unwrap();
        assert_eq!(labels, vec![usize::MAX]);
        assert!(matches!(n_classes(&labels), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(matches!(
            load_csv("/nonexistent/dataset.csv", 4),
            Err(Error::Csv(_))
        ));
    }

    #[test]
    fn normalize_rescales_columns() {
        let mut samples = vec![vec![1.0, -4.0], vec![3.0, 0.0], vec![2.0, -2.0]];
        normalize(&mut samples, 0.0..=1.0).unwrap();
        assert_eq!(samples, vec![vec![0.0, 0.0], vec![1.0, 1.0], vec![0.5, 0.5]]);

        normalize(&mut samples, -1.0..=1.0).unwrap();
        assert_abs_diff_eq!(samples[0][0], -1.0);
        assert_abs_diff_eq!(samples[1][1], 1.0);
        assert_abs_diff_eq!(samples[2][0], 0.0);
    }

    #[test]
    fn constant_column_maps_to_range_start() {
        let mut samples = vec![vec![5.0, 1.0], vec![5.0, 2.0]];
        normalize(&mut samples, 0.25..=1.0).unwrap();
        assert_eq!(samples, vec![vec![0.25, 0.25], vec![0.25, 1.0]]);
    }

    #[test]
    fn normalize_edge_cases() {
        let mut empty: Vec<Vec<f32>> = Vec::new();
        normalize(&mut empty, 0.0..=1.0).unwrap();
        let mut ragged = vec![vec![1.0, 2.0], vec![1.0]];
        assert!(matches!(
            normalize(&mut ragged, 0.0..=1.0),
            Err(Error::DimensionMismatch(_))
        ));
    }
}
