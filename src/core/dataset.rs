//! A labeled, real-valued sample collection. The `Dataset` is immutable
//! after loading and is shared by reference among every tree bound to it.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::core::MAX_LABELS;
use crate::error::{Error, Result};

/// A supervised classification dataset: `size` samples over `space_size`
/// real features, each sample carrying one label.
///
/// Labels are interned in first-seen order; samples refer to them by
/// index. For every feature the dataset also keeps its *projection*: the
/// sorted list of distinct values observed in that column, used as the
/// candidate grid for split thresholds.
#[derive(Debug)]
pub struct Dataset {
    space_size: usize,
    points: Vec<f64>,
    labels: Vec<String>,
    label_lookup: Vec<usize>,
    projections: Vec<Vec<f64>>,
}

impl Dataset {
    /// Reads a dataset from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::missing_file(path, e))?;
        Self::read(BufReader::new(file))
    }

    /// Reads a dataset in the textual format:
    ///
    /// ```text
    /// # <rows> <cols>
    /// <label>,<x0>,<x1>,...
    /// ```
    ///
    /// The header may also be `# <format> <rows> <cols>`; `0` (CSV) is the
    /// only supported format.
    pub fn read<R: BufRead>(mut reader: R) -> Result<Self> {
        let (rows, cols) = parse_header(&mut reader)?;

        let mut dataset = Dataset {
            space_size: cols,
            points: Vec::with_capacity(rows * cols),
            labels: Vec::new(),
            label_lookup: Vec::with_capacity(rows),
            projections: vec![Vec::new(); cols],
        };

        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        for record in csv_reader.records() {
            let record = record.map_err(|e| Error::MalformedInput(format!("bad sample row: {e}")))?;
            if record.len() == 1 && record[0].is_empty() {
                continue;
            }
            if record.len() != cols + 1 {
                return Err(Error::MalformedInput(format!(
                    "sample row {} has {} fields, expected {}",
                    dataset.label_lookup.len() + 1,
                    record.len(),
                    cols + 1
                )));
            }

            let label = dataset.intern_label(&record[0])?;
            dataset.label_lookup.push(label);
            for field in record.iter().skip(1) {
                let value: f64 = field.parse().map_err(|_| {
                    Error::MalformedInput(format!("cannot parse feature value \"{field}\""))
                })?;
                dataset.points.push(value);
            }

            if dataset.label_lookup.len() == rows {
                break;
            }
        }

        if dataset.label_lookup.len() != rows {
            return Err(Error::MalformedInput(format!(
                "header declares {} samples, found {}",
                rows,
                dataset.label_lookup.len()
            )));
        }

        dataset.compute_projections();
        Ok(dataset)
    }

    /// Interns `label`, returning its index in first-seen order.
    fn intern_label(&mut self, label: &str) -> Result<usize> {
        if label.is_empty() {
            return Err(Error::MalformedInput("empty label token".to_string()));
        }
        if let Some(index) = self.labels.iter().position(|l| l == label) {
            return Ok(index);
        }
        if self.labels.len() == MAX_LABELS {
            return Err(Error::MalformedInput(format!(
                "more than {MAX_LABELS} distinct labels"
            )));
        }
        self.labels.push(label.to_string());
        Ok(self.labels.len() - 1)
    }

    /// Fills `projections` with the sorted distinct values of each column.
    fn compute_projections(&mut self) {
        for feature in 0..self.space_size {
            let mut values: Vec<f64> = (0..self.size()).map(|i| self.value(i, feature)).collect();
            values.sort_by(f64::total_cmp);
            values.dedup();
            self.projections[feature] = values;
        }
    }

    /// The number of samples.
    pub fn size(&self) -> usize {
        self.label_lookup.len()
    }

    /// The number of features.
    pub fn space_size(&self) -> usize {
        self.space_size
    }

    /// The number of distinct labels.
    pub fn n_labels(&self) -> usize {
        self.labels.len()
    }

    /// The label names in interning order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// The coordinates of the indexed sample.
    pub fn point(&self, sample: usize) -> &[f64] {
        &self.points[sample * self.space_size..(sample + 1) * self.space_size]
    }

    /// One coordinate of the indexed sample.
    pub fn value(&self, sample: usize, feature: usize) -> f64 {
        self.points[sample * self.space_size + feature]
    }

    /// The label index of the indexed sample.
    pub fn label_of(&self, sample: usize) -> usize {
        self.label_lookup[sample]
    }

    /// The sorted distinct values observed on `feature`.
    pub fn projection(&self, feature: usize) -> &[f64] {
        &self.projections[feature]
    }
}

impl std::fmt::Display for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "Dataset in R^{}, contains {} samples and {} labels: {{{}}}",
            self.space_size,
            self.size(),
            self.n_labels(),
            self.labels.join(" ")
        )
    }
}

/// Parses the `# <rows> <cols>` or `# <format> <rows> <cols>` header line.
fn parse_header<R: BufRead>(reader: &mut R) -> Result<(usize, usize)> {
    let mut line = String::new();
    reader
        .read_line(&mut line)
        .map_err(|e| Error::MalformedInput(format!("cannot read header: {e}")))?;

    let mut tokens = line.split_whitespace();
    if tokens.next() != Some("#") {
        return Err(Error::MalformedInput("cannot parse header".to_string()));
    }

    let numbers: Vec<usize> = tokens
        .map(|t| {
            t.parse()
                .map_err(|_| Error::MalformedInput(format!("bad header token \"{t}\"")))
        })
        .collect::<Result<_>>()?;

    match numbers[..] {
        [rows, cols] => Ok((rows, cols)),
        [0, rows, cols] => Ok((rows, cols)),
        [format, _, _] => Err(Error::MalformedInput(format!(
            "unsupported dataset format {format}"
        ))),
        _ => Err(Error::MalformedInput("cannot parse header".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use float_cmp::approx_eq;

    use super::*;

    #[test]
    fn test_read() {
        let data = Dataset::read("# 4 2\nA,0,5\nA,1,5\nB,2,7\nB,3,5\n".as_bytes()).unwrap();

        assert_eq!(data.size(), 4);
        assert_eq!(data.space_size(), 2);
        assert_eq!(data.n_labels(), 2);
        assert_eq!(data.labels(), &["A".to_string(), "B".to_string()]);
        assert_eq!(data.label_of(2), 1);
        assert!(approx_eq!(f64, data.value(2, 1), 7.0));
        assert_eq!(data.point(3), &[3.0, 5.0]);
    }

    #[test]
    fn test_read_with_format_header() {
        let data = Dataset::read("# 0 2 1\nA,1\nB,2\n".as_bytes()).unwrap();
        assert_eq!(data.size(), 2);
        assert_eq!(data.space_size(), 1);
    }

    #[test]
    fn test_projections_sorted_unique() {
        let data = Dataset::read("# 4 2\nA,3,5\nA,1,5\nB,1,7\nB,2,5\n".as_bytes()).unwrap();
        assert_eq!(data.projection(0), &[1.0, 2.0, 3.0]);
        assert_eq!(data.projection(1), &[5.0, 7.0]);
    }

    #[test]
    fn test_rejects_unsupported_format() {
        assert!(Dataset::read("# 1 2 1\nA,1\nB,2\n".as_bytes()).is_err());
    }

    #[test]
    fn test_rejects_bad_header() {
        assert!(Dataset::read("4 2\nA,0,5\n".as_bytes()).is_err());
    }

    #[test]
    fn test_rejects_short_row() {
        assert!(Dataset::read("# 2 2\nA,0,5\nB,1\n".as_bytes()).is_err());
    }

    #[test]
    fn test_rejects_missing_rows() {
        assert!(Dataset::read("# 3 1\nA,0\nB,1\n".as_bytes()).is_err());
    }
}
