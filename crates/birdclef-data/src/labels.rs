//! One-hot кодирование меток видов.

use tracing::warn;

/// Label binarizer with a fixed, sorted vocabulary.
///
/// Column order of the one-hot rows is the sort order of the labels.
/// Unknown labels produce an all-zero row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelBinarizer {
    classes: Vec<String>,
}

impl LabelBinarizer {
    /// Построить словарь из произвольной последовательности меток (дубликаты допустимы).
    pub fn fit<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut classes: Vec<String> = labels
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect();
        classes.sort();
        classes.dedup();
        Self { classes }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    /// Column of `label`, if it is in the vocabulary.
    pub fn position(&self, label: &str) -> Option<usize> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(label))
            .ok()
    }

    /// One-hot строка для метки.
    pub fn transform_one(&self, label: &str) -> Vec<f32> {
        let mut row = vec![0.0; self.classes.len()];
        if let Some(pos) = self.position(label) {
            row[pos] = 1.0;
        }
        row
    }

    /// One-hot матрица `[rows][classes]`.
    pub fn transform<S: AsRef<str>>(&self, labels: &[S]) -> Vec<Vec<f32>> {
        labels
            .iter()
            .map(|l| self.transform_one(l.as_ref()))
            .collect()
    }

    /// Индексы классов через argmax one-hot строк.
    ///
    /// Метки вне словаря дают нулевую строку и, как у argmax, индекс 0.
    pub fn encode<S: AsRef<str>>(&self, labels: &[S]) -> Vec<u32> {
        let rows = self.transform(labels);
        let unknown = labels
            .iter()
            .filter(|l| self.position(l.as_ref()).is_none())
            .count();
        if unknown > 0 {
            warn!(
                "{} of {} labels are not in the class vocabulary, encoded as class 0",
                unknown,
                labels.len()
            );
        }
        rows.iter().map(|row| argmax(row) as u32).collect()
    }
}

/// Первый индекс максимума; для пустой или нулевой строки — 0.
pub fn argmax(row: &[f32]) -> usize {
    let mut best = 0;
    for (i, &v) in row.iter().enumerate() {
        if v > row[best] {
            best = i;
        }
    }
    best
}
