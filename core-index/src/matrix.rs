//! Row-major embedding matrix.
//!
//! Row `i` is the embedding of the `i`-th record of the aligned snapshot.

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};
use crate::flat_index::FlatL2Index;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingMatrix {
    dimension: usize,
    rows: usize,
    data: Vec<f32>,
}

impl EmbeddingMatrix {
    /// Stacks `rows` into a matrix. Every row must have the length of the first.
    pub fn from_rows<'a, I>(rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a [f32]>,
    {
        let mut dimension = None;
        let mut count = 0;
        let mut data = Vec::new();

        for row in rows {
            let expected = *dimension.get_or_insert(row.len());
            if expected == 0 {
                return Err(IndexError::ZeroDimension);
            }
            if row.len() != expected {
                return Err(IndexError::DimensionMismatch {
                    expected,
                    found: row.len(),
                });
            }
            data.extend_from_slice(row);
            count += 1;
        }

        Ok(Self {
            dimension: dimension.unwrap_or(0),
            rows: count,
            data,
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn row(&self, index: usize) -> Option<&[f32]> {
        if index >= self.rows {
            return None;
        }
        let start = index * self.dimension;
        self.data.get(start..start + self.dimension)
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[f32]> {
        (0..self.rows).filter_map(move |i| self.row(i))
    }

    /// Shape check after deserialization.
    pub fn is_well_formed(&self) -> bool {
        self.data.len() == self.rows * self.dimension && (self.rows == 0 || self.dimension > 0)
    }

    /// Builds a fresh index with one entry per row, in row order.
    pub fn to_index(&self) -> Result<FlatL2Index> {
        let mut index = FlatL2Index::new(self.dimension)?;
        for row in self.iter_rows() {
            index.add(row)?;
        }
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rows() {
        let a = [1.0, 2.0];
        let b = [3.0, 4.0];
        let matrix = EmbeddingMatrix::from_rows([&a[..], &b[..]]).unwrap();

        assert_eq!(matrix.rows(), 2);
        assert_eq!(matrix.dimension(), 2);
        assert_eq!(matrix.row(1), Some(&b[..]));
        assert_eq!(matrix.row(2), None);
        assert!(matrix.is_well_formed());
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let a = [1.0, 2.0];
        let b = [3.0];
        assert!(matches!(
            EmbeddingMatrix::from_rows([&a[..], &b[..]]),
            Err(IndexError::DimensionMismatch { expected: 2, found: 1 })
        ));
    }

    #[test]
    fn test_to_index_keeps_row_order() {
        let rows = [[0.0, 1.0], [1.0, 0.0], [5.0, 5.0]];
        let matrix = EmbeddingMatrix::from_rows(rows.iter().map(|r| &r[..])).unwrap();
        let index = matrix.to_index().unwrap();

        assert_eq!(index.len(), 3);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(index.vector(i), Some(&row[..]));
        }
    }

    #[test]
    fn test_empty() {
        let matrix = EmbeddingMatrix::from_rows(std::iter::empty::<&[f32]>()).unwrap();
        assert!(matrix.is_empty());
        assert!(matrix.is_well_formed());
        assert!(matches!(matrix.to_index(), Err(IndexError::ZeroDimension)));
    }
}
