//! Column-major storage helpers.
//!
//! Callers usually write matrices row by row; native routines want
//! columns. These convert between the two and build identity matrices.

/// Pack a row-of-rows matrix into column-major storage.
///
/// Rows shorter than the first row are padded with zeros; extra elements
/// are ignored.
#[must_use]
pub fn column_major_from_rows(rows: &[&[f64]]) -> Vec<f64> {
    let m = rows.len();
    let n = rows.first().map_or(0, |r| r.len());
    let mut data = vec![0.0; m * n];
    for (i, row) in rows.iter().enumerate() {
        for (j, &value) in row.iter().take(n).enumerate() {
            data[j * m + i] = value;
        }
    }
    data
}

/// Unpack packed column-major storage into rows.
///
/// Missing trailing elements read as zero.
#[must_use]
pub fn rows_from_column_major(data: &[f64], rows: usize, cols: usize) -> Vec<Vec<f64>> {
    (0..rows)
        .map(|i| {
            (0..cols)
                .map(|j| data.get(j * rows + i).copied().unwrap_or(0.0))
                .collect()
        })
        .collect()
}

/// An `order x order` identity stored with column stride `ld`.
///
/// `ld` is raised to `order` if smaller.
#[must_use]
pub fn identity(order: usize, ld: usize) -> Vec<f64> {
    let ld = ld.max(order).max(1);
    let mut data = vec![0.0; ld * order];
    for i in 0..order {
        data[i * ld + i] = 1.0;
    }
    data
}
