//! Pure transformations over scalars and numeric arrays.
//!
//! Every function here is side-effect free: loading and saving live in
//! [`super::loaders`] and [`super::writers`]. Degenerate input (constant
//! arrays, empty arrays, NaN) is reported as a [`TransformError`] instead of
//! being carried through as NaN or infinity.

use ndarray::{ArrayD, Axis};
use thiserror::Error;

/// Errors raised by array and scalar transforms.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("cannot transform an empty array")]
    EmptyArray,

    #[error("array contains NaN or infinite values")]
    NonFinite,

    #[error("array is constant (every element is {value}), standard deviation is zero")]
    ZeroVariance { value: f64 },

    #[error("array is constant (every element is {value}), range is zero")]
    ZeroRange { value: f64 },

    #[error("values between {min} and {max} overflow f64 arithmetic")]
    FloatOverflow { min: f64, max: f64 },

    #[error("invalid target interval [{min_val}, {max_val}]: bounds must be finite with min_val < max_val and a finite span")]
    InvalidBounds { min_val: f64, max_val: f64 },

    #[error("{value} squared overflows a 64-bit integer")]
    Overflow { value: i64 },

    #[error("no arrays to stack")]
    NothingToStack,

    #[error("array {index} has shape {found:?}, expected {expected:?}")]
    ShapeMismatch {
        index: usize,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("stacking failed: {0}")]
    Stack(#[from] ndarray::ShapeError),
}

/// Result type for transform operations.
pub type Result<T> = std::result::Result<T, TransformError>;

/// Square an integer.
pub fn square(value: i64) -> Result<i64> {
    value
        .checked_mul(value)
        .ok_or(TransformError::Overflow { value })
}

/// Text printed by the `square` command.
pub fn square_message(value: i64) -> Result<String> {
    let squared = square(value)?;
    Ok(format!("Square of {value} is {squared}."))
}

/// Text printed by the `greet` command.
pub fn greeting(name: &str) -> String {
    format!("Hello, {name}!")
}

/// Minimum and maximum of a non-empty, finite array.
fn finite_extent(data: &ArrayD<f64>) -> Result<(f64, f64)> {
    if data.is_empty() {
        return Err(TransformError::EmptyArray);
    }
    if data.iter().any(|v| !v.is_finite()) {
        return Err(TransformError::NonFinite);
    }

    let (min, max) = data
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    Ok((min, max))
}

/// Standardize to zero mean and unit variance.
///
/// Uses the whole-array mean and the population standard deviation
/// (`ddof = 0`). The output has the input's shape.
///
/// # Errors
///
/// Fails on empty arrays, non-finite values, and constant arrays.
///
/// # Example
///
/// ```
/// use ndarray::arr1;
/// use trial_pipeline::core::transforms::standardize;
///
/// let z = standardize(&arr1(&[1.0, 3.0]).into_dyn()).unwrap();
/// assert_eq!(z.as_slice().unwrap(), &[-1.0, 1.0]);
/// ```
pub fn standardize(data: &ArrayD<f64>) -> Result<ArrayD<f64>> {
    let (min, max) = finite_extent(data)?;
    if min == max {
        return Err(TransformError::ZeroVariance { value: min });
    }

    let mean = data.mean().ok_or(TransformError::EmptyArray)?;
    let std = data.std(0.0);
    if !mean.is_finite() || !std.is_finite() {
        return Err(TransformError::FloatOverflow { min, max });
    }
    if std == 0.0 {
        return Err(TransformError::ZeroVariance { value: mean });
    }

    Ok(data.mapv(|x| (x - mean) / std))
}

/// Rescale the whole array into `[0, 1]` with `(x - min) / (max - min)`.
///
/// # Errors
///
/// Fails on empty arrays, non-finite values, and constant arrays, and when
/// `max - min` does not fit in an `f64`.
pub fn normalize(data: &ArrayD<f64>) -> Result<ArrayD<f64>> {
    let (min, max) = finite_extent(data)?;
    let range = max - min;
    if range == 0.0 {
        return Err(TransformError::ZeroRange { value: min });
    }
    if !range.is_finite() {
        return Err(TransformError::FloatOverflow { min, max });
    }

    Ok(data.mapv(|x| (x - min) / range))
}

/// Rescale the whole array into `[min_val, max_val]`.
///
/// Equivalent to [`normalize`] followed by `* (max_val - min_val) + min_val`.
pub fn normalize_to_range(data: &ArrayD<f64>, min_val: f64, max_val: f64) -> Result<ArrayD<f64>> {
    if !min_val.is_finite()
        || !max_val.is_finite()
        || min_val >= max_val
        || !(max_val - min_val).is_finite()
    {
        return Err(TransformError::InvalidBounds { min_val, max_val });
    }

    let span = max_val - min_val;
    let unit = normalize(data)?;
    Ok(unit.mapv(|x| x * span + min_val))
}

/// Drop every axis of length one.
///
/// A `(1, T)` or `(T, 1)` matrix becomes `(T,)`; a `(1, 1)` matrix becomes
/// a zero-dimensional array.
pub fn squeeze(mut array: ArrayD<f64>) -> ArrayD<f64> {
    for axis in (0..array.ndim()).rev() {
        if array.len_of(Axis(axis)) == 1 {
            array = array.index_axis_move(Axis(axis), 0);
        }
    }
    array
}

/// Stack equally shaped arrays along a new leading axis.
///
/// N arrays of shape `S` produce one array of shape `(N, S...)`, in input
/// order.
///
/// # Errors
///
/// Fails when `arrays` is empty or when any array's shape differs from the
/// first one's.
pub fn stack_arrays(arrays: &[ArrayD<f64>]) -> Result<ArrayD<f64>> {
    let first = arrays.first().ok_or(TransformError::NothingToStack)?;

    for (index, array) in arrays.iter().enumerate().skip(1) {
        if array.shape() != first.shape() {
            return Err(TransformError::ShapeMismatch {
                index,
                expected: first.shape().to_vec(),
                found: array.shape().to_vec(),
            });
        }
    }

    let views: Vec<_> = arrays.iter().map(|a| a.view()).collect();
    Ok(ndarray::stack(Axis(0), &views)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2, IxDyn};

    const TOLERANCE: f64 = 1e-10;

    fn dyn1(values: &[f64]) -> ArrayD<f64> {
        arr1(values).into_dyn()
    }

    #[test]
    fn test_square() {
        assert_eq!(square(7).unwrap(), 49);
        assert_eq!(square(-3).unwrap(), 9);
        assert_eq!(square(0).unwrap(), 0);
        assert!(square_message(7).unwrap().contains("49"));
        assert_eq!(square_message(7).unwrap(), "Square of 7 is 49.");
    }

    #[test]
    fn test_square_overflow() {
        let err = square(i64::MAX).unwrap_err();
        assert!(matches!(err, TransformError::Overflow { value } if value == i64::MAX));
    }

    #[test]
    fn test_greeting() {
        assert_eq!(greeting("Ada"), "Hello, Ada!");
    }

    #[test]
    fn test_standardize_zero_mean_unit_std() {
        let data = arr2(&[[1.0, 2.0, 3.0], [4.0, 10.0, -6.0]]).into_dyn();
        let z = standardize(&data).unwrap();

        assert_eq!(z.shape(), data.shape());
        assert!(z.mean().unwrap().abs() < TOLERANCE);
        assert!((z.std(0.0) - 1.0).abs() < TOLERANCE);
    }

    #[test]
    fn test_standardize_uses_population_std() {
        let z = standardize(&dyn1(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0])).unwrap();
        // mean 5, population std 2
        assert!((z[[0]] + 1.5).abs() < TOLERANCE);
        assert!((z[[7]] - 2.0).abs() < TOLERANCE);
    }

    #[test]
    fn test_standardize_constant_array_fails() {
        let err = standardize(&dyn1(&[0.1, 0.1, 0.1])).unwrap_err();
        assert!(matches!(err, TransformError::ZeroVariance { .. }));
    }

    #[test]
    fn test_standardize_empty_and_nan_fail() {
        assert!(matches!(
            standardize(&dyn1(&[])).unwrap_err(),
            TransformError::EmptyArray
        ));
        assert!(matches!(
            standardize(&dyn1(&[1.0, f64::NAN])).unwrap_err(),
            TransformError::NonFinite
        ));
    }

    #[test]
    fn test_normalize_unit_interval() {
        let data = arr2(&[[3.0, -1.0], [7.0, 5.0]]).into_dyn();
        let n = normalize(&data).unwrap();

        let min = n.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = n.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(min, 0.0);
        assert_eq!(max, 1.0);
        assert!((n[[0, 0]] - 0.5).abs() < TOLERANCE);
    }

    #[test]
    fn test_normalize_whole_array_not_per_row() {
        let data = arr2(&[[0.0, 1.0], [2.0, 4.0]]).into_dyn();
        let n = normalize(&data).unwrap();
        assert_eq!(n[[0, 1]], 0.25);
        assert_eq!(n[[1, 0]], 0.5);
    }

    #[test]
    fn test_normalize_constant_array_fails() {
        let err = normalize(&dyn1(&[4.0, 4.0])).unwrap_err();
        assert!(matches!(err, TransformError::ZeroRange { value } if value == 4.0));
    }

    #[test]
    fn test_normalize_range_overflow_fails() {
        let err = normalize(&dyn1(&[-1e308, 0.0, 1e308])).unwrap_err();
        assert!(matches!(err, TransformError::FloatOverflow { .. }));
    }

    #[test]
    fn test_standardize_overflow_fails() {
        let err = standardize(&dyn1(&[-1e308, 1e308, 1e308])).unwrap_err();
        assert!(matches!(err, TransformError::FloatOverflow { .. }));
    }

    #[test]
    fn test_normalize_to_range_bounds() {
        let n = normalize_to_range(&dyn1(&[10.0, 20.0, 15.0]), -1.0, 1.0).unwrap();
        assert_eq!(n.iter().copied().collect::<Vec<_>>(), vec![-1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_normalize_to_range_invalid_bounds() {
        let data = dyn1(&[1.0, 2.0]);
        assert!(matches!(
            normalize_to_range(&data, 1.0, 1.0).unwrap_err(),
            TransformError::InvalidBounds { .. }
        ));
        assert!(matches!(
            normalize_to_range(&data, 0.0, f64::INFINITY).unwrap_err(),
            TransformError::InvalidBounds { .. }
        ));
        assert!(matches!(
            normalize_to_range(&data, -f64::MAX, f64::MAX).unwrap_err(),
            TransformError::InvalidBounds { .. }
        ));
    }

    #[test]
    fn test_squeeze() {
        let column = ArrayD::from_shape_vec(IxDyn(&[3, 1]), vec![1.0, 2.0, 3.0]).unwrap();
        assert_eq!(squeeze(column), dyn1(&[1.0, 2.0, 3.0]));

        let row = ArrayD::from_shape_vec(IxDyn(&[1, 3]), vec![1.0, 2.0, 3.0]).unwrap();
        assert_eq!(squeeze(row).shape(), &[3]);

        let scalar = ArrayD::from_shape_vec(IxDyn(&[1, 1]), vec![5.0]).unwrap();
        let squeezed = squeeze(scalar);
        assert_eq!(squeezed.ndim(), 0);
        assert_eq!(squeezed[IxDyn(&[])], 5.0);

        let matrix = ArrayD::<f64>::zeros(IxDyn(&[2, 3]));
        assert_eq!(squeeze(matrix).shape(), &[2, 3]);
    }

    #[test]
    fn test_stack_arrays_shape() {
        let arrays = vec![dyn1(&[1.0, 2.0, 3.0]), dyn1(&[4.0, 5.0, 6.0])];
        let stacked = stack_arrays(&arrays).unwrap();

        assert_eq!(stacked.shape(), &[2, 3]);
        assert_eq!(stacked[[1, 0]], 4.0);
    }

    #[test]
    fn test_stack_arrays_mismatch() {
        let arrays = vec![dyn1(&[1.0, 2.0, 3.0]), dyn1(&[4.0, 5.0])];
        let err = stack_arrays(&arrays).unwrap_err();

        match err {
            TransformError::ShapeMismatch {
                index,
                expected,
                found,
            } => {
                assert_eq!(index, 1);
                assert_eq!(expected, vec![3]);
                assert_eq!(found, vec![2]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_stack_arrays_empty() {
        assert!(matches!(
            stack_arrays(&[]).unwrap_err(),
            TransformError::NothingToStack
        ));
    }
}
