use ndarray::{Array1, Array2};

use super::Batched;

// Aliases for readability; the substrate underneath is plain ndarray.
pub type Matrix<T> = Array2<T>;
pub type Vector<T> = Array1<T>;

/// One minibatch (rows are examples, columns are features) or a sequence of them.
pub type Minibatch<T> = Batched<Matrix<T>>;
