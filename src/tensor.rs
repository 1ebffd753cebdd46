//! Flat tensor storage with gradient-tracking flags
//!
//! Tensors are stored as 1D arrays with explicit dimensions supplied at the
//! call site. The `requires_grad` flag is the single source of truth for
//! trainability: freezing a module means clearing this flag on its tensors,
//! and the fine-tuned checkpoint filter keys off it.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// A flat f32 tensor with a trainability flag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    data: Array1<f32>,
    requires_grad: bool,
}

impl Tensor {
    /// Create a tensor from an ndarray.
    pub fn new(data: Array1<f32>, requires_grad: bool) -> Self {
        Self { data, requires_grad }
    }

    /// Create a tensor from a Vec.
    pub fn from_vec(data: Vec<f32>, requires_grad: bool) -> Self {
        Self { data: Array1::from_vec(data), requires_grad }
    }

    /// Create a zero-filled tensor of the given length.
    pub fn zeros(len: usize, requires_grad: bool) -> Self {
        Self { data: Array1::zeros(len), requires_grad }
    }

    /// Get reference to the underlying data.
    pub fn data(&self) -> &Array1<f32> {
        &self.data
    }

    /// Get mutable reference to the underlying data.
    pub fn data_mut(&mut self) -> &mut Array1<f32> {
        &mut self.data
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the tensor holds no elements.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether this tensor participates in optimization.
    pub fn requires_grad(&self) -> bool {
        self.requires_grad
    }

    /// Set the trainability flag.
    pub fn set_requires_grad(&mut self, requires_grad: bool) {
        self.requires_grad = requires_grad;
    }
}

/// Matrix multiplication over flat tensors: C[m,n] = A[m,k] @ B[k,n]
///
/// # Arguments
/// * `a` - Left operand stored row-major as 1D [m * k]
/// * `b` - Right operand stored row-major as 1D [k * n]
pub fn matmul(a: &Tensor, b: &Tensor, m: usize, k: usize, n: usize) -> Tensor {
    assert_eq!(a.len(), m * k, "Left operand size must match m * k");
    assert_eq!(b.len(), k * n, "Right operand size must match k * n");

    let mut out = vec![0.0f32; m * n];
    for i in 0..m {
        for j in 0..n {
            let mut acc = 0.0;
            for p in 0..k {
                acc += a.data()[i * k + p] * b.data()[p * n + j];
            }
            out[i * n + j] = acc;
        }
    }

    Tensor::from_vec(out, a.requires_grad() || b.requires_grad())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_from_vec_preserves_flag() {
        let t = Tensor::from_vec(vec![1.0, 2.0], true);
        assert!(t.requires_grad());
        assert_eq!(t.len(), 2);

        let f = Tensor::from_vec(vec![1.0], false);
        assert!(!f.requires_grad());
    }

    #[test]
    fn test_zeros() {
        let t = Tensor::zeros(4, false);
        assert_eq!(t.len(), 4);
        assert!(t.data().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_set_requires_grad() {
        let mut t = Tensor::from_vec(vec![1.0], true);
        t.set_requires_grad(false);
        assert!(!t.requires_grad());
    }

    #[test]
    fn test_matmul_identity() {
        // 2x2 identity times a column vector
        let eye = Tensor::from_vec(vec![1.0, 0.0, 0.0, 1.0], false);
        let x = Tensor::from_vec(vec![2.0, 3.0], false);
        let y = matmul(&eye, &x, 2, 2, 1);

        assert_abs_diff_eq!(y.data()[0], 2.0, epsilon = 1e-6);
        assert_abs_diff_eq!(y.data()[1], 3.0, epsilon = 1e-6);
    }

    #[test]
    fn test_matmul_rectangular() {
        // [2x3] @ [3x1]
        let a = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], false);
        let x = Tensor::from_vec(vec![1.0, 1.0, 1.0], false);
        let y = matmul(&a, &x, 2, 3, 1);

        assert_abs_diff_eq!(y.data()[0], 6.0, epsilon = 1e-6);
        assert_abs_diff_eq!(y.data()[1], 15.0, epsilon = 1e-6);
    }

    #[test]
    fn test_matmul_propagates_requires_grad() {
        let a = Tensor::from_vec(vec![1.0], false);
        let b = Tensor::from_vec(vec![1.0], true);
        assert!(matmul(&a, &b, 1, 1, 1).requires_grad());

        let c = Tensor::from_vec(vec![1.0], false);
        assert!(!matmul(&a, &c, 1, 1, 1).requires_grad());
    }

    #[test]
    fn test_serde_round_trip() {
        let t = Tensor::from_vec(vec![0.5, -1.5], true);
        let json = serde_json::to_string(&t).unwrap();
        let back: Tensor = serde_json::from_str(&json).unwrap();
        assert_eq!(t, back);
    }
}
