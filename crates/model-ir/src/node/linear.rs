// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! MatMul and Gemm nodes.
//!
//! Both route through [`tensor_core::gemm`] with the algorithm chosen in
//! [`ForwardOptions`]; transposition is a view flag, never a copy.

use super::{invalid, unsupported, ForwardOptions};
use crate::{NodeError, SymbolTable};
use tensor_core::{dispatch_float, gemm, ops, Float, MatrixRef, Shape, Tensor, TensorError, TensorValue};

/// Rows and columns of a 2-D input.
fn matrix_dims(op: &'static str, key: &str, shape: &Shape) -> Result<(usize, usize), NodeError> {
    match shape.dims() {
        &[rows, cols] => Ok((rows, cols)),
        _ => Err(invalid(op, format!("'{key}' must be 2-D, got {shape}"))),
    }
}

fn same_type<T: Float>(op: &'static str, key: &str, value: &TensorValue) -> Result<std::sync::Arc<Tensor<T>>, NodeError> {
    value.downcast_arc::<T>().ok_or_else(|| unsupported(op, key, value.dtype()))
}

/// `y = a @ b` for `a: [M, K]`, `b: [K, N]`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MatMulNode {
    pub a: String,
    pub b: String,
    pub y: String,
}

impl MatMulNode {
    const OP: &'static str = "MatMul";

    pub fn new(a: impl Into<String>, b: impl Into<String>, y: impl Into<String>) -> Self {
        Self {
            a: a.into(),
            b: b.into(),
            y: y.into(),
        }
    }

    pub(crate) fn forward(&self, table: &mut SymbolTable, options: &ForwardOptions) -> Result<(), NodeError> {
        let op = Self::OP;
        let a = table.input(op, &self.a)?;
        let b = table.input(op, &self.b)?;
        let (m, k) = matrix_dims(op, &self.a, a.shape())?;
        let (k2, n) = matrix_dims(op, &self.b, b.shape())?;
        if k != k2 {
            return Err(NodeError::Tensor {
                op,
                source: TensorError::ShapeMismatch {
                    op: "matmul",
                    lhs: a.shape().clone(),
                    rhs: b.shape().clone(),
                },
            });
        }

        dispatch_float!(
            &a,
            |lhs| {
                let rhs = same_type(op, &self.b, &b)?;
                let y = table.output(op, &self.y, &Shape::matrix(m, n))?;
                ops::matmul(lhs, &rhs, y, options.gemm).map_err(NodeError::tensor(op))
            },
            |dtype| Err(unsupported(op, &self.a, dtype))
        )
    }
}

fn one() -> f32 {
    1.0
}

/// `y = alpha * op(a) @ op(b) + beta * c`.
///
/// `c` is optional and unidirectionally broadcast to `[M, N]`; accepted
/// shapes are scalar, `[N]`, `[1, N]`, `[M, 1]`, `[M, N]` and their
/// size-1 variants.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GemmNode {
    pub a: String,
    pub b: String,
    #[serde(default)]
    pub c: Option<String>,
    pub y: String,
    #[serde(default = "one")]
    pub alpha: f32,
    #[serde(default = "one")]
    pub beta: f32,
    #[serde(default, alias = "transA")]
    pub trans_a: bool,
    #[serde(default, alias = "transB")]
    pub trans_b: bool,
}

impl GemmNode {
    const OP: &'static str = "Gemm";

    pub fn new(a: impl Into<String>, b: impl Into<String>, y: impl Into<String>) -> Self {
        Self {
            a: a.into(),
            b: b.into(),
            c: None,
            y: y.into(),
            alpha: 1.0,
            beta: 1.0,
            trans_a: false,
            trans_b: false,
        }
    }

    pub fn with_c(mut self, c: impl Into<String>) -> Self {
        self.c = Some(c.into());
        self
    }

    pub fn with_scalars(mut self, alpha: f32, beta: f32) -> Self {
        self.alpha = alpha;
        self.beta = beta;
        self
    }

    pub fn with_transpose(mut self, trans_a: bool, trans_b: bool) -> Self {
        self.trans_a = trans_a;
        self.trans_b = trans_b;
        self
    }

    pub(crate) fn forward(&self, table: &mut SymbolTable, options: &ForwardOptions) -> Result<(), NodeError> {
        let op = Self::OP;
        let a = table.input(op, &self.a)?;
        let b = table.input(op, &self.b)?;
        let c = self.c.as_deref().map(|key| table.input(op, key).map(|v| (key, v))).transpose()?;

        let (ar, ac) = matrix_dims(op, &self.a, a.shape())?;
        let (br, bc) = matrix_dims(op, &self.b, b.shape())?;
        let (m, k) = if self.trans_a { (ac, ar) } else { (ar, ac) };
        let (k2, n) = if self.trans_b { (bc, br) } else { (br, bc) };
        if k != k2 {
            return Err(invalid(
                op,
                format!("inner dimensions differ: op(A) is [{m}, {k}], op(B) is [{k2}, {n}]"),
            ));
        }
        let c_layout = match &c {
            Some((key, value)) => Some(bias_layout(op, key, value.shape(), m, n)?),
            None => None,
        };

        dispatch_float!(
            &a,
            |lhs| {
                let rhs = same_type(op, &self.b, &b)?;
                let bias = match &c {
                    Some((key, value)) => Some(same_type(op, key, value)?),
                    None => None,
                };
                let y = table.output(op, &self.y, &Shape::matrix(m, n))?;
                let lhs_view = MatrixRef::new(lhs.as_slice(), ar, ac)
                    .map_err(NodeError::tensor(op))?
                    .transpose_if(self.trans_a);
                let rhs_view = MatrixRef::new(rhs.as_slice(), br, bc)
                    .map_err(NodeError::tensor(op))?
                    .transpose_if(self.trans_b);
                let out = y.as_mut_slice();

                // Seed Y with the broadcast C so GEMM can accumulate onto it.
                let seeded = match (&bias, c_layout) {
                    (Some(bias), Some((cm, cn))) if self.beta != 0.0 => {
                        let bias = bias.as_slice();
                        for i in 0..m {
                            for j in 0..n {
                                let ci = if cm == 1 { 0 } else { i };
                                let cj = if cn == 1 { 0 } else { j };
                                out[i * n + j] = bias[ci * cn + cj];
                            }
                        }
                        true
                    }
                    _ => false,
                };
                let (alpha, gemm_beta) = scalars(lhs, self.alpha, self.beta, seeded);
                gemm(options.gemm, alpha, lhs_view, rhs_view, gemm_beta, out, n).map_err(NodeError::tensor(op))
            },
            |dtype| Err(unsupported(op, &self.a, dtype))
        )
    }
}

/// `(alpha, beta)` in the element type; beta is zero unless Y was seeded from C.
fn scalars<T: Float>(_like: &Tensor<T>, alpha: f32, beta: f32, seeded: bool) -> (T, T) {
    let beta = if seeded { T::from_f64(f64::from(beta)) } else { T::ZERO };
    (T::from_f64(f64::from(alpha)), beta)
}

/// `(rows, cols)` of C after right-aligning it against `[m, n]`.
fn bias_layout(op: &'static str, key: &str, shape: &Shape, m: usize, n: usize) -> Result<(usize, usize), NodeError> {
    let (cm, cn) = match shape.dims() {
        [] => (1, 1),
        &[cols] => (1, cols),
        &[rows, cols] => (rows, cols),
        _ => return Err(invalid(op, format!("C '{key}' must have rank <= 2, got {shape}"))),
    };
    if (cm != 1 && cm != m) || (cn != 1 && cn != n) {
        return Err(invalid(op, format!("C '{key}' of shape {shape} does not broadcast to [{m}, {n}]")));
    }
    Ok((cm, cn))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tensor_core::GemmAlgorithm;

    fn table_with(entries: &[(&str, Tensor<f32>)]) -> SymbolTable {
        entries.iter().map(|(k, v)| (*k, v.clone())).collect()
    }

    fn output(table: &SymbolTable, key: &str) -> Vec<f32> {
        table.get(key).unwrap().downcast::<f32>().unwrap().to_vec()
    }

    fn m2(rows: usize, cols: usize, data: &[f32]) -> Tensor<f32> {
        Tensor::from_slice([rows, cols], data).unwrap()
    }

    #[test]
    fn test_gemm_alpha1_beta0() {
        let mut table = table_with(&[("A", m2(2, 2, &[1.0, 2.0, 3.0, 4.0])), ("B", m2(2, 2, &[5.0, 6.0, 7.0, 8.0]))]);
        let node = GemmNode::new("A", "B", "Y").with_scalars(1.0, 0.0);
        for &gemm in GemmAlgorithm::ALL {
            node.forward(&mut table, &ForwardOptions { gemm }).unwrap();
            assert_eq!(output(&table, "Y"), vec![19.0, 22.0, 43.0, 50.0], "{gemm}");
        }
    }

    #[test]
    fn test_gemm_transpose_and_bias() {
        // op(A) = A^T = [[1, 3], [2, 4]], op(B) = B^T = [[5, 7], [6, 8]]
        let mut table = table_with(&[
            ("A", m2(2, 2, &[1.0, 2.0, 3.0, 4.0])),
            ("B", m2(2, 2, &[5.0, 6.0, 7.0, 8.0])),
            ("C", Tensor::from_vec([2], vec![1.0, -1.0]).unwrap()),
        ]);
        let node = GemmNode::new("A", "B", "Y")
            .with_c("C")
            .with_scalars(2.0, 10.0)
            .with_transpose(true, true);
        node.forward(&mut table, &ForwardOptions::default()).unwrap();
        // A^T B^T = [[23, 31], [34, 46]]
        assert_eq!(output(&table, "Y"), vec![56.0, 52.0, 78.0, 82.0]);
    }

    #[test]
    fn test_gemm_column_bias() {
        let mut table = table_with(&[
            ("A", m2(2, 1, &[1.0, 2.0])),
            ("B", m2(1, 2, &[1.0, 1.0])),
            ("C", m2(2, 1, &[100.0, 200.0])),
        ]);
        GemmNode::new("A", "B", "Y")
            .with_c("C")
            .forward(&mut table, &ForwardOptions::default())
            .unwrap();
        assert_eq!(output(&table, "Y"), vec![101.0, 101.0, 202.0, 202.0]);
    }

    #[test]
    fn test_gemm_bad_bias_shape() {
        let mut table = table_with(&[
            ("A", m2(2, 2, &[0.0; 4])),
            ("B", m2(2, 2, &[0.0; 4])),
            ("C", Tensor::from_vec([3], vec![0.0; 3]).unwrap()),
        ]);
        let err = GemmNode::new("A", "B", "Y")
            .with_c("C")
            .forward(&mut table, &ForwardOptions::default())
            .unwrap_err();
        assert!(matches!(err, NodeError::InvalidAttribute { op: "Gemm", .. }));
        assert!(!table.contains("Y"));
    }

    #[test]
    fn test_matmul_node() {
        let mut table = table_with(&[("A", m2(1, 3, &[1.0, 2.0, 3.0])), ("B", m2(3, 1, &[4.0, 5.0, 6.0]))]);
        MatMulNode::new("A", "B", "Y").forward(&mut table, &ForwardOptions::default()).unwrap();
        assert_eq!(output(&table, "Y"), vec![32.0]);
    }

    #[test]
    fn test_matmul_inner_mismatch() {
        let mut table = table_with(&[("A", m2(1, 3, &[0.0; 3])), ("B", m2(2, 1, &[0.0; 2]))]);
        let err = MatMulNode::new("A", "B", "Y")
            .forward(&mut table, &ForwardOptions::default())
            .unwrap_err();
        assert!(matches!(err, NodeError::Tensor { op: "MatMul", .. }));
    }

    #[test]
    fn test_matmul_rejects_integers() {
        let mut table = SymbolTable::new();
        table.insert("A", Tensor::from_vec([1, 1], vec![1i32]).unwrap());
        table.insert("B", Tensor::from_vec([1, 1], vec![1i32]).unwrap());
        let err = MatMulNode::new("A", "B", "Y")
            .forward(&mut table, &ForwardOptions::default())
            .unwrap_err();
        assert!(matches!(err, NodeError::UnsupportedType { op: "MatMul", .. }));
    }

    #[test]
    fn test_gemm_serde_onnx_names() {
        let node: GemmNode = serde_json::from_str(r#"{"a":"A","b":"B","y":"Y","transA":true,"beta":0.5}"#).unwrap();
        assert!(node.trans_a && !node.trans_b);
        assert_eq!((node.alpha, node.beta), (1.0, 0.5));
        assert!(node.c.is_none());
    }
}
