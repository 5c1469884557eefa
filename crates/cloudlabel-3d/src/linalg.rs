/// Transform a single point as `dst = dst_r_src * src + dst_t_src`.
///
/// Example:
///
/// ```
/// use cloudlabel_3d::linalg::transform_point;
///
/// let rotation = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
/// let translation = [1.0, 2.0, 3.0];
/// assert_eq!(transform_point(&[1.0, 1.0, 1.0], &rotation, &translation), [2.0, 3.0, 4.0]);
/// ```
#[inline]
pub fn transform_point(
    src_point: &[f64; 3],
    dst_r_src: &[[f64; 3]; 3],
    dst_t_src: &[f64; 3],
) -> [f64; 3] {
    let mut dst = [0.0; 3];
    for (i, (row, t)) in dst_r_src.iter().zip(dst_t_src).enumerate() {
        dst[i] = row[0] * src_point[0] + row[1] * src_point[1] + row[2] * src_point[2] + t;
    }
    dst
}

/// Check that a matrix is a proper rotation, i.e. `R^T R = I` and `det(R) = 1`,
/// up to the absolute tolerance `eps`.
pub fn is_rotation_matrix(r: &[[f64; 3]; 3], eps: f64) -> bool {
    for i in 0..3 {
        for j in 0..3 {
            let dot = (0..3).map(|k| r[k][i] * r[k][j]).sum::<f64>();
            let expected = if i == j { 1.0 } else { 0.0 };
            if (dot - expected).abs() > eps {
                return false;
            }
        }
    }
    (determinant(r) - 1.0).abs() <= eps
}

/// Determinant of a 3x3 row-major matrix.
pub fn determinant(m: &[[f64; 3]; 3]) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transforms::axis_angle_to_rotation_matrix;
    use approx::assert_relative_eq;

    const IDENTITY: [[f64; 3]; 3] = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

    #[test]
    fn test_transform_point_identity() {
        let src = [2.0, 3.0, 4.0];
        assert_eq!(transform_point(&src, &IDENTITY, &[0.0; 3]), src);
    }

    #[test]
    fn test_transform_point_rotation() -> Result<(), Box<dyn std::error::Error>> {
        let rotation = axis_angle_to_rotation_matrix(&[0.0, 0.0, 1.0], std::f64::consts::PI / 2.0)?;
        let dst = transform_point(&[1.0, 0.0, 0.0], &rotation, &[0.0, 0.0, 5.0]);
        assert_relative_eq!(dst[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(dst[1], 1.0, epsilon = 1e-12);
        assert_relative_eq!(dst[2], 5.0, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn test_is_rotation_matrix() -> Result<(), Box<dyn std::error::Error>> {
        assert!(is_rotation_matrix(&IDENTITY, 1e-9));

        let rotation = axis_angle_to_rotation_matrix(&[1.0, 1.0, 0.0], 0.3)?;
        assert!(is_rotation_matrix(&rotation, 1e-9));

        // reflection
        let reflection = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, -1.0]];
        assert!(!is_rotation_matrix(&reflection, 1e-9));

        // scaling
        let scaled = [[2.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        assert!(!is_rotation_matrix(&scaled, 1e-9));
        Ok(())
    }
}
