use nalgebra::{Isometry3, Matrix3, Point3, Rotation3, Translation3, UnitQuaternion, Vector3};

pub fn calculate_rmsd(coords1: &[Point3<f64>], coords2: &[Point3<f64>]) -> Option<f64> {
    let squared_dist_sum = squared_deviation_sum(coords1, coords2)?;
    if coords1.is_empty() {
        return None;
    }
    Some((squared_dist_sum / coords1.len() as f64).sqrt())
}

/// Sum of squared point-to-point distances of two order-matched coordinate sets.
///
/// Returns `None` if the sets differ in length. Two empty sets have a sum of zero.
pub fn squared_deviation_sum(coords1: &[Point3<f64>], coords2: &[Point3<f64>]) -> Option<f64> {
    if coords1.len() != coords2.len() {
        return None;
    }
    Some(
        coords1
            .iter()
            .zip(coords2.iter())
            .map(|(p1, p2)| (p1 - p2).norm_squared())
            .sum(),
    )
}

pub fn centroid(coords: &[Point3<f64>]) -> Option<Point3<f64>> {
    if coords.is_empty() {
        return None;
    }
    let sum = coords
        .iter()
        .fold(Vector3::zeros(), |acc, p| acc + p.coords);
    Some(Point3::from(sum / coords.len() as f64))
}

/// Computes the rigid transform that best superposes `target` onto `reference`.
///
/// The two sets are order-matched: `target[i]` is paired with `reference[i]`. The rotation
/// is obtained with the Kabsch algorithm (SVD of the covariance matrix, with a reflection
/// correction), the translation maps the rotated target centroid onto the reference
/// centroid. Applying the returned isometry to `target` minimizes the RMSD to `reference`.
///
/// Returns `None` when the sets differ in length, are empty, or the decomposition fails.
pub fn superposition(
    reference: &[Point3<f64>],
    target: &[Point3<f64>],
) -> Option<Isometry3<f64>> {
    if reference.len() != target.len() || reference.is_empty() {
        return None;
    }
    let reference_center = centroid(reference)?;
    let target_center = centroid(target)?;

    let covariance = target
        .iter()
        .zip(reference.iter())
        .fold(Matrix3::zeros(), |acc, (t, r)| {
            acc + (t - target_center) * (r - reference_center).transpose()
        });

    let svd = covariance.svd(true, true);
    let u = svd.u?;
    let v = svd.v_t?.transpose();

    let reflection = (v * u.transpose()).determinant().signum();
    let correction = Matrix3::from_diagonal(&Vector3::new(1.0, 1.0, reflection));
    let rotation_matrix = v * correction * u.transpose();

    let rotation =
        UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(rotation_matrix));
    let translation = reference_center.coords - rotation * target_center.coords;

    Some(Isometry3::from_parts(
        Translation3::from(translation),
        rotation,
    ))
}
