use crate::problem::Problem;
use crate::Real;
use nalgebra::{DMatrix, DMatrixViewMut, DVector, DVectorView, DVectorViewMut};
use numeric_literals::replace_float_literals;

/// Approximates the derivative of the function `f: R^n -> R` with finite differences.
///
/// The parameter `h` determines the step size of the finite difference approximation.
///
/// The vector `x` is mutable in order to contain intermediate computations, but upon returning,
/// its content remains unchanged.
pub fn approximate_gradient_fd<'a, T>(
    f: impl FnMut(DVectorView<T>) -> T,
    x: impl Into<DVectorViewMut<'a, T>>,
    h: T,
) -> DVector<T>
where
    T: Real,
{
    let x = x.into();
    let mut df = DVector::zeros(x.len());
    approximate_gradient_fd_into(DVectorViewMut::from(&mut df), f, x, h);
    df
}

#[replace_float_literals(T::from_f64(literal).unwrap())]
fn approximate_gradient_fd_into<T>(
    mut df: DVectorViewMut<T>,
    mut f: impl FnMut(DVectorView<T>) -> T,
    mut x: DVectorViewMut<T>,
    h: T,
) where
    T: Real,
{
    let n = x.len();
    for i in 0..n {
        let x_i = x[i];
        x[i] = x_i + h;
        let f_plus = f(DVectorView::from(&x));
        x[i] = x_i - h;
        let f_minus = f(DVectorView::from(&x));
        df[i] = (f_plus - f_minus) / (2.0 * h);
        x[i] = x_i;
    }
}

/// Approximates the Jacobian of the function $f: \mathbb{R}^n \rightarrow \mathbb{R}^m$
/// with finite differences.
///
/// The Jacobian matrix is the $m \times n$ matrix whose entries are given by
/// $$ J_{ij} := \pd{f_i}{x_j}.$$
///
/// The parameter `h` determines the step size of the finite difference approximation.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn approximate_jacobian_fd<'a, T>(
    m: usize,
    mut f: impl FnMut(DVectorView<T>, DVectorViewMut<T>),
    x: impl Into<DVectorViewMut<'a, T>>,
    h: T,
) -> DMatrix<T>
where
    T: Real,
{
    let mut x = x.into();
    let n = x.len();
    let mut jacobian = DMatrix::zeros(m, n);
    let mut j: DMatrixViewMut<T> = DMatrixViewMut::from(&mut jacobian);

    // Buffers to hold f(x + e_i h) and f(x - e_i h)
    let mut f_plus = DVector::zeros(m);
    let mut f_minus = DVector::zeros(m);

    // Build column by column
    for i in 0..n {
        // df_dxi ~ (f(x + h e_i) - f(x - h e_i)) / (2 h)
        let xi = x[i];
        x[i] = xi + h;
        f(DVectorView::from(&x), DVectorViewMut::from(&mut f_plus));
        x[i] = xi - h;
        f(DVectorView::from(&x), DVectorViewMut::from(&mut f_minus));
        x[i] = xi;

        let mut df_dxi = j.column_mut(i);
        df_dxi.copy_from(&f_plus);
        df_dxi -= &f_minus;
        df_dxi /= 2.0 * h;
    }
    jacobian
}

/// Largest absolute deviation between the gradient reported by `problem` at `x` and a central
/// finite difference approximation of it.
pub fn gradient_error_fd<T, P>(problem: &mut P, x: &DVector<T>, h: T) -> T
where
    T: Real,
    P: ?Sized + Problem<T>,
{
    let analytic = problem.gradient(x);
    let mut x_fd = x.clone();
    let numeric = approximate_gradient_fd(|x| problem.value(&x.clone_owned()), &mut x_fd, h);
    (analytic - numeric).amax()
}

/// Largest absolute deviation between the Hessian reported by `problem` at `x` and a central
/// finite difference approximation of its gradient's Jacobian.
pub fn hessian_error_fd<T, P>(problem: &mut P, x: &DVector<T>, h: T) -> T
where
    T: Real,
    P: ?Sized + Problem<T>,
{
    let n = x.len();
    let mut analytic = DMatrix::zeros(n, n);
    for (i, j, v) in problem.hessian(x).triplet_iter() {
        analytic[(i, j)] += *v;
    }
    let mut x_fd = x.clone();
    let numeric = approximate_jacobian_fd(
        n,
        |x, mut g| g.copy_from(&problem.gradient(&x.clone_owned())),
        &mut x_fd,
        h,
    );
    (analytic - numeric).amax()
}
