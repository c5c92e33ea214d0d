use broyden::driver::Status;
use broyden::nalgebra as na;
use broyden::{Problem, ProblemError, SolverDriver, System};
use na::{Dyn, IsContiguous};

// Intersection of a circle and the hyperbola x y = 1. The radius is passed as
// an extra argument.
struct CircleHyperbola;

impl Problem for CircleHyperbola {
    type Field = f64;

    fn dim(&self) -> usize {
        2
    }
}

impl System for CircleHyperbola {
    fn eval<Sx, Sfx>(
        &self,
        x: &na::Vector<Self::Field, Dyn, Sx>,
        fx: &mut na::Vector<Self::Field, Dyn, Sfx>,
    ) -> Result<(), ProblemError>
    where
        Sx: na::storage::Storage<Self::Field, Dyn> + IsContiguous,
        Sfx: na::storage::StorageMut<Self::Field, Dyn>,
    {
        self.eval_with_args(x, &[2.0], fx)
    }

    fn eval_with_args<Sx, Sfx>(
        &self,
        x: &na::Vector<Self::Field, Dyn, Sx>,
        args: &[Self::Field],
        fx: &mut na::Vector<Self::Field, Dyn, Sfx>,
    ) -> Result<(), ProblemError>
    where
        Sx: na::storage::Storage<Self::Field, Dyn> + IsContiguous,
        Sfx: na::storage::StorageMut<Self::Field, Dyn>,
    {
        let r = args[0];
        fx[0] = x[0].powi(2) + x[1].powi(2) - r * r;
        fx[1] = x[0] * x[1] - 1.0;
        Ok(())
    }
}

fn main() -> Result<(), String> {
    let f = CircleHyperbola;
    let mut solver = SolverDriver::builder(&f)
        .with_initial(vec![2.0, 0.5])
        .with_args(vec![2.0])
        .build()
        .map_err(|error| format!("{error}"))?;

    loop {
        let status = solver.next().map_err(|error| format!("{error}"))?;

        println!(
            "iter = {}\t|| fx || = {}\tx = {:?}",
            solver.iter(),
            solver.norm(),
            solver.x()
        );

        match status {
            Status::Running => continue,
            Status::Converged => return Ok(()),
            Status::Exhausted => return Err("did not converge".to_string()),
        }
    }
}
