use einzel::prelude::*;

fn main() {
    let lens = LensRequest {
        spacings: vec![2e-3, 1e-3, 1e-3],
        thicknesses: vec![5e-3, 2e-3, 5e-3],
        diameter: 3e-3,
        voltages: vec![2000.0, 600.0, 2000.0],
    };

    // a fan of parallel rays at increasing heights
    let requests = (1..=8)
        .map(|n| TraceRequest {
            lens: lens.clone(),
            release: Release {
                angle: 0.0,
                offset: (n as f64) * 1e-4,
                energy: 2000.0,
            },
            num_points: 200,
            model: RayModel::EnergyConserving,
        })
        .collect::<Vec<_>>();

    let simulation = Simulation::default();
    let paraxial = simulation.focal_length(&lens).unwrap();
    println!("paraxial focal length: {} m", paraxial);

    // spherical aberration shows up as a focal length that shrinks with height
    for (req, result) in requests.iter().zip(simulation.trace_many(&requests)) {
        let trajectory = result.unwrap();
        let last = trajectory.len() - 1;
        let (r, slope) = (trajectory.r()[last], trajectory.slope()[last]);
        println!(
            "height {:<8.2e} m -> crosses axis {:<+10.3e} m behind the lens",
            req.release.offset,
            -r / slope,
        );
    }
}
