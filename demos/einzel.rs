use einzel::prelude::*;

fn main() {
    // three electrodes: 1 kV outer tubes around a 400 V center tube
    let lens = LensRequest {
        spacings: vec![1e-3, 1e-3, 1e-3],     // [m]
        thicknesses: vec![6e-3, 2e-3, 6e-3],  // [m]
        diameter: 2e-3,                       // [m]
        voltages: vec![1000.0, 400.0, 1000.0], // [V]
    };

    let simulation = Simulation::new(SimulationDescriptor {
        settings: SolverSettings::default(),
        verbose: true,
    })
    .unwrap();

    println!("-- Focal Length --");
    let analysis = simulation.focal_analysis(&lens).unwrap();
    println!(
        "back focal length:      {} m\n\
        effective focal length: {} m\n\
        thin aperture estimate: {} m\n",
        analysis.focal_length,
        analysis.effective_focal_length,
        simulation.thin_lens_estimate(&lens).unwrap(),
    );

    println!("-- Ray Trace --");
    let trajectory = simulation
        .trace(&TraceRequest {
            lens,
            release: Release {
                angle: 1e-3,   // [rad]
                offset: 5e-5,  // [m]
                energy: 800.0, // [eV]
            },
            num_points: 1_000,
            model: RayModel::EnergyConserving,
        })
        .unwrap();

    for (z, r) in trajectory.points().step_by(100) {
        println!("{:<9.3e} m  {:<+10.3e} m", z, r);
    }
}
