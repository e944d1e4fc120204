use log::{error, info};

use md_lj::observables::{self, Estimate, System};
use md_lj::{
    block_error_curve, correlation_function, initialize, simulate, Config, ForceEngine,
    ForceFieldParams, Result,
};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    // parse command line options
    let config = Config::new()?;
    config.validate()?;
    info!("run {}", config.format_file_suffix());

    let params = ForceFieldParams::new(config.cutoff)?;
    let engine = if config.threads > 0 {
        ForceEngine::parallel(params, config.threads)?
    } else {
        ForceEngine::serial(params)
    };

    // initialize the simulation box
    let state = initialize(config.cells, config.density, config.temperature, config.seed)?;
    params.check_box(state.box_length())?;

    // thermostatted equilibration, then microcanonical sampling from where it ended
    let equilibrated = simulate(state, &engine, &config.equilibration())?;
    let sampled = simulate(equilibrated.state, &engine, &config.sampling())?;

    let sys = System::from_state(&sampled.state, config.cutoff);
    let thermo = observables::summarize(&sampled.trajectory, &sys, config.blocks)?;
    let rdf = correlation_function(
        sampled.state.positions(),
        sampled.state.box_length(),
        config.rdf_bins,
    )?;

    println!("atoms                  {}", sys.num);
    println!("density                {:.6}", sys.density());
    println!("box length             {:.6}", sampled.state.box_length());
    println!("blocks                 {}", config.blocks);
    print_estimate("temperature", &thermo.temperature);
    print_estimate("potential energy / N", &thermo.potential_energy);
    print_estimate("pressure", &thermo.pressure);
    print_estimate("heat capacity / N", &thermo.heat_capacity);
    println!("energy drift           {:.3e}", sampled.trajectory.relative_energy_drift());
    if let Some(peak) = rdf.first_peak() {
        println!("g(r) peak              {:.4}", peak);
    }

    if config.print_rdf {
        println!();
        println!("# r g(r)");
        for bin in rdf.bins.iter() {
            println!("{:.6} {:.6}", bin.r, bin.g);
        }
    }

    if config.print_block_curve {
        let t = observables::temperature_series(&sampled.trajectory, &sys);
        println!();
        println!("# blocks block_length std_error");
        for point in block_error_curve(&t)? {
            println!("{} {} {:.6e}", point.block_count, point.block_length, point.std_error);
        }
    }

    Ok(())
}

fn print_estimate(name: &str, e: &Estimate) {
    println!("{:<22} {:.6} +/- {:.6}", name, e.mean, e.error);
}
