use std::path::PathBuf;

use clap::Parser;
use embassy_executor::Spawner;
use embassy_time::{Duration, Instant, Timer};
use log::*;
use reflow_sequencer::config::{ActuationConfig, ControllerConfig, HEATING_TUNINGS};
use reflow_sequencer::door::SimulatedDoor;
use reflow_sequencer::outputs_mock::SimPin;
use reflow_sequencer::pid::PidController;
use reflow_sequencer::profile::ProfileStore;
use reflow_sequencer::temperature_sensor::TemperatureSensor;
use reflow_sequencer::temperature_sensor_mock::SimulatedOven;
use reflow_sequencer::{
    ControlVariables, ControllerStatus, Cycle, HeaterBank, Phase, ReflowController,
    CURRENT_STATUS, VERSION,
};

/// Run a reflow profile against a simulated oven.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Builtin profile: leaded, lead_free or low_temp
    #[arg(long, default_value = "leaded")]
    profile: String,

    /// JSON profile file, takes precedence over --profile
    #[arg(long)]
    profile_file: Option<PathBuf>,

    /// Control cycle length in simulated milliseconds
    #[arg(long, default_value_t = 100)]
    tick_ms: u64,

    /// Simulated seconds per wall clock second
    #[arg(long, default_value_t = 10)]
    speedup: u32,

    /// Room temperature the oven starts from
    #[arg(long, default_value_t = 25.0)]
    ambient: f32,
}

fn load_profile(args: &Args) -> Option<ProfileStore> {
    let mut store = ProfileStore::new();
    match &args.profile_file {
        Some(path) => {
            let bytes = match std::fs::read(path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    error!("Cannot read {}: {}", path.display(), e);
                    return None;
                }
            };
            if let Err(e) = store.load_json(&bytes) {
                error!("Rejected profile {}: {}", path.display(), e);
                return None;
            }
        }
        None => {
            if !store.load_builtin(&args.profile) {
                return None;
            }
        }
    }
    Some(store)
}

#[embassy_executor::task]
async fn controller_task(args: Args) {
    let Some(store) = load_profile(&args) else {
        std::process::exit(2);
    };
    let mut controller =
        match ReflowController::new(store.active().clone(), ControllerConfig::default()) {
            Ok(controller) => controller,
            Err(e) => {
                error!("{}", e);
                std::process::exit(2);
            }
        };

    let tick = Duration::from_millis(args.tick_ms.max(1));
    let pause = tick / args.speedup.max(1);

    // Simulated clock, so a full profile can run faster than real time.
    let mut now = Instant::from_ticks(0);

    let mut vars = ControlVariables::new(args.ambient);
    let mut pid = PidController::new(HEATING_TUNINGS);
    let mut oven = SimulatedOven::new(args.ambient);
    let mut door = SimulatedDoor::new();
    let mut heaters = match HeaterBank::new(
        SimPin::new(),
        SimPin::new(),
        SimPin::new(),
        ActuationConfig::default(),
        now,
    ) {
        Ok(heaters) => heaters,
        Err(e) => {
            error!("{}", e);
            std::process::exit(2);
        }
    };

    if let Err(e) = controller.start(now) {
        error!("{}", e);
        std::process::exit(2);
    }

    let sender = CURRENT_STATUS.sender();
    loop {
        now += tick;

        match oven.read_celsius() {
            Ok(celsius) => vars.set_input(celsius),
            Err(e) => {
                warn!("Temperature read failed: {}", e);
                vars.set_input(f32::NAN);
            }
        }

        let mut cycle = Cycle {
            now,
            vars: &mut vars,
            feedback: &mut pid,
            sensor: &mut oven,
            door: &mut door,
        };
        if let Err(e) = controller.step(&mut cycle) {
            error!("Reflow aborted: {}", e);
        }

        pid.compute(now, &mut vars);
        let (heat, fan) = pid.direction().split(vars.output());
        if let Err(e) = heaters.update(now, heat) {
            error!("Heater update failed: {}", e);
            if let Err(off_err) = heaters.all_off() {
                error!("Could not switch heaters off: {}", off_err);
            }
            controller.abort(e, &mut vars, &mut pid, &mut door);
        }

        let heater_1 = heaters.heater_1().is_high();
        let heater_2 = heaters.heater_2().is_high();
        oven.advance(tick, heater_1, heater_2, door.is_open(), fan);

        sender.send(ControllerStatus::capture(
            &controller,
            &vars,
            (heater_1, heater_2),
            door.is_open(),
            now,
        ));

        if matches!(controller.phase(), Phase::Complete | Phase::Error) {
            break;
        }
        Timer::after(pause).await;
    }
    info!(
        "Reflow finished in {} after {}s simulated",
        controller.phase(),
        now.as_secs()
    );
}

#[embassy_executor::task]
async fn reporter_task() {
    let Some(mut receiver) = CURRENT_STATUS.receiver() else {
        error!("No status receiver available");
        return;
    };

    loop {
        let status = receiver.changed().await;
        match status.to_json() {
            Ok(json) => info!("{}", json),
            Err(_) => warn!("Status did not fit the JSON buffer"),
        }
        match status.phase {
            Phase::Complete => std::process::exit(0),
            Phase::Error => std::process::exit(1),
            _ => {}
        }
        Timer::after_secs(1).await;
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_nanos()
        .init();

    let args = Args::parse();
    info!("reflow-sequencer {}", VERSION);

    spawner.spawn(reporter_task().unwrap());
    spawner.spawn(controller_task(args).unwrap());
}
