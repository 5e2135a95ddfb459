use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use chrono::{Duration, Local};
use clap::Parser;
use log::{error, info, LevelFilter};
use syslog::Facility;

use chicken_gate::command::{CommandFile, CommandInbox};
use chicken_gate::config::{Config, CONFIG_ENV};
use chicken_gate::gate::CLOSED_POSITION;
use chicken_gate::hardware::{PiGateIo, SimGateIo};
use chicken_gate::notify::{LogNotifier, WebhookNotifier};
use chicken_gate::status::{SharedStatus, StatusFile};
use chicken_gate::{
    http, Controller, Error, Gate, GateDriver, GateIo, Notifier, ScheduleHandle, Scheduler,
    SolarCalculator,
};

/// Opens and closes a chicken coop gate on a sunrise/dusk schedule
#[derive(Parser, Debug)]
#[command(name = "chicken-gate")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the TOML configuration file; built-in defaults when omitted
    #[arg(short, long, env = CONFIG_ENV)]
    config: Option<PathBuf>,
}

fn main() -> Result<(), Error> {
    let args = Args::parse();

    if let Err(err) = syslog::init_unix(Facility::LOG_DAEMON, LevelFilter::Info) {
        eprintln!("Unable to connect to syslog: {}", err);
    }

    let config = Config::load(args.config.as_deref())?;

    let term = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&term))?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&term))?;

    let mut threads: Vec<JoinHandle<()>> = Vec::new();

    // Notification thread
    let notifier: Box<dyn Notifier> = match config.notify.webhook_url.clone() {
        Some(url) => {
            let (notifier, thread) = WebhookNotifier::spawn(url);
            threads.push(thread);
            Box::new(notifier)
        }
        None => Box::new(LogNotifier),
    };

    // Scheduler thread
    let sun = SolarCalculator::new(config.schedule.latitude, config.schedule.longitude);
    let offset = Duration::minutes(config.schedule.close_offset_minutes);
    let scheduler = Scheduler::new(sun, offset, Local::now());
    let schedule = scheduler.handle();
    threads.push(scheduler.spawn(Arc::clone(&term)));

    let shared_status = SharedStatus::new();
    let inbox = CommandInbox::new();

    // Start HTTP server
    let server = if config.http.enabled {
        match http::Server::new(config.http.addr.as_str()) {
            Ok(server) => {
                info!("http server running on {}", config.http.addr);
                Some(Arc::new(server))
            }
            Err(err) => {
                // The gate still runs on its schedule and the command file.
                error!("Unable to start http server on {}: {}", config.http.addr, err);
                None
            }
        }
    } else {
        None
    };

    // Handle HTTP requests
    if let Some(server) = &server {
        let server = Arc::clone(server);
        let status = shared_status.clone();
        let inbox = inbox.clone();
        let thread = thread::spawn(move || {
            server.handle_requests(status, inbox);
            eprintln!("server thread exiting");
        });
        threads.push(thread);
    }

    let gate = Gate::new(
        CLOSED_POSITION,
        config.gate.open_time_secs,
        config.gate.close_time_secs,
        notifier,
    );
    info!("Started chicken gate");

    // Control loop on the main thread until a signal arrives
    if config.simulate {
        info!("running against simulated gate mechanics");
        let io = SimGateIo::new(
            CLOSED_POSITION,
            config.gate.open_time_secs,
            config.gate.close_time_secs,
        );
        control(GateDriver::new(gate, io), schedule, &config, shared_status, inbox, &term);
    } else {
        let gpio = &config.gpio;
        let io = match PiGateIo::new(
            gpio.closed_switch_pin,
            gpio.forward_relay_pin,
            gpio.reverse_relay_pin,
        ) {
            Ok(io) => io,
            Err(err) => {
                error!("Unable to set up GPIO: {}", err);
                term.store(true, Ordering::SeqCst);
                drop(gate);
                stop(server, threads);
                return Err(err.into());
            }
        };
        control(GateDriver::new(gate, io), schedule, &config, shared_status, inbox, &term);
    }

    stop(server, threads);
    Ok(())
}

fn control<I: GateIo>(
    driver: GateDriver<I>,
    schedule: ScheduleHandle,
    config: &Config,
    shared_status: SharedStatus,
    inbox: CommandInbox,
    term: &AtomicBool,
) {
    let mut controller = Controller::new(driver, schedule, config.schedule.enabled);
    controller.add_source(Box::new(CommandFile::new(&config.files.command_file)));
    controller.add_source(Box::new(inbox));
    controller.add_sink(Box::new(StatusFile::new(&config.files.status_file)));
    controller.add_sink(Box::new(shared_status));

    controller.run(term);
    controller.shutdown();
    // Dropping the controller drops the gate's notifier, which lets the
    // notification thread finish.
}

fn stop(server: Option<Arc<http::Server>>, threads: Vec<JoinHandle<()>>) {
    if let Some(server) = server {
        server.shutdown();
    }
    for thread in threads {
        let _ = thread.join();
    }
    info!("chicken gate stopped");
}
