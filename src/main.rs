// Copyright (c) 2022 Lev Kokotov <hi@levthe.dev>
// Copyright (c) 2023 Dmitriy Vasiliev <dmitrivasilyev@ozon.ru>

// Permission is hereby granted, free of charge, to any person obtaining
// a copy of this software and associated documentation files (the
// "Software"), to deal in the Software without restriction, including
// without limitation the rights to use, copy, modify, merge, publish,
// distribute, sublicense, and/or sell copies of the Software, and to
// permit persons to whom the Software is furnished to do so, subject to
// the following conditions:

// The above copyright notice and this permission notice shall be
// included in all copies or substantial portions of the Software.

// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF
// MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE
// LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION
// OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION
// WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

use tikv_jemallocator::Jemalloc;
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use log::{error, info};
use std::io::{self, IsTerminal};
use std::sync::Arc;

use tokio::runtime::Builder;
use tokio::signal::unix::{signal as unix_signal, SignalKind};

extern crate exitcode;

use pg_duckdb_gateway::config::{get_config, VERSION};
use pg_duckdb_gateway::engine::DuckDbEngine;
use pg_duckdb_gateway::listener::{bind, serve};
use pg_duckdb_gateway::{cmd_args, logger};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = cmd_args::parse();

    let default_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        default_panic(info);
        std::process::exit(1);
    }));

    // Create a transient runtime for loading the config for the first time.
    {
        let runtime = Builder::new_multi_thread().worker_threads(1).build()?;

        runtime.block_on(async {
            if let Err(err) = pg_duckdb_gateway::config::parse(args.config_file.as_str()).await {
                if io::stdin().is_terminal() {
                    eprintln!("Config parse error: {err}");
                } else {
                    error!("Config parse error: {err:?}");
                }
                std::process::exit(exitcode::CONFIG);
            }
        });
    }

    let config = get_config();
    if let Err(err) = logger::init(&args, config.general.syslog_prog_name.clone()) {
        eprintln!("Logger error: {err}");
        std::process::exit(exitcode::CONFIG);
    }

    info!("Welcome to pg_duckdb_gateway! (Version {VERSION})");
    config.show();

    // One engine for the whole process, shared by every connection.
    let engine = match DuckDbEngine::open(&config.general.database_path) {
        Ok(engine) => Arc::new(engine),
        Err(err) => {
            error!("{err}");
            std::process::exit(exitcode::UNAVAILABLE);
        }
    };

    // Create the runtime now we know required worker_threads.
    let runtime = Builder::new_multi_thread()
        .worker_threads(config.general.worker_threads)
        .enable_all()
        .thread_name("worker-pg-duckdb-gateway")
        .build()?;

    runtime.block_on(async move {
        let listener = match bind(
            &config.general.host,
            config.general.port,
            config.general.backlog,
        ) {
            Ok(listener) => listener,
            Err(err) => {
                error!("Listener socket error: {err}");
                std::process::exit(exitcode::CONFIG);
            }
        };

        let (mut term_signal, mut interrupt_signal) = match (
            unix_signal(SignalKind::terminate()),
            unix_signal(SignalKind::interrupt()),
        ) {
            (Ok(term), Ok(interrupt)) => (term, interrupt),
            (Err(err), _) | (_, Err(err)) => {
                error!("Could not install signal handlers: {err}");
                std::process::exit(exitcode::OSERR);
            }
        };

        tokio::select! {
            result = serve(listener, engine) => {
                if let Err(err) = result {
                    error!("Listener failed: {err}");
                }
            },

            // kill -SIGINT $(pgrep pg_duckdb_gateway)
            _ = interrupt_signal.recv() => {
                info!("Got SIGINT, shutting down");
            },

            _ = term_signal.recv() => {
                info!("Got SIGTERM, shutting down");
            },
        }
        info!("Shutting down...");
    });

    Ok(())
}
