use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tokio::sync::{broadcast, Mutex};
use tracing::info;

use modbus_engine::config::EngineConfig;
use modbus_engine::connection::{ConnectionConfig, Manager as ConnectionManager};
use modbus_engine::datamodel::DataModel;
use modbus_engine::http_api::{self, RtuStatus};
use modbus_engine::master::rtu::RtuMaster;
use modbus_engine::master::tcp::TcpMaster;
use modbus_engine::master::MultiWriteValues;
use modbus_engine::server::rtu as rtu_server;
use modbus_engine::server::tcp as tcp_server;
use modbus_engine::{logging, ModbusError};

const WRITE_MULTIPLE_COILS: u8 = 0x0F;
const WRITE_MULTIPLE_REGISTERS: u8 = 0x10;

/// Builds a [`MultiWriteValues`] from `--values` for FC 0x0F/0x10, the
/// function codes `execute`'s scalar `--value` can't express (§6).
fn multi_write_values(function: u8, raw: &[u16]) -> Result<MultiWriteValues, Box<dyn std::error::Error>> {
    match function {
        WRITE_MULTIPLE_COILS => Ok(MultiWriteValues::Coils(raw.iter().map(|&v| v != 0).collect())),
        WRITE_MULTIPLE_REGISTERS => Ok(MultiWriteValues::Registers(raw.to_vec())),
        other => Err(format!("function code {other:#04X} does not take --values; use --value instead").into()),
    }
}

#[derive(Parser)]
#[command(author, version, about = "Modbus/TCP and Modbus/RTU protocol engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a Modbus/TCP server against an empty data model until interrupted.
    Serve(ServeArgs),
    /// Run a Modbus/RTU server on a serial line against an empty data model until interrupted.
    ServeRtu(ServeRtuArgs),
    /// Issue a single request against a remote Modbus/TCP server and print the result.
    Query(QueryArgs),
    /// Issue a single request against a Modbus/RTU slave and print the result.
    QueryRtu(QueryRtuArgs),
}

#[derive(Args)]
struct ServeArgs {
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the default configuration as YAML and exit.
    #[arg(long = "dump-default-config")]
    dump_default: bool,
}

#[derive(Args)]
struct QueryArgs {
    /// Server address, e.g. 127.0.0.1:502.
    #[arg(long)]
    addr: SocketAddr,

    #[arg(long)]
    slave: u8,

    /// Modbus function code (decimal), e.g. 3 for Read Holding Registers.
    #[arg(long)]
    function: u8,

    #[arg(long)]
    address: u16,

    #[arg(long, default_value_t = 1)]
    quantity: u16,

    #[arg(long, default_value_t = 0)]
    value: u16,

    /// Comma-separated values for a multi-write (FC 0x0F/0x10): `0`/`1` per
    /// coil, or a decimal per register. Ignored for all other function codes.
    #[arg(long, value_delimiter = ',')]
    values: Option<Vec<u16>>,
}

#[derive(Args)]
struct ServeRtuArgs {
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the default configuration as YAML and exit.
    #[arg(long = "dump-default-config")]
    dump_default: bool,
}

#[derive(Args)]
struct QueryRtuArgs {
    /// Serial device, e.g. /dev/ttyUSB0.
    #[arg(long)]
    device: String,

    #[arg(long, default_value_t = 9600)]
    baud_rate: u32,

    #[arg(long)]
    slave: u8,

    /// Modbus function code (decimal), e.g. 3 for Read Holding Registers.
    #[arg(long)]
    function: u8,

    #[arg(long)]
    address: u16,

    #[arg(long, default_value_t = 1)]
    quantity: u16,

    #[arg(long, default_value_t = 0)]
    value: u16,

    /// Comma-separated values for a multi-write (FC 0x0F/0x10): `0`/`1` per
    /// coil, or a decimal per register. Ignored for all other function codes.
    #[arg(long, value_delimiter = ',')]
    values: Option<Vec<u16>>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve(args) => run_serve(args).await,
        Command::ServeRtu(args) => run_serve_rtu(args).await,
        Command::Query(args) => run_query(args).await,
        Command::QueryRtu(args) => run_query_rtu(args).await,
    }
}

async fn run_serve(args: ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    if args.dump_default {
        let config = EngineConfig::default();
        println!("{}", serde_yaml::to_string(&config)?);
        return Ok(());
    }

    let config = match args.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::load().unwrap_or_default(),
    };

    let _logging_guard = logging::init(&config.logging)?;
    info!(
        "starting Modbus/TCP server on {}:{}",
        config.tcp.bind_addr, config.tcp.bind_port
    );

    let data_model = Arc::new(Mutex::new(DataModel::new()));
    let connection_manager = Arc::new(ConnectionManager::new(ConnectionConfig::from(
        config.connection.clone(),
    )));
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let tcp_addr: SocketAddr = format!("{}:{}", config.tcp.bind_addr, config.tcp.bind_port).parse()?;
    let http_shutdown = shutdown_tx.subscribe();
    let rtu_status = RtuStatus::new();

    let http_connections = Arc::clone(&connection_manager);
    let http_handle = if config.http.enabled {
        let bind_addr = config.http.bind_addr.clone();
        let bind_port = config.http.bind_port;
        Some(tokio::spawn(async move {
            if let Err(err) =
                http_api::serve(&bind_addr, bind_port, http_connections, rtu_status, http_shutdown).await
            {
                tracing::error!("HTTP status server error: {err}");
            }
        }))
    } else {
        None
    };

    let result = tcp_server::serve(tcp_addr, data_model, connection_manager, shutdown_rx).await;

    let _ = shutdown_tx.send(());
    if let Some(handle) = http_handle {
        let _ = handle.await;
    }

    result.map_err(Into::into)
}

async fn run_query(args: QueryArgs) -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_target(false).init();

    let master = TcpMaster::new(args.addr);
    let result = match args.values {
        Some(raw) => {
            let values = multi_write_values(args.function, &raw)?;
            master
                .execute_multiple(args.slave, args.function, args.address, values)
                .await
        }
        None => {
            master
                .execute(args.slave, args.function, args.address, args.quantity, args.value)
                .await
        }
    };

    match result {
        Ok(value) => {
            println!("{value:?}");
            Ok(())
        }
        Err(err) => {
            eprintln!("request failed: {err}");
            Err(Box::new(ModbusError::from(err)))
        }
    }
}

async fn run_serve_rtu(args: ServeRtuArgs) -> Result<(), Box<dyn std::error::Error>> {
    if args.dump_default {
        let config = EngineConfig::default();
        println!("{}", serde_yaml::to_string(&config)?);
        return Ok(());
    }

    let config = match args.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::load().unwrap_or_default(),
    };

    let _logging_guard = logging::init(&config.logging)?;
    info!(
        "starting Modbus/RTU server on {}",
        config.rtu.serial_port_info()
    );

    let port = serialport::new(config.rtu.device.as_str(), config.rtu.baud_rate)
        .data_bits(config.rtu.data_bits.into())
        .parity(config.rtu.parity.into())
        .stop_bits(config.rtu.stop_bits.into())
        .timeout(config.rtu.serial_timeout)
        .open()?;

    let data_model = Arc::new(Mutex::new(DataModel::new()));
    let running = Arc::new(AtomicBool::new(true));
    let running_for_signal = Arc::clone(&running);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        running_for_signal.store(false, Ordering::Relaxed);
    });

    rtu_server::serve(port, config.rtu.baud_rate, data_model, running)
        .await
        .map_err(Into::into)
}

async fn run_query_rtu(args: QueryRtuArgs) -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_target(false).init();

    let master = RtuMaster::open(&args.device, args.baud_rate)?;
    let result = match args.values {
        Some(raw) => {
            let values = multi_write_values(args.function, &raw)?;
            master
                .execute_multiple(args.slave, args.function, args.address, values)
                .await
        }
        None => {
            master
                .execute(args.slave, args.function, args.address, args.quantity, args.value)
                .await
        }
    };

    match result {
        Ok(value) => {
            println!("{value:?}");
            Ok(())
        }
        Err(err) => {
            eprintln!("request failed: {err}");
            Err(Box::new(ModbusError::from(err)))
        }
    }
}
