//! TCP server (§4.9): accept loop plus one handler task per client, reading
//! and writing MBAP-framed PDUs against a shared data model.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use socket2::{Domain, Socket, Type};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, warn};

use crate::connection::{ConnectionConfig, Manager as ConnectionManager};
use crate::datamodel::DataModel;
use crate::dispatch;
use crate::errors::ModbusError;
use crate::frame::mbap::{self, HEADER_LEN};

const LISTEN_BACKLOG: i32 = 16;
const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Binds a listening socket with `SO_REUSEADDR` set and a backlog of at
/// least 5, as required by §4.9.
fn bind_listener(addr: SocketAddr) -> std::io::Result<std::net::TcpListener> {
    let domain = if addr.is_ipv4() { Domain::IPV4 } else { Domain::IPV6 };
    let socket = Socket::new(domain, Type::STREAM, None)?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;
    socket.set_nonblocking(true)?;
    Ok(socket.into())
}

/// Serves Modbus/TCP clients against `data_model` until a signal arrives on
/// `shutdown`. Each accepted connection is handled on its own task, admitted
/// through `connection_manager`'s concurrency limits.
pub async fn serve(
    addr: SocketAddr,
    data_model: Arc<Mutex<DataModel>>,
    connection_manager: Arc<ConnectionManager>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), ModbusError> {
    let std_listener = bind_listener(addr)?;
    let listener = TcpListener::from_std(std_listener)?;
    info!("Modbus/TCP server listening on {addr}");

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((socket, peer)) => {
                        match connection_manager.accept(peer).await {
                            Ok(guard) => {
                                let data_model = Arc::clone(&data_model);
                                let connection_manager = Arc::clone(&connection_manager);
                                let mut client_shutdown = shutdown.resubscribe();
                                tokio::spawn(async move {
                                    tokio::select! {
                                        result = handle_client(socket, peer, data_model, Arc::clone(&connection_manager)) => {
                                            if let Err(err) = result {
                                                warn!("client {peer} error: {err}");
                                            }
                                        }
                                        _ = client_shutdown.recv() => {
                                            debug!("client {peer} handler observed shutdown");
                                        }
                                    }
                                    drop(guard);
                                });
                            }
                            Err(err) => {
                                warn!("connection from {peer} rejected: {err}");
                            }
                        }
                    }
                    Err(err) => error!("accept error: {err}"),
                }
            }
            _ = shutdown.recv() => {
                info!("Modbus/TCP server shutting down");
                return Ok(());
            }
        }
    }
}

async fn handle_client(
    mut socket: TcpStream,
    peer: SocketAddr,
    data_model: Arc<Mutex<DataModel>>,
    connection_manager: Arc<ConnectionManager>,
) -> Result<(), ModbusError> {
    socket.set_nodelay(true)?;

    loop {
        let mut header_bytes = [0u8; HEADER_LEN];
        let read_result = tokio::time::timeout(IDLE_TIMEOUT, socket.read_exact(&mut header_bytes)).await;
        let header_bytes = match read_result {
            Ok(Ok(_)) => header_bytes,
            Ok(Err(_)) => {
                debug!("client {peer} closed the connection");
                return Ok(());
            }
            Err(_) => {
                debug!("client {peer} idle timeout");
                return Ok(());
            }
        };

        let (header, remaining) = match mbap::decode_header(&header_bytes) {
            Ok(parsed) => parsed,
            Err(_) => {
                debug!("client {peer} sent an invalid MBAP header, closing");
                return Ok(());
            }
        };

        let mut trailing = vec![0u8; remaining];
        if socket.read_exact(&mut trailing).await.is_err() {
            return Ok(());
        }
        let request = mbap::assemble(header, trailing);

        let started_at = std::time::Instant::now();
        let response_pdu = {
            let mut model = data_model.lock().await;
            dispatch::dispatch(&mut model, request.unit_id, &request.pdu)
        };
        let wire = mbap::encode(request.transaction_id, request.unit_id, &response_pdu);
        let write_ok = socket.write_all(&wire).await.is_ok();
        connection_manager
            .record_request(peer, write_ok, started_at.elapsed())
            .await;
        if !write_ok {
            return Ok(());
        }
    }
}

pub fn default_connection_config() -> ConnectionConfig {
    ConnectionConfig::default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datamodel::Kind;
    use tokio::net::TcpStream as ClientStream;

    #[tokio::test]
    async fn serves_one_request_and_echoes_a_write() {
        let mut model = DataModel::new();
        model
            .add_slave(1)
            .unwrap()
            .create_block("holding", Kind::HoldingRegister, 0, 16)
            .unwrap();
        let data_model = Arc::new(Mutex::new(model));
        let manager = Arc::new(ConnectionManager::new(ConnectionConfig::default()));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let addr = listener.local_addr().unwrap();
        let tokio_listener = TcpListener::from_std(listener).unwrap();

        let server_data_model = Arc::clone(&data_model);
        let server_manager = Arc::clone(&manager);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    accepted = tokio_listener.accept() => {
                        if let Ok((socket, peer)) = accepted {
                            let data_model = Arc::clone(&server_data_model);
                            let manager = Arc::clone(&server_manager);
                            tokio::spawn(handle_client(socket, peer, data_model, manager));
                        }
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
        });

        let mut client = ClientStream::connect(addr).await.unwrap();
        let pdu = crate::pdu::encode_request(&crate::pdu::Request::WriteSingleRegister {
            address: 7,
            value: 0x1234,
        });
        let wire = mbap::encode(1, 1, &pdu);
        client.write_all(&wire).await.unwrap();

        let mut header = [0u8; HEADER_LEN];
        client.read_exact(&mut header).await.unwrap();
        let (parsed, remaining) = mbap::decode_header(&header).unwrap();
        let mut body = vec![0u8; remaining];
        client.read_exact(&mut body).await.unwrap();

        assert_eq!(parsed.transaction_id, 1);
        assert_eq!(body, vec![0x06, 0x00, 0x07, 0x12, 0x34]);

        let _ = shutdown_tx.send(());
    }
}
