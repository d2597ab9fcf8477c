//! TCP master (§4.7): one stream socket per instance, transaction-ID
//! allocation, fixed retry-on-IO policy.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::errors::{FrameFormatKind, MasterError};
use crate::frame::mbap::{self, HEADER_LEN};
use crate::master::{self, ExecuteValue, MultiWriteValues, MAX_ATTEMPTS, RETRY_PAUSE};
use crate::pdu::{self, Request};

struct Inner {
    stream: Option<TcpStream>,
    next_transaction_id: u16,
}

/// A Modbus/TCP master bound to one server address. Connections are opened
/// lazily on first `execute` and kept open across calls (§3 Lifecycles); the
/// request mutex guarantees one in-flight request at a time per instance.
pub struct TcpMaster {
    addr: SocketAddr,
    timeout: Duration,
    inner: Mutex<Inner>,
}

impl TcpMaster {
    pub fn new(addr: SocketAddr) -> Self {
        Self::with_timeout(addr, master::DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(addr: SocketAddr, timeout: Duration) -> Self {
        Self {
            addr,
            timeout,
            inner: Mutex::new(Inner {
                stream: None,
                next_transaction_id: 0,
            }),
        }
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub async fn close(&self) {
        self.inner.lock().await.stream = None;
    }

    /// Executes one request against `slave_id`, retrying on `IO`/`TIMEOUT` up
    /// to [`master::MAX_ATTEMPTS`] with a fixed pause between attempts (§4.7).
    /// `EXCEPTION`/`PROTOCOL` are surfaced immediately, unretried.
    pub async fn execute(
        &self,
        slave_id: u8,
        function_code: u8,
        address: u16,
        quantity: u16,
        value: u16,
    ) -> Result<ExecuteValue, MasterError> {
        let request = master::build_request(function_code, address, quantity, value)?;
        self.run(slave_id, request).await
    }

    /// Issues a multi-value write (FC 0x0F/0x10, §6) — the values these
    /// function codes carry don't fit `execute`'s scalar `value` parameter.
    pub async fn execute_multiple(
        &self,
        slave_id: u8,
        function_code: u8,
        address: u16,
        values: MultiWriteValues,
    ) -> Result<ExecuteValue, MasterError> {
        let request = master::build_multi_request(function_code, address, values)?;
        self.run(slave_id, request).await
    }

    async fn run(&self, slave_id: u8, request: Request) -> Result<ExecuteValue, MasterError> {
        let function = master::function_of(&request);
        let request_pdu = master::encode(&request);

        let mut last_err = None;
        for attempt in 1..=MAX_ATTEMPTS {
            match self.try_once(slave_id, &request_pdu).await {
                Ok(response_pdu) => {
                    let response = pdu::decode_response(
                        function,
                        &response_pdu,
                        master::request_quantity(&request),
                    )
                    .map_err(MasterError::Malformed)?;
                    return master::interpret_response(&request, response);
                }
                Err(err) if err.is_retryable() && attempt < MAX_ATTEMPTS => {
                    self.inner.lock().await.stream = None;
                    tokio::time::sleep(RETRY_PAUSE).await;
                    last_err = Some(err);
                }
                Err(err) => return Err(err),
            }
        }
        Err(last_err.unwrap_or(MasterError::NotConnected))
    }

    async fn try_once(&self, slave_id: u8, request_pdu: &[u8]) -> Result<Vec<u8>, MasterError> {
        tokio::time::timeout(self.timeout, self.try_once_inner(slave_id, request_pdu))
            .await
            .map_err(|_| MasterError::Timeout(self.timeout))?
    }

    async fn try_once_inner(
        &self,
        slave_id: u8,
        request_pdu: &[u8],
    ) -> Result<Vec<u8>, MasterError> {
        let mut inner = self.inner.lock().await;
        if inner.stream.is_none() {
            let stream = TcpStream::connect(self.addr).await?;
            inner.stream = Some(stream);
        }
        let transaction_id = inner.next_transaction_id;
        inner.next_transaction_id = inner.next_transaction_id.wrapping_add(1);

        let frame = mbap::encode(transaction_id, slave_id, request_pdu);
        let stream = inner.stream.as_mut().expect("just ensured connected");
        let result: Result<Vec<u8>, MasterError> = async {
            stream.write_all(&frame).await?;

            let mut header_bytes = [0u8; HEADER_LEN];
            stream.read_exact(&mut header_bytes).await?;
            let (header, remaining) = mbap::decode_header(&header_bytes)
                .map_err(|kind| MasterError::protocol(kind, "invalid MBAP header"))?;

            let mut trailing = vec![0u8; remaining];
            stream.read_exact(&mut trailing).await?;
            let response = mbap::assemble(header, trailing);

            if response.transaction_id != transaction_id {
                return Err(MasterError::protocol(
                    FrameFormatKind::UnexpectedTransactionId,
                    format!(
                        "expected transaction id {transaction_id}, got {}",
                        response.transaction_id
                    ),
                ));
            }
            if response.unit_id != slave_id {
                return Err(MasterError::protocol(
                    FrameFormatKind::UnexpectedUnitId,
                    format!("expected unit id {slave_id}, got {}", response.unit_id),
                ));
            }
            Ok(response.pdu)
        }
        .await;

        if result.is_err() {
            inner.stream = None;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch;
    use crate::datamodel::{DataModel, Kind};
    use tokio::net::TcpListener;

    async fn spawn_echo_server(mut model: DataModel) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            loop {
                let mut header = [0u8; HEADER_LEN];
                if socket.read_exact(&mut header).await.is_err() {
                    break;
                }
                let (mbap_header, remaining) = mbap::decode_header(&header).unwrap();
                let mut body = vec![0u8; remaining];
                socket.read_exact(&mut body).await.unwrap();
                let request = mbap::assemble(mbap_header, body);
                let response_pdu = dispatch::dispatch(&mut model, request.unit_id, &request.pdu);
                let wire = mbap::encode(request.transaction_id, request.unit_id, &response_pdu);
                socket.write_all(&wire).await.unwrap();
            }
        });
        addr
    }

    #[tokio::test]
    async fn write_single_register_echo_scenario() {
        let mut model = DataModel::new();
        model
            .add_slave(1)
            .unwrap()
            .create_block("holding", Kind::HoldingRegister, 0, 16)
            .unwrap();
        let addr = spawn_echo_server(model).await;
        let master = TcpMaster::new(addr);

        let result = master.execute(1, 0x06, 7, 0, 0x1234).await.unwrap();
        assert_eq!(
            result,
            ExecuteValue::Write {
                address: 7,
                echo: 0x1234
            }
        );
    }

    #[tokio::test]
    async fn exception_path_for_unknown_slave() {
        let model = DataModel::new();
        let addr = spawn_echo_server(model).await;
        let master = TcpMaster::new(addr);

        let err = master.execute(9, 0x03, 0, 1, 0).await.unwrap_err();
        assert!(matches!(
            err,
            MasterError::Exception(crate::errors::ExceptionCode::SlaveDeviceFailure)
        ));
    }

    #[tokio::test]
    async fn transaction_ids_are_consecutive_across_three_requests() {
        let mut model = DataModel::new();
        model
            .add_slave(1)
            .unwrap()
            .create_block("holding", Kind::HoldingRegister, 0, 16)
            .unwrap();
        let addr = spawn_echo_server(model).await;
        let master = TcpMaster::new(addr);

        for i in 0..3u16 {
            master.execute(1, 0x06, i, 0, i).await.unwrap();
        }
        let tid_after_three = master.inner.lock().await.next_transaction_id;
        assert_eq!(tid_after_three, 3);
    }

    #[tokio::test]
    async fn execute_multiple_writes_registers_and_reports_echo_quantity() {
        let mut model = DataModel::new();
        model
            .add_slave(1)
            .unwrap()
            .create_block("holding", Kind::HoldingRegister, 0, 16)
            .unwrap();
        let addr = spawn_echo_server(model).await;
        let master = TcpMaster::new(addr);

        let result = master
            .execute_multiple(1, 0x10, 0, MultiWriteValues::Registers(vec![11, 22, 33]))
            .await
            .unwrap();
        assert_eq!(result, ExecuteValue::Write { address: 0, echo: 3 });

        let read = master.execute(1, 0x03, 0, 3, 0).await.unwrap();
        assert_eq!(read, ExecuteValue::Registers(vec![11, 22, 33]));
    }

    #[tokio::test]
    async fn execute_multiple_rejects_mismatched_function_and_values() {
        let model = DataModel::new();
        let addr = spawn_echo_server(model).await;
        let master = TcpMaster::new(addr);

        let err = master
            .execute_multiple(1, 0x10, 0, MultiWriteValues::Coils(vec![true]))
            .await
            .unwrap_err();
        assert!(matches!(err, MasterError::Malformed(_)));
    }
}
