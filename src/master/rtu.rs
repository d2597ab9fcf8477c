//! RTU master (§4.8): serial lifecycle, timing-based send/receive, positional
//! request/response correlation (there is no transaction ID on the wire).

use std::time::Duration;

use serialport::SerialPort;
use tokio::sync::Mutex;

use crate::errors::MasterError;
use crate::frame::rtu::{self, Timing};
use crate::master::{self, ExecuteValue, MultiWriteValues};
use crate::pdu::{self, Request};

/// A Modbus/RTU master owning one serial port. As with [`super::tcp::TcpMaster`]
/// the port mutex guarantees one in-flight request at a time.
pub struct RtuMaster {
    port: Mutex<Box<dyn SerialPort>>,
    timing: Timing,
    timeout: Duration,
}

impl RtuMaster {
    pub fn open(device: &str, baud_rate: u32) -> Result<Self, MasterError> {
        Self::open_with_timeout(device, baud_rate, master::DEFAULT_TIMEOUT)
    }

    pub fn open_with_timeout(
        device: &str,
        baud_rate: u32,
        timeout: Duration,
    ) -> Result<Self, MasterError> {
        let port = serialport::new(device, baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .timeout(Duration::from_millis(50))
            .open()
            .map_err(|err| MasterError::Io(std::io::Error::other(err)))?;

        Ok(Self {
            port: Mutex::new(port),
            timing: Timing::for_baud_rate(baud_rate),
            timeout,
        })
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Executes one request against `slave_id`. Broadcast (`slave_id == 0`)
    /// writes the frame and returns immediately without expecting a reply
    /// (§4.8, §7); the echoed address/value is reported back as a
    /// best-effort acknowledgement of what was sent, not a wire response.
    pub async fn execute(
        &self,
        slave_id: u8,
        function_code: u8,
        address: u16,
        quantity: u16,
        value: u16,
    ) -> Result<ExecuteValue, MasterError> {
        let request = master::build_request(function_code, address, quantity, value)?;
        if slave_id == 0 {
            self.send_broadcast(&request).await?;
            return Ok(ExecuteValue::Write { address, echo: value });
        }
        self.run(slave_id, request).await
    }

    /// Issues a multi-value write (FC 0x0F/0x10, §6). Broadcast echoes the
    /// written quantity, matching the normal (non-broadcast) response
    /// convention for these function codes (§4.6).
    pub async fn execute_multiple(
        &self,
        slave_id: u8,
        function_code: u8,
        address: u16,
        values: MultiWriteValues,
    ) -> Result<ExecuteValue, MasterError> {
        let request = master::build_multi_request(function_code, address, values)?;
        if slave_id == 0 {
            let echo = match &request {
                Request::WriteMultipleCoils { values, .. } => values.len() as u16,
                Request::WriteMultipleRegisters { values, .. } => values.len() as u16,
                _ => 0,
            };
            self.send_broadcast(&request).await?;
            return Ok(ExecuteValue::Write { address, echo });
        }
        self.run(slave_id, request).await
    }

    /// Writes `request` addressed to broadcast (slave 0) and returns without
    /// expecting a reply (§4.8, §7).
    async fn send_broadcast(&self, request: &Request) -> Result<(), MasterError> {
        let pdu_bytes = master::encode(request);
        let mut slave_and_pdu = Vec::with_capacity(1 + pdu_bytes.len());
        slave_and_pdu.push(0);
        slave_and_pdu.extend_from_slice(&pdu_bytes);
        let wire = rtu::encode(&slave_and_pdu);
        tokio::time::timeout(self.timeout, self.transaction(0, &wire))
            .await
            .map_err(|_| MasterError::Timeout(self.timeout))?
    }

    async fn run(&self, slave_id: u8, request: Request) -> Result<ExecuteValue, MasterError> {
        let function = master::function_of(&request);
        let pdu_bytes = master::encode(&request);

        let mut slave_and_pdu = Vec::with_capacity(1 + pdu_bytes.len());
        slave_and_pdu.push(slave_id);
        slave_and_pdu.extend_from_slice(&pdu_bytes);
        let wire = rtu::encode(&slave_and_pdu);

        tokio::time::timeout(self.timeout, self.transaction(slave_id, &wire))
            .await
            .map_err(|_| MasterError::Timeout(self.timeout))??;

        let response_pdu = tokio::time::timeout(self.timeout, self.receive(slave_id))
            .await
            .map_err(|_| MasterError::Timeout(self.timeout))??;

        let response = pdu::decode_response(function, &response_pdu, master::request_quantity(&request))
            .map_err(MasterError::Malformed)?;
        master::interpret_response(&request, response)
    }

    async fn transaction(&self, _slave_id: u8, wire: &[u8]) -> Result<(), MasterError> {
        let mut port = self.port.lock().await;
        port.clear(serialport::ClearBuffer::All)
            .map_err(|err| MasterError::Io(std::io::Error::other(err)))?;
        use std::io::Write;
        port.write_all(wire)
            .map_err(|err| MasterError::Io(std::io::Error::other(err)))?;
        port.flush()
            .map_err(|err| MasterError::Io(std::io::Error::other(err)))?;
        drop(port);
        tokio::time::sleep(self.timing.t35).await;
        Ok(())
    }

    /// Reads until the port has been idle for `t35` (a complete frame) or the
    /// caller's overall timeout expires, then validates slave address and CRC.
    async fn receive(&self, slave_id: u8) -> Result<Vec<u8>, MasterError> {
        let mut assembler = rtu::FrameAssembler::new();
        let mut port = self.port.lock().await;
        let mut scratch = [0u8; 256];
        use std::io::Read;
        loop {
            match port.read(&mut scratch) {
                Ok(0) => {
                    if !assembler.is_empty() {
                        break;
                    }
                }
                Ok(n) => assembler.push(&scratch[..n]),
                Err(err) if err.kind() == std::io::ErrorKind::TimedOut => {
                    if !assembler.is_empty() {
                        break;
                    }
                }
                Err(err) => return Err(MasterError::Io(err)),
            }
        }
        drop(port);

        let frame = assembler
            .on_silence()
            .ok_or_else(|| MasterError::Malformed("no frame received".into()))?;
        let (received_slave, body) = rtu::decode(&frame)
            .ok_or_else(|| MasterError::Malformed("frame failed CRC check".into()))?;
        if received_slave != slave_id {
            return Err(MasterError::Malformed(format!(
                "expected slave {slave_id}, got {received_slave}"
            )));
        }
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timing_is_derived_from_configured_baud_rate() {
        let timing = Timing::for_baud_rate(9600);
        assert!(timing.t35 > Duration::from_millis(1));
    }
}
