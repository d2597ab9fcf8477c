//! RTU server (§4.10): a single reader loop on one serial port, delimiting
//! frames by inter-frame silence and dispatching each to the data model.
//!
//! State machine: `IDLE -> RECEIVING -> FRAME_READY -> PROCESSING -> RESPOND
//! -> IDLE`. Byte arrival in `IDLE` moves to `RECEIVING`; `t35` silence in
//! `RECEIVING` moves to `FRAME_READY`; a failed CRC check or an unregistered
//! unit ID (which also covers the broadcast address, never registered)
//! drops back to `IDLE` with no reply; a frame addressed to a registered
//! slave is dispatched and answered after a further `t35` gap.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serialport::SerialPort;
use tokio::sync::Mutex;
use tracing::{trace, warn};

use crate::datamodel::DataModel;
use crate::dispatch;
use crate::errors::ModbusError;
use crate::frame::rtu::{self, FrameAssembler, Timing};

/// Runs the reader loop until `running` is cleared. Mirrors the cooperative
/// stop-flag cancellation of §5/§9: the loop checks `running` between reads
/// rather than being abruptly cancelled mid-transaction.
pub async fn serve(
    mut port: Box<dyn SerialPort>,
    baud_rate: u32,
    data_model: Arc<Mutex<DataModel>>,
    running: Arc<AtomicBool>,
) -> Result<(), ModbusError> {
    let timing = Timing::for_baud_rate(baud_rate);
    let mut assembler = FrameAssembler::new();
    let mut scratch = [0u8; 256];

    while running.load(Ordering::Relaxed) {
        use std::io::Read;
        let read_result = port.read(&mut scratch);
        match read_result {
            Ok(0) => {
                if let Some(frame) = assembler.on_silence() {
                    process_frame(&mut port, &frame, &data_model, timing).await;
                }
            }
            Ok(n) => assembler.push(&scratch[..n]),
            Err(err) if err.kind() == std::io::ErrorKind::TimedOut => {
                if let Some(frame) = assembler.on_silence() {
                    process_frame(&mut port, &frame, &data_model, timing).await;
                }
            }
            Err(err) => {
                warn!("RTU server read error: {err}");
            }
        }
    }
    Ok(())
}

async fn process_frame(
    port: &mut Box<dyn SerialPort>,
    frame: &[u8],
    data_model: &Arc<Mutex<DataModel>>,
    timing: Timing,
) {
    let Some((unit_id, pdu)) = rtu::decode(frame) else {
        trace!("dropping RTU frame that failed CRC");
        return;
    };

    let response_pdu = {
        let mut model = data_model.lock().await;
        if model.slave(unit_id).is_none() {
            trace!("dropping RTU frame for unregistered unit {unit_id} (includes broadcast)");
            return;
        }
        dispatch::dispatch(&mut model, unit_id, pdu)
    };

    let mut slave_and_pdu = vec![unit_id];
    slave_and_pdu.extend_from_slice(&response_pdu);
    let wire = rtu::encode(&slave_and_pdu);

    tokio::time::sleep(timing.t35).await;
    use std::io::Write;
    if let Err(err) = port.write_all(&wire) {
        warn!("RTU server write error: {err}");
    }
}
